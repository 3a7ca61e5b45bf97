use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tracing::warn;

/// Interval over which frames are counted before the estimate is refreshed.
pub const FPS_WINDOW_MS: u64 = 500;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_metrics_lock_poison_once(operation: &'static str) {
    if METRICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "metrics lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub frame_time_ms: u32,
    pub frames_presented: u64,
}

/// Read side of the loop's metrics, cheap to clone into other threads.
#[derive(Clone, Debug)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl Default for MetricsHandle {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(LoopMetricsSnapshot::default())),
        }
    }
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = snapshot;
            }
        }
    }
}

/// Counts flips and turns them into a frames-per-second estimate once more
/// than [`FPS_WINDOW_MS`] has passed since the previous estimate.
#[derive(Debug, Clone, Default)]
pub(crate) struct FpsCounter {
    frames: u32,
    window_start_ms: u64,
    frames_total: u64,
    fps: f32,
    text: String,
}

impl FpsCounter {
    pub(crate) fn reset(&mut self, now_ms: u64) {
        self.frames = 0;
        self.window_start_ms = now_ms;
    }

    pub(crate) fn record_frame(&mut self) {
        self.frames = self.frames.saturating_add(1);
        self.frames_total = self.frames_total.saturating_add(1);
    }

    /// Returns the new estimate when the window closed.
    pub(crate) fn maybe_estimate(&mut self, now_ms: u64) -> Option<f32> {
        let elapsed = now_ms.saturating_sub(self.window_start_ms);
        if elapsed <= FPS_WINDOW_MS {
            return None;
        }
        self.fps = self.frames as f32 * 1000.0 / elapsed as f32;
        self.text = format!("{:7.2} fps", self.fps);
        self.reset(now_ms);
        Some(self.fps)
    }

    pub(crate) fn fps(&self) -> f32 {
        self.fps
    }

    pub(crate) fn frames_total(&self) -> u64 {
        self.frames_total
    }

    /// Overlay text; empty until the first estimate.
    pub(crate) fn text(&self) -> &str {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use std::sync::RwLock;
    use std::thread;

    use super::*;

    fn poison_lock(lock: &RwLock<LoopMetricsSnapshot>) {
        thread::scope(|scope| {
            let _ = scope
                .spawn(|| {
                    let _guard = lock.write().expect("write guard");
                    panic!("poison metrics lock");
                })
                .join();
        });
    }

    #[test]
    fn estimate_waits_for_full_window() {
        let mut counter = FpsCounter::default();
        counter.reset(1_000);
        for _ in 0..30 {
            counter.record_frame();
        }
        assert!(counter.maybe_estimate(1_500).is_none());

        let fps = counter.maybe_estimate(1_600).expect("window closed");
        assert!((fps - 50.0).abs() < 0.01);
        assert!(counter.text().contains("50.00"));
        assert_eq!(counter.frames_total(), 30);
    }

    #[test]
    fn estimate_restarts_window() {
        let mut counter = FpsCounter::default();
        counter.record_frame();
        counter.maybe_estimate(1_000);
        counter.record_frame();
        assert!(counter.maybe_estimate(1_400).is_none());
    }

    #[test]
    fn snapshot_recovers_after_poison_without_panic() {
        let handle = MetricsHandle::default();
        poison_lock(handle.snapshot.as_ref());
        assert_eq!(handle.snapshot(), LoopMetricsSnapshot::default());
    }

    #[test]
    fn publish_recovers_after_poison_without_panic() {
        let handle = MetricsHandle::default();
        poison_lock(handle.snapshot.as_ref());

        let expected = LoopMetricsSnapshot {
            fps: 30.0,
            frame_time_ms: 33,
            frames_presented: 12,
        };
        handle.publish(expected);
        assert_eq!(handle.snapshot(), expected);
    }
}
