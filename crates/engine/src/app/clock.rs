use std::cell::Cell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

/// Millisecond time source and the loop's only suspension point.
pub trait Clock {
    fn now_ms(&self) -> u64;
    fn sleep(&mut self, duration: Duration);
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Deterministic clock. Clones share the same time, so a test can keep one
/// to move time while the engine owns another. Sleeping advances time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Rc<Cell<u64>>,
    slept_ms: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        let clock = Self::default();
        clock.now_ms.set(start_ms);
        clock
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.set(self.now_ms.get().saturating_add(ms));
    }

    pub fn set(&self, ms: u64) {
        self.now_ms.set(ms);
    }

    /// Total time spent in `sleep`.
    pub fn slept_ms(&self) -> u64 {
        self.slept_ms.get()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }

    fn sleep(&mut self, duration: Duration) {
        let ms = duration.as_millis() as u64;
        self.slept_ms.set(self.slept_ms.get().saturating_add(ms));
        self.advance(ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(100);
        let mut engine_side = clock.clone();
        clock.advance(25);
        assert_eq!(engine_side.now_ms(), 125);

        engine_side.sleep(Duration::from_millis(10));
        assert_eq!(clock.now_ms(), 135);
        assert_eq!(clock.slept_ms(), 10);
    }
}
