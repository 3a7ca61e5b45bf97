use std::time::Duration;

use tracing::{info, warn};

use crate::config::FrameBudget;

use super::engine::{Engine, EngineError, RestoreOutcome};
use super::mode::{DrawPath, EngineMode};

/// What the caller should do after one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Continue,
    Quit,
}

/// Drives the engine one iteration at a time: pending transitions, audio,
/// input, draw, script, present, then pacing.
pub struct FrameScheduler {
    engine: Engine,
    budget: FrameBudget,
    started: bool,
    frames: u64,
}

impl FrameScheduler {
    pub fn new(engine: Engine) -> Self {
        let budget = engine.core().config().frame_budget();
        Self {
            engine,
            budget,
            started: false,
            frames: 0,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn into_engine(self) -> Engine {
        self.engine
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Runs until a quit is requested or a fatal error occurs.
    pub fn run(&mut self) -> Result<(), EngineError> {
        info!(budget = ?self.budget, "main_loop_started");
        while self.run_frame()? == FrameOutcome::Continue {}
        info!(frames = self.frames, "main_loop_finished");
        Ok(())
    }

    /// Runs at most `max_frames` iterations.
    pub fn run_frames(&mut self, max_frames: u64) -> Result<FrameOutcome, EngineError> {
        for _ in 0..max_frames {
            if self.run_frame()? == FrameOutcome::Quit {
                return Ok(FrameOutcome::Quit);
            }
        }
        Ok(FrameOutcome::Continue)
    }

    pub fn run_frame(&mut self) -> Result<FrameOutcome, EngineError> {
        if !self.started {
            self.engine.core_mut().start_timing();
            self.started = true;
        }
        let engine = &mut self.engine;
        let start_ms = engine.core().now_ms();
        engine.core_mut().advance_short_frame();

        if engine.core().quit_requested() {
            return Ok(FrameOutcome::Quit);
        }

        if let Some(target) = engine.core_mut().requests.load.take() {
            if engine.restore_game(&target)? == RestoreOutcome::Rejected {
                warn!(target = %target.describe(), "restore_request_ignored");
            }
        }
        if let Some(target) = engine.core_mut().requests.save.take() {
            engine.save_game(&target)?;
        }
        if engine.core().requests.device_reset_pending() {
            engine.device_reset()?;
        }

        engine.core_mut().flush_audio();
        engine.handle_events()?;

        let mode = engine.core().mode();
        let policy = mode.policy();
        if policy.draw != DrawPath::Skip {
            engine.update_display_scene()?;
        }
        let movie_blocks_script = engine.core().is_ps2() && mode == EngineMode::Smush;
        if policy.runs_script && !movie_blocks_script {
            engine.script_update()?;
        } else if !policy.runs_script {
            engine.core_mut().hold_frame_clock();
        }
        if policy.presents {
            engine.do_flip()?;
        }
        engine.core_mut().forward_music_state();

        self.frames += 1;
        if let FrameBudget::Limited(budget) = self.budget {
            let elapsed =
                Duration::from_millis(engine.core().now_ms().saturating_sub(start_ms));
            let sleep = compute_cap_sleep(elapsed, budget);
            if !sleep.is_zero() {
                engine.core_mut().sleep(sleep);
            }
        }
        Ok(FrameOutcome::Continue)
    }
}

fn compute_cap_sleep(elapsed: Duration, budget: Duration) -> Duration {
    budget.saturating_sub(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_sleep_zero_when_over_budget() {
        let sleep = compute_cap_sleep(Duration::from_millis(20), Duration::from_millis(16));
        assert_eq!(sleep, Duration::ZERO);
    }

    #[test]
    fn cap_sleep_fills_remaining_budget() {
        let sleep = compute_cap_sleep(Duration::from_millis(5), Duration::from_millis(16));
        assert_eq!(sleep, Duration::from_millis(11));
    }
}
