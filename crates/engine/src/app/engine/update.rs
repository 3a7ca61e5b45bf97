use tracing::debug;

use crate::services::{
    FrameTiming, ScriptValue, BUTTON_HANDLER, EXIT_HANDLER, PAUSE_HANDLER, USER_PAINT_HANDLER,
};

use super::super::input::{InputEvent, KeyCode};
use super::super::mode::EngineMode;
use super::{Engine, EngineError};

/// Largest frame time handed to the world; its consumers count in `i32`.
pub(crate) const MAX_FRAME_TIME_MS: u32 = i32::MAX as u32;

impl Engine {
    /// One script pass followed, in modes that animate the scene, by talk,
    /// actor, iris and timed-text updates. Skipped while a save, restore or
    /// device reset waits to run.
    pub fn script_update(&mut self) -> Result<(), EngineError> {
        if self.core.requests.transition_pending() {
            return Ok(());
        }
        let now = self.core.clock.now_ms();
        let times = &mut self.core.times;
        if now < times.frame_start_ms {
            times.frame_start_ms = now;
            return Ok(());
        }
        let elapsed = now - times.frame_start_ms;
        times.frame_start_ms = now;
        times.frame_time_ms = if self.core.modes.mode() == EngineMode::Pause || times.short_frame
        {
            0
        } else {
            u32::try_from(elapsed).map_or(MAX_FRAME_TIME_MS, |ms| ms.min(MAX_FRAME_TIME_MS))
        };

        let timing = FrameTiming {
            frame_time_ms: self.core.times.frame_time_ms,
            movie_time_ms: self.core.times.movie_time_ms,
        };
        self.script.update(timing, &mut self.core)?;
        self.dispatch_pending_callbacks()?;

        if self.core.sets.current().is_some() && self.core.modes.policy().updates_world {
            self.core.update_world(timing.frame_time_ms);
        }
        Ok(())
    }

    /// Drains platform events. Some keys run lifecycle handlers and end the
    /// drain for this frame; every other key goes through the controls table
    /// and gets its own script pass.
    pub fn handle_events(&mut self) -> Result<(), EngineError> {
        while let Some(event) = self.core.platform.poll_event() {
            let (key, pressed) = match event {
                InputEvent::Quit => {
                    debug!("quit_event");
                    self.core.requests.quit = true;
                    continue;
                }
                InputEvent::Expose => {
                    self.handle_user_paint()?;
                    continue;
                }
                InputEvent::KeyDown(key) => (key, true),
                InputEvent::KeyUp(key) => (key, false),
            };
            let mode = self.core.modes.mode();
            let movie_blocks_script = self.core.is_ps2() && mode == EngineMode::Smush;
            if pressed {
                if movie_blocks_script && key == KeyCode::ESCAPE {
                    self.core.movie.stop();
                    break;
                }
                if mode != EngineMode::Draw && mode != EngineMode::Smush && key == KeyCode::Q {
                    self.require_callback(EXIT_HANDLER, &[])?;
                    break;
                }
                if mode != EngineMode::Draw && key == KeyCode::PAUSE {
                    self.require_callback(PAUSE_HANDLER, &[])?;
                    break;
                }
            }
            self.handle_control(key, pressed)?;
            if !movie_blocks_script {
                self.script_update()?;
            }
        }
        Ok(())
    }

    /// Asks the script to repaint after the platform lost the window contents.
    pub fn handle_user_paint(&mut self) -> Result<(), EngineError> {
        debug!("user_paint");
        self.require_callback(USER_PAINT_HANDLER, &[])
    }

    fn handle_control(&mut self, key: KeyCode, pressed: bool) -> Result<(), EngineError> {
        if !self.core.controls.handle(key, pressed) {
            return Ok(());
        }
        let args = [ScriptValue::Int(i32::from(key.0)), ScriptValue::Bool(pressed)];
        self.optional_callback(BUTTON_HANDLER, &args)?;
        Ok(())
    }
}

impl super::EngineCore {
    fn update_world(&mut self, frame_time_ms: u32) {
        self.actors.update_talking(&mut self.world, frame_time_ms);
        self.rebuild_active_actors();
        for id in self.actors.actors() {
            if let Some(actor) = self.world.actors.get_mut(*id) {
                actor.update(frame_time_ms);
            }
        }
        self.iris.update(frame_time_ms);

        let expired: Vec<_> = self
            .world
            .text_objects
            .iter_mut()
            .filter_map(|(id, text)| (!text.update(frame_time_ms)).then_some(id))
            .collect();
        for id in expired {
            self.world.text_objects.remove(id);
            if self.movie_subtitle == Some(id) {
                self.movie_subtitle = None;
            }
        }
    }
}
