use tracing::debug;

use crate::services::{ScriptValue, POST_CAM_CHANGE_HANDLER};
use crate::world::{Color, Id, Point, Set, StateLayer};

use super::super::metrics::LoopMetricsSnapshot;
use super::super::mode::{DrawPath, EngineMode};
use super::{Engine, EngineCore, EngineError};

const FPS_TEXT_POS: Point = Point { x: 550, y: 25 };

impl Engine {
    /// Draws the current frame into the back buffer along the mode's path.
    pub fn update_display_scene(&mut self) -> Result<(), EngineError> {
        self.core.do_flip = true;
        match self.core.modes.policy().draw {
            DrawPath::MovieOverlay => {
                self.core.draw_movie_overlay();
                Ok(())
            }
            DrawPath::SceneComposite => self.draw_scene(),
            DrawPath::Lightweight => {
                self.core.do_flip = false;
                self.core.prev_smush_frame = None;
                self.core.times.movie_time_ms = 0;
                Ok(())
            }
            DrawPath::Skip => Ok(()),
        }
    }

    fn draw_scene(&mut self) -> Result<(), EngineError> {
        let Some(set_id) = self.core.sets.current() else {
            return Ok(());
        };
        if !self.core.world.sets.contains(set_id) {
            return Ok(());
        }
        self.core.renderer.clear_screen();
        self.core.prev_smush_frame = None;
        self.core.times.movie_time_ms = 0;

        self.core.draw_background(set_id);
        self.core.draw_states(set_id, StateLayer::Background);
        self.core.draw_states(set_id, StateLayer::State);
        self.core.draw_scene_movie(set_id);
        self.core.draw_states(set_id, StateLayer::Underlay);
        self.core.draw_all_primitives();

        if let Some(camera) = self
            .core
            .world
            .sets
            .get(set_id)
            .and_then(Set::current_setup)
            .map(|setup| setup.camera)
        {
            self.core.renderer.setup_camera(&camera);
        }
        self.core.renderer.set_3d_mode();

        if self.core.sets.take_setup_changed() {
            let setup = self
                .core
                .world
                .sets
                .get(set_id)
                .map_or(0, |set| set.current_setup);
            self.require_callback(POST_CAM_CHANGE_HANDLER, &[ScriptValue::Int(setup as i32)])?;
        }

        self.core.draw_actors();
        if let Some(set_id) = self.core.sets.current() {
            self.core.draw_states(set_id, StateLayer::Overlay);
        }
        self.core.renderer.draw_buffers();
        self.core.draw_overlays();
        Ok(())
    }

    /// Presents the back buffer unless the draw asked to keep the last frame.
    pub fn do_flip(&mut self) -> Result<(), EngineError> {
        self.core.present()
    }
}

impl EngineCore {
    fn draw_movie_overlay(&mut self) {
        if self.movie.is_playing() {
            self.times.movie_time_ms = self.movie.movie_time_ms();
            if self.movie.is_update_needed() {
                self.movie.clear_update_needed();
            }
            match self.movie.frame() {
                Some(frame) if self.prev_smush_frame != Some(frame.number) => {
                    self.prev_smush_frame = Some(frame.number);
                    self.renderer.draw_movie_frame(&frame);
                }
                Some(_) => self.do_flip = false,
                None => self.renderer.release_movie_frame(),
            }
        }
        self.draw_all_primitives();
        self.draw_overlays();
    }

    fn draw_background(&mut self, set_id: Id<Set>) {
        let background = self
            .world
            .sets
            .get(set_id)
            .and_then(Set::current_setup)
            .and_then(|setup| setup.background);
        if let Some((id, bitmap)) =
            background.and_then(|id| self.world.bitmaps.get(id).map(|bitmap| (id, bitmap)))
        {
            self.renderer.draw_bitmap(id, bitmap);
        }
    }

    /// Visible states of the current setup on one layer, in set order.
    fn draw_states(&mut self, set_id: Id<Set>, layer: StateLayer) {
        let Some(set) = self.world.sets.get(set_id) else {
            return;
        };
        let setup = set.current_setup as u32;
        for state_id in &set.states {
            let Some(state) = self.world.object_states.get(*state_id) else {
                continue;
            };
            if !state.visible || state.layer != layer || state.setup != setup {
                continue;
            }
            let Some(id) = state.bitmap else {
                continue;
            };
            if let Some(bitmap) = self.world.bitmaps.get(id) {
                self.renderer.draw_bitmap(id, bitmap);
            }
        }
    }

    fn draw_scene_movie(&mut self, set_id: Id<Set>) {
        if !self.movie.is_playing() {
            return;
        }
        let matches_setup = self
            .world
            .sets
            .get(set_id)
            .is_some_and(|set| set.current_setup_name() == self.movie_setup);
        if !matches_setup {
            return;
        }
        if let Some(frame) = self.movie.frame() {
            self.renderer.draw_movie_frame(&frame);
        }
    }

    fn draw_all_primitives(&mut self) {
        for (_, primitive) in self.world.primitives.iter() {
            self.renderer.draw_primitive(primitive);
        }
    }

    fn draw_actors(&mut self) {
        let current = self.sets.current_set_name(&self.world);
        self.actors.rebuild(&self.world, current, self.modes.mode());
        for id in self.actors.actors() {
            if let Some(actor) = self.world.actors.get(*id).filter(|actor| actor.visible) {
                self.renderer.draw_actor(*id, actor);
            }
        }
    }

    /// Iris, then the subtitle while a movie plays or every text otherwise.
    fn draw_overlays(&mut self) {
        self.iris.draw(self.renderer.as_mut());
        if self.modes.mode() == EngineMode::Smush {
            if let Some(subtitle) = self
                .movie_subtitle
                .and_then(|id| self.world.text_objects.get(id))
            {
                self.renderer.draw_text(subtitle);
            }
        } else {
            for (_, text) in self.world.text_objects.iter() {
                self.renderer.draw_text(text);
            }
        }
    }

    pub(crate) fn present(&mut self) -> Result<(), EngineError> {
        self.fps.record_frame();
        if !self.do_flip {
            return Ok(());
        }
        let overlay = self.config.show_fps && self.modes.mode() != EngineMode::Draw;
        if overlay {
            self.renderer
                .draw_emerg_string(FPS_TEXT_POS, self.fps.text(), Color::WHITE);
        }
        self.renderer.flip_buffer()?;
        if let Some(fps) = self.fps.maybe_estimate(self.clock.now_ms()) {
            debug!(fps, "fps_estimate");
        }
        self.metrics.publish(LoopMetricsSnapshot {
            fps: self.fps.fps(),
            frame_time_ms: self.times.frame_time_ms,
            frames_presented: self.fps.frames_total(),
        });
        Ok(())
    }
}
