use tracing::{debug, error, info, warn};

use crate::savegame::{
    SaveError, SaveReader, SaveTarget, SaveWriter, Tag, Thumbnail, DEVICE_RESET_SLOT,
    MINOR_MOVIE_SETUP, MINOR_MOVIE_SUBTITLE, MINOR_TEXT_SPEED, THUMBNAIL_HEIGHT, THUMBNAIL_WIDTH,
};
use crate::services::{RendererConfig, SAVE_GAME_CALLBACK};
use crate::world::{Set, TextStyle};

use super::super::mode::EngineMode;
use super::{Engine, EngineCore, EngineError, DEFAULT_TEXT_SPEED};

pub(super) const SAVE_FAILED_MESSAGE: &str = "Error: the game could not be saved.";

/// Result of a restore that did not hit a fatal condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored,
    /// The target was missing or written by an incompatible build; nothing changed.
    Rejected,
}

impl Engine {
    /// Writes the whole game to `target`. Failing to open the target is shown
    /// to the player and leaves the game running untouched.
    pub fn save_game(&mut self, target: &SaveTarget) -> Result<(), EngineError> {
        if let Err(error) = self.core.storage.open_for_saving(target) {
            warn!(target = %target.describe(), %error, "save_failed");
            self.core.platform.display_error(SAVE_FAILED_MESSAGE);
            return Ok(());
        }

        let mut sink = SaveWriter::with_version(self.core.save_minor);
        self.capture_screenshot()?.write(&mut sink);

        self.core.audio.pause(true);
        self.core.movie.pause(true);
        self.require_callback(SAVE_GAME_CALLBACK, &[])?;

        let core = &mut self.core;
        core.world.save_pools(&mut sink, core.config.game);
        core.save_engine_section(&mut sink);
        sink.begin_section(Tag::RENDERER);
        core.renderer.save_state(&mut sink);
        sink.begin_section(Tag::AUDIO);
        core.audio.save_state(&mut sink);
        sink.begin_section(Tag::MOVIE);
        core.movie.save_state(&mut sink);
        sink.begin_section(Tag::IRIS);
        core.iris.save(&mut sink);
        sink.begin_section(Tag::SCRIPT);
        self.script.save_state(&mut sink);
        let bytes = sink.finish();

        let core = &mut self.core;
        let committed = core.storage.commit(target, bytes);
        core.audio.pause(false);
        core.movie.pause(false);
        match committed {
            Ok(()) => {
                core.times.short_frame = true;
                core.clear_event_queue();
            }
            Err(error) => {
                warn!(target = %target.describe(), %error, "save_failed");
                core.platform.display_error(SAVE_FAILED_MESSAGE);
            }
        }
        Ok(())
    }

    /// Replaces the game with the contents of `target`. A missing or
    /// incompatible target is rejected before anything changes; damage found
    /// after that is fatal.
    pub fn restore_game(&mut self, target: &SaveTarget) -> Result<RestoreOutcome, EngineError> {
        let Some(bytes) = self.core.storage.open_for_loading(target)? else {
            warn!(target = %target.describe(), "restore_target_missing");
            return Ok(RestoreOutcome::Rejected);
        };
        let mut source = match SaveReader::new(&bytes) {
            Ok(source) => source,
            Err(error) => {
                warn!(target = %target.describe(), %error, "restore_rejected");
                return Ok(RestoreOutcome::Rejected);
            }
        };
        if !source.is_compatible() {
            let header = source.header();
            warn!(
                target = %target.describe(),
                major = header.major,
                minor = header.minor,
                "restore_incompatible_version"
            );
            return Ok(RestoreOutcome::Rejected);
        }
        source.verify_digest()?;

        let core = &mut self.core;
        core.audio.stop_all_sounds();
        core.audio.reset_state();
        core.movie.stop();
        core.audio.pause(true);
        core.movie.pause(true);
        core.selected_actor = None;
        core.sets.restore_current(None);
        core.actors.clear();

        if let Err(error) = self.restore_sections(&mut source) {
            error!(target = %target.describe(), %error, "restore_failed");
            return Err(error);
        }

        self.script.post_restore(&mut self.core);
        self.dispatch_pending_callbacks()?;
        let core = &mut self.core;
        core.audio.pause(false);
        core.movie.pause(false);
        core.times.short_frame = true;
        core.clear_event_queue();
        core.actors.invalidate();
        core.rebuild_active_actors();
        core.renderer.refresh_buffers();
        if let Some(camera) = core
            .sets
            .current_set(&core.world)
            .and_then(Set::current_setup)
            .map(|setup| setup.camera)
        {
            core.renderer.setup_camera(&camera);
        }
        core.renderer.set_3d_mode();
        for (id, _) in core.world.actors.iter() {
            core.renderer.restore_clean_buffer(id);
        }
        info!(
            target = %target.describe(),
            minor = source.minor(),
            actors = core.world.actors.len(),
            "save_restored"
        );
        Ok(RestoreOutcome::Restored)
    }

    fn restore_sections(&mut self, source: &mut SaveReader<'_>) -> Result<(), EngineError> {
        Thumbnail::read(source)?;
        let core = &mut self.core;
        core.world.restore_pools(source, core.config.game)?;
        core.restore_engine_section(source)?;

        source.begin_section(Tag::RENDERER)?;
        core.renderer.restore_state(source)?;
        source.end_section()?;
        source.begin_section(Tag::AUDIO)?;
        core.audio.restore_state(source)?;
        source.end_section()?;
        source.begin_section(Tag::MOVIE)?;
        core.movie.restore_state(source)?;
        source.end_section()?;
        source.begin_section(Tag::IRIS)?;
        core.iris.restore(source)?;
        source.end_section()?;
        source.begin_section(Tag::SCRIPT)?;
        self.script.restore_state(source)?;
        source.end_section()?;
        Ok(())
    }

    /// Redraws in the previous mode and grabs the save thumbnail.
    fn capture_screenshot(&mut self) -> Result<Thumbnail, EngineError> {
        let mode = self.core.mode();
        let previous = self.core.previous_mode();
        self.core.set_mode(previous);
        let drawn = self.update_display_scene();
        self.core.renderer.store_display();
        let screenshot = self
            .core
            .renderer
            .get_screenshot(THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT);
        self.core.set_mode(mode);
        drawn?;
        screenshot.ok_or(EngineError::ScreenshotUnavailable)
    }

    /// Rebuilds the display by saving to memory, recreating the renderer with
    /// the requested settings and restoring.
    pub fn device_reset(&mut self) -> Result<(), EngineError> {
        let core = &mut self.core;
        let toggle_fullscreen = std::mem::take(&mut core.requests.toggle_fullscreen);
        let switch_renderer = std::mem::take(&mut core.requests.switch_renderer);
        let config = RendererConfig {
            width: core.renderer.screen_width(),
            height: core.renderer.screen_height(),
            fullscreen: core.renderer.is_fullscreen() ^ toggle_fullscreen,
            software: core.renderer.is_software() ^ switch_renderer,
        };
        core.config.fullscreen = config.fullscreen;
        core.config.soft_renderer = config.software;
        let mode = core.mode();

        let target = SaveTarget::Memory(DEVICE_RESET_SLOT.to_string());
        self.save_game(&target)?;
        let core = &mut self.core;
        core.world.clear_all();
        core.actors.clear();
        core.sets.restore_current(None);

        core.renderer = core.renderer_factory.create(&config)?;
        let outcome = self.restore_game(&target);
        if let Err(error) = self.core.storage.take_memory_slot(DEVICE_RESET_SLOT) {
            debug!(%error, "device_reset_slot_missing");
        }
        if outcome? == RestoreOutcome::Rejected {
            return Err(EngineError::DeviceReset);
        }

        if mode == EngineMode::Draw {
            self.core.set_mode(EngineMode::Normal);
            self.update_display_scene()?;
            self.core.renderer.store_display();
            self.core.renderer.dim_screen();
        }
        self.core.set_mode(mode);
        info!(
            fullscreen = config.fullscreen,
            software = config.software,
            mode = %mode,
            "device_reset"
        );
        Ok(())
    }
}

impl EngineCore {
    fn save_engine_section(&self, sink: &mut SaveWriter) {
        sink.begin_section(Tag::ENGINE);
        sink.write_u32(self.modes.mode().to_u32());
        sink.write_u32(self.modes.previous_mode().to_u32());
        sink.write_id(self.selected_actor);
        self.text_defaults.say_line.write(sink);
        if sink.minor() >= MINOR_MOVIE_SUBTITLE {
            sink.write_id(self.movie_subtitle);
        }
        sink.write_id(self.sets.current());
        if sink.minor() >= MINOR_MOVIE_SETUP {
            sink.write_string(&self.movie_setup);
        }
        if sink.minor() >= MINOR_TEXT_SPEED {
            sink.write_i32(self.text_speed);
        }
        sink.end_section();
    }

    /// Reads the engine section and checks every identity it names against
    /// the freshly restored pools.
    fn restore_engine_section(&mut self, source: &mut SaveReader<'_>) -> Result<(), SaveError> {
        source.begin_section(Tag::ENGINE)?;
        let mode = EngineMode::from_u32(source.read_u32()?)?;
        let previous = EngineMode::from_u32(source.read_u32()?)?;
        let selected_actor = source.read_id()?;
        let say_line = TextStyle::read(source)?;
        let movie_subtitle = if source.minor() >= MINOR_MOVIE_SUBTITLE {
            source.read_id()?
        } else {
            None
        };
        let current_set = source.read_id()?;
        let movie_setup = if source.minor() >= MINOR_MOVIE_SETUP {
            Some(source.read_string()?)
        } else {
            None
        };
        let text_speed = if source.minor() >= MINOR_TEXT_SPEED {
            source.read_i32()?
        } else {
            DEFAULT_TEXT_SPEED
        };
        source.end_section()?;

        self.world
            .actors
            .resolve_field("selected_actor", selected_actor)?;
        self.world.fonts.resolve_field("say_line.font", say_line.font)?;
        self.world
            .text_objects
            .resolve_field("movie_subtitle", movie_subtitle)?;
        self.world.sets.resolve_field("current_set", current_set)?;

        self.modes.restore(mode, previous);
        self.selected_actor = selected_actor;
        self.text_defaults.say_line = say_line;
        self.movie_subtitle = movie_subtitle;
        self.sets.restore_current(current_set);
        self.movie_setup = match movie_setup {
            Some(setup) => setup,
            None => self
                .sets
                .current_set(&self.world)
                .map(|set| set.current_setup_name().to_string())
                .unwrap_or_default(),
        };
        self.set_text_speed(text_speed);
        Ok(())
    }
}
