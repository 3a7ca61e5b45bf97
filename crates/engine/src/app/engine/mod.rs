//! The engine context: every piece of live game state plus the collaborators
//! that act on it, constructed in one place and torn down together.

mod display;
mod persistence;
mod update;


use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, GameVariant, TargetPlatform};
use crate::savegame::{SaveError, SaveStorage, SaveTarget, SAVE_MINOR_VERSION};
use crate::services::{
    AudioEngine, MoviePlayer, Platform, Renderer, RendererError, RendererFactory, ResourceError,
    ResourceLoader, ScriptEngine, ScriptValue, CAM_CHANGE_HANDLER,
};
use crate::world::{Actor, Id, Point, Set, TextDefaults, TextObject, World};

use super::active_actors::ActiveActorCache;
use super::clock::Clock;
use super::input::{ControlTable, KeyCode};
use super::iris::{Iris, IrisDirection};
use super::metrics::{FpsCounter, MetricsHandle};
use super::mode::{EngineMode, ModeController};
use super::set_manager::{SetManager, SetupChange};

pub use persistence::RestoreOutcome;

pub const DEFAULT_TEXT_SPEED: i32 = 7;
const MIN_TEXT_SPEED: i32 = 1;
const MAX_TEXT_SPEED: i32 = 10;

/// Conditions the engine cannot continue from.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("could not find scene file {name}")]
    SetNotFound { name: String },
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error("script defines no {0} handler")]
    MissingHandler(&'static str),
    #[error("renderer could not capture a save screenshot")]
    ScreenshotUnavailable,
    #[error("save game failed: {0}")]
    Save(#[from] SaveError),
    #[error(transparent)]
    Renderer(#[from] RendererError),
    #[error("device reset could not restore the in-memory save")]
    DeviceReset,
    #[error("script error: {0}")]
    Script(String),
}

/// Subsystems handed to the engine at construction.
pub struct Collaborators {
    pub renderer_factory: Box<dyn RendererFactory>,
    pub audio: Box<dyn AudioEngine>,
    pub movie: Box<dyn MoviePlayer>,
    pub resources: Box<dyn ResourceLoader>,
    pub platform: Box<dyn Platform>,
    pub clock: Box<dyn Clock>,
}

/// Display changes applied between frames by saving, rebuilding the
/// renderer and restoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceReset {
    ToggleFullscreen,
    SwitchRenderer,
}

#[derive(Debug, Default)]
pub(crate) struct Requests {
    pub(crate) save: Option<SaveTarget>,
    pub(crate) load: Option<SaveTarget>,
    pub(crate) toggle_fullscreen: bool,
    pub(crate) switch_renderer: bool,
    pub(crate) quit: bool,
}

impl Requests {
    pub(crate) fn device_reset_pending(&self) -> bool {
        self.toggle_fullscreen || self.switch_renderer
    }

    /// Anything that must run before the world may be mutated again.
    pub(crate) fn transition_pending(&self) -> bool {
        self.save.is_some() || self.load.is_some() || self.device_reset_pending()
    }
}

#[derive(Debug, Default)]
pub(crate) struct FrameTimes {
    pub(crate) frame_start_ms: u64,
    pub(crate) frame_time_ms: u32,
    pub(crate) movie_time_ms: u32,
    pub(crate) pause_start_ms: u64,
    pub(crate) paused: bool,
    pub(crate) short_frame: bool,
    reset_short_frame: bool,
}

/// Deferred script notifications raised while the script itself is running.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PendingCallback {
    CameraChange(SetupChange),
}

/// Live game state and collaborators. Scripts receive this to act on the game.
pub struct EngineCore {
    config: EngineConfig,
    pub world: World,
    modes: ModeController,
    actors: ActiveActorCache,
    sets: SetManager,
    selected_actor: Option<Id<Actor>>,
    text_defaults: TextDefaults,
    movie_subtitle: Option<Id<TextObject>>,
    movie_setup: String,
    text_speed: i32,
    iris: Iris,
    controls: ControlTable,
    pub(crate) requests: Requests,
    pub(crate) times: FrameTimes,
    prev_smush_frame: Option<u32>,
    do_flip: bool,
    fps: FpsCounter,
    pending_music_state: Option<i32>,
    pending_callbacks: Vec<PendingCallback>,
    renderer: Box<dyn Renderer>,
    renderer_factory: Box<dyn RendererFactory>,
    audio: Box<dyn AudioEngine>,
    movie: Box<dyn MoviePlayer>,
    resources: Box<dyn ResourceLoader>,
    platform: Box<dyn Platform>,
    clock: Box<dyn Clock>,
    storage: SaveStorage,
    /// Format minor version new saves are written with.
    pub(crate) save_minor: u16,
    metrics: MetricsHandle,
}

impl EngineCore {
    fn new(
        config: EngineConfig,
        storage: SaveStorage,
        mut collaborators: Collaborators,
    ) -> Result<Self, EngineError> {
        let renderer = collaborators
            .renderer_factory
            .create(&config.renderer_config())?;
        let mut requests = Requests::default();
        if let Some(slot) = config.save_slot {
            let target = storage.slot_target(config.game, slot);
            info!(target = %target.describe(), "boot_restore_requested");
            requests.load = Some(target);
        }
        Ok(Self {
            config,
            world: World::default(),
            modes: ModeController::default(),
            actors: ActiveActorCache::default(),
            sets: SetManager::default(),
            selected_actor: None,
            text_defaults: TextDefaults::default(),
            movie_subtitle: None,
            movie_setup: String::new(),
            text_speed: DEFAULT_TEXT_SPEED,
            iris: Iris::default(),
            controls: ControlTable::default(),
            requests,
            times: FrameTimes::default(),
            prev_smush_frame: None,
            do_flip: true,
            fps: FpsCounter::default(),
            pending_music_state: None,
            pending_callbacks: Vec::new(),
            renderer,
            renderer_factory: collaborators.renderer_factory,
            audio: collaborators.audio,
            movie: collaborators.movie,
            resources: collaborators.resources,
            platform: collaborators.platform,
            clock: collaborators.clock,
            storage,
            save_minor: SAVE_MINOR_VERSION,
            metrics: MetricsHandle::default(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn variant(&self) -> GameVariant {
        self.config.game
    }

    pub(crate) fn is_ps2(&self) -> bool {
        self.config.platform == TargetPlatform::Ps2
    }

    pub fn metrics(&self) -> MetricsHandle {
        self.metrics.clone()
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn frame_time_ms(&self) -> u32 {
        self.times.frame_time_ms
    }

    pub fn movie_time_ms(&self) -> u32 {
        self.times.movie_time_ms
    }

    pub fn fps(&self) -> f32 {
        self.fps.fps()
    }

    // Modes

    pub fn mode(&self) -> EngineMode {
        self.modes.mode()
    }

    pub fn previous_mode(&self) -> EngineMode {
        self.modes.previous_mode()
    }

    pub fn set_mode(&mut self, mode: EngineMode) {
        debug!(from = %self.modes.mode(), to = %mode, "mode_changed");
        self.modes.set_mode(mode, &mut self.actors);
    }

    pub fn set_previous_mode(&mut self, mode: EngineMode) {
        self.modes.set_previous_mode(mode);
    }

    // Sets

    pub fn current_set(&self) -> Option<Id<Set>> {
        self.sets.current()
    }

    pub fn current_set_name(&self) -> Option<&str> {
        self.sets.current_set_name(&self.world)
    }

    pub fn load_set(&mut self, name: &str) -> Result<Id<Set>, EngineError> {
        self.sets.load_set(
            name,
            &mut self.world,
            self.resources.as_mut(),
            self.config.game,
        )
    }

    pub fn set_set(&mut self, id: Id<Set>) {
        let swapped = self.sets.set_set(
            id,
            &mut self.world,
            &mut self.actors,
            self.renderer.as_mut(),
            self.config.game,
        );
        if swapped {
            self.times.short_frame = true;
        }
    }

    /// Loads the named set if needed and makes it current.
    pub fn set_set_by_name(&mut self, name: &str) -> Result<Id<Set>, EngineError> {
        let id = self.load_set(name)?;
        self.set_set(id);
        Ok(id)
    }

    pub fn set_set_lock(&mut self, name: &str, locked: bool) -> bool {
        self.sets.set_set_lock(name, locked, &mut self.world)
    }

    /// The camera-change handler runs once the current script call returns.
    pub fn make_current_setup(&mut self, index: usize) {
        if let Some(change) =
            self.sets
                .make_current_setup(index, &mut self.world, self.renderer.as_mut())
        {
            self.pending_callbacks
                .push(PendingCallback::CameraChange(change));
        }
    }

    // Actors

    pub fn selected_actor(&self) -> Option<Id<Actor>> {
        self.selected_actor
    }

    pub fn set_selected_actor(&mut self, actor: Option<Id<Actor>>) {
        self.selected_actor = actor;
    }

    pub fn invalidate_active_actors(&mut self) {
        self.actors.invalidate();
    }

    /// Active actors for the current set and mode, rebuilding if stale.
    pub fn active_actors(&mut self) -> &[Id<Actor>] {
        self.rebuild_active_actors();
        self.actors.actors()
    }

    pub fn immediately_remove_actor(&mut self, actor: Id<Actor>) {
        self.actors.immediately_remove(actor);
    }

    pub fn talking_actors(&self) -> &[Id<Actor>] {
        self.actors.talking()
    }

    pub fn add_talking_actor(&mut self, actor: Id<Actor>) {
        self.actors.add_talking(actor);
    }

    pub fn are_actors_talking(&self) -> bool {
        self.actors.are_actors_talking(&self.world)
    }

    fn rebuild_active_actors(&mut self) {
        let current = self.sets.current_set_name(&self.world);
        self.actors.rebuild(&self.world, current, self.modes.mode());
    }

    // Text

    pub fn text_defaults(&self) -> &TextDefaults {
        &self.text_defaults
    }

    pub fn text_defaults_mut(&mut self) -> &mut TextDefaults {
        &mut self.text_defaults
    }

    pub fn text_speed(&self) -> i32 {
        self.text_speed
    }

    pub fn set_text_speed(&mut self, speed: i32) {
        self.text_speed = speed.clamp(MIN_TEXT_SPEED, MAX_TEXT_SPEED);
    }

    pub fn movie_subtitle(&self) -> Option<Id<TextObject>> {
        self.movie_subtitle
    }

    /// Replacing the subtitle destroys the previous subtitle text.
    pub fn set_movie_subtitle(&mut self, subtitle: Option<Id<TextObject>>) {
        if self.movie_subtitle == subtitle {
            return;
        }
        if let Some(previous) = self.movie_subtitle.take() {
            self.world.text_objects.remove(previous);
        }
        self.movie_subtitle = subtitle;
    }

    // Movie, audio, iris

    pub fn movie_setup(&self) -> &str {
        &self.movie_setup
    }

    pub fn set_movie_setup(&mut self, setup: impl Into<String>) {
        self.movie_setup = setup.into();
    }

    /// Starts a movie; in-scene movies belong to the setup current at start.
    pub fn play_movie(&mut self, name: &str, pos: Point) -> bool {
        if let Some(set) = self.sets.current_set(&self.world) {
            self.movie_setup = set.current_setup_name().to_string();
        }
        self.movie.play(name, pos)
    }

    pub fn movie(&self) -> &dyn MoviePlayer {
        self.movie.as_ref()
    }

    pub fn movie_mut(&mut self) -> &mut dyn MoviePlayer {
        self.movie.as_mut()
    }

    pub fn audio(&self) -> &dyn AudioEngine {
        self.audio.as_ref()
    }

    /// Forwarded to the audio engine at the end of the frame.
    pub fn queue_music_state(&mut self, state: i32) {
        self.pending_music_state = Some(state);
    }

    pub fn iris(&self) -> &Iris {
        &self.iris
    }

    pub fn play_iris(&mut self, direction: IrisDirection, target: Point, length_ms: i32) {
        self.iris.play(direction, target, length_ms);
    }

    pub fn renderer(&self) -> &dyn Renderer {
        self.renderer.as_ref()
    }

    // Controls

    pub fn enable_control(&mut self, key: KeyCode, enabled: bool) {
        self.controls.set_enabled(key, enabled);
    }

    pub fn control_state(&self, key: KeyCode) -> bool {
        self.controls.is_pressed(key)
    }

    pub(crate) fn clear_event_queue(&mut self) {
        self.platform.clear_events();
        self.controls.clear_state();
    }

    // Requests

    pub fn request_save(&mut self, name: &str) {
        self.requests.save = Some(self.storage.file_target(self.config.game, name));
    }

    pub fn request_load(&mut self, name: &str) {
        self.requests.load = Some(self.storage.file_target(self.config.game, name));
    }

    pub fn request_save_slot(&mut self, slot: u32) {
        self.requests.save = Some(self.storage.slot_target(self.config.game, slot));
    }

    pub fn request_load_slot(&mut self, slot: u32) {
        self.requests.load = Some(self.storage.slot_target(self.config.game, slot));
    }

    pub fn request_device_reset(&mut self, reset: DeviceReset) {
        match reset {
            DeviceReset::ToggleFullscreen => self.requests.toggle_fullscreen = true,
            DeviceReset::SwitchRenderer => self.requests.switch_renderer = true,
        }
    }

    pub fn request_quit(&mut self) {
        self.requests.quit = true;
    }

    pub fn quit_requested(&self) -> bool {
        self.requests.quit
    }

    /// Pauses audio and video from outside the game; on resume the frame
    /// clock skips the paused interval.
    pub fn pause_engine(&mut self, pause: bool) {
        if self.times.paused == pause {
            return;
        }
        self.times.paused = pause;
        self.audio.pause(pause);
        self.movie.pause(pause);
        let now = self.clock.now_ms();
        if pause {
            self.times.pause_start_ms = now;
        } else {
            let paused_for = now.saturating_sub(self.times.pause_start_ms);
            self.times.frame_start_ms = self.times.frame_start_ms.saturating_add(paused_for);
        }
        debug!(pause, "engine_paused");
    }

    pub fn is_engine_paused(&self) -> bool {
        self.times.paused
    }

    /// Resets per-run timing; called once before the first frame.
    pub(crate) fn start_timing(&mut self) {
        let now = self.clock.now_ms();
        self.times = FrameTimes {
            frame_start_ms: now,
            ..FrameTimes::default()
        };
        self.prev_smush_frame = None;
        self.fps.reset(now);
        self.sets.mark_setup_changed();
    }

    /// Frames that skip the script pass still move the frame start, so the
    /// first script pass afterwards does not see the skipped time.
    pub(crate) fn hold_frame_clock(&mut self) {
        self.times.frame_start_ms = self.times.frame_start_ms.max(self.clock.now_ms());
        self.times.frame_time_ms = 0;
    }

    /// Keeps a requested short frame alive for exactly two iterations.
    pub(crate) fn advance_short_frame(&mut self) {
        if self.times.short_frame {
            if self.times.reset_short_frame {
                self.times.short_frame = false;
            }
            self.times.reset_short_frame = !self.times.reset_short_frame;
        }
    }

    pub fn is_short_frame(&self) -> bool {
        self.times.short_frame
    }

    pub(crate) fn flush_audio(&mut self) {
        self.audio.flush_tracks();
        self.audio.refresh_scripts();
    }

    pub(crate) fn forward_music_state(&mut self) {
        if let Some(state) = self.pending_music_state.take() {
            self.audio.set_music_state(state);
        }
    }

    pub(crate) fn sleep(&mut self, duration: std::time::Duration) {
        self.clock.sleep(duration);
    }
}

/// The engine context plus the script interpreter driving it.
pub struct Engine {
    core: EngineCore,
    script: Box<dyn ScriptEngine>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        storage: SaveStorage,
        collaborators: Collaborators,
        script: Box<dyn ScriptEngine>,
    ) -> Result<Self, EngineError> {
        let core = EngineCore::new(config, storage, collaborators)?;
        info!(
            game = ?core.config.game,
            platform = ?core.config.platform,
            width = core.renderer.screen_width(),
            height = core.renderer.screen_height(),
            "engine_created"
        );
        Ok(Self { core, script })
    }

    pub fn core(&self) -> &EngineCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut EngineCore {
        &mut self.core
    }

    pub fn script(&self) -> &dyn ScriptEngine {
        self.script.as_ref()
    }

    /// Runs the script's boot entry point.
    pub fn boot(&mut self) -> Result<(), EngineError> {
        self.script.boot(&mut self.core)?;
        self.dispatch_pending_callbacks()
    }

    /// Calls a lifecycle handler the script must define.
    pub(crate) fn require_callback(
        &mut self,
        name: &'static str,
        args: &[ScriptValue],
    ) -> Result<(), EngineError> {
        if !self.script.callback(name, args, &mut self.core)? {
            return Err(EngineError::MissingHandler(name));
        }
        self.dispatch_pending_callbacks()
    }

    /// Calls a handler the script may leave undefined.
    pub(crate) fn optional_callback(
        &mut self,
        name: &'static str,
        args: &[ScriptValue],
    ) -> Result<bool, EngineError> {
        let handled = self.script.callback(name, args, &mut self.core)?;
        if !handled {
            debug!(handler = name, "optional_handler_missing");
        }
        self.dispatch_pending_callbacks()?;
        Ok(handled)
    }

    pub(crate) fn dispatch_pending_callbacks(&mut self) -> Result<(), EngineError> {
        while !self.core.pending_callbacks.is_empty() {
            let pending = std::mem::take(&mut self.core.pending_callbacks);
            for callback in pending {
                match callback {
                    PendingCallback::CameraChange(change) => {
                        let args = [
                            ScriptValue::Int(change.previous as i32),
                            ScriptValue::Int(change.next as i32),
                        ];
                        if !self.script.callback(CAM_CHANGE_HANDLER, &args, &mut self.core)? {
                            warn!(handler = CAM_CHANGE_HANDLER, "required_handler_missing");
                            return Err(EngineError::MissingHandler(CAM_CHANGE_HANDLER));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
