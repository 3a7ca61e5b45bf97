use lantern_engine::savegame::{SaveError, SaveReader, SaveWriter};
use lantern_engine::services::{
    FrameTiming, ScriptEngine, ScriptValue, BUTTON_HANDLER, CAM_CHANGE_HANDLER, EXIT_HANDLER,
    PAUSE_HANDLER, POST_CAM_CHANGE_HANDLER, SAVE_GAME_CALLBACK, USER_PAINT_HANDLER,
};
use lantern_engine::world::{Actor, Color, Id, Point, TextObject, TextStyle, Vec3};
use lantern_engine::{DeviceReset, EngineCore, EngineError, EngineMode, IrisDirection, KeyCode};
use tracing::{debug, info};

pub const START_SET: &str = "office.set";
const HALLWAY_SET: &str = "hallway.set";
const HERO: &str = "manny";
const DEMO_SLOT: u32 = 1;
const MOVIE_LENGTH_MS: u32 = 3_000;
const IRIS_LENGTH_MS: i32 = 600;
const TALK_EVERY_MS: u32 = 4_000;

const F9: KeyCode = KeyCode(KeyCode::F1.0 + 8);
const M: KeyCode = KeyCode(b'm' as u16);
const H: KeyCode = KeyCode(b'h' as u16);

const PATROL: [Vec3; 4] = [
    Vec3::new(-2.0, 0.0, 0.0),
    Vec3::new(2.0, 0.0, 0.0),
    Vec3::new(2.0, 1.5, 0.0),
    Vec3::new(-2.0, 1.5, 0.0),
];

const HELP_TEXT: &str =
    "F5 save  F9 load  F11 fullscreen  F1 renderer  SPACE camera  RETURN iris  M movie  H hallway  Q quit";

/// Built-in script: one actor patrols the office while the keys above drive
/// the engine's save, reset, camera, iris and movie paths.
#[derive(Debug, Default)]
pub struct DemoScript {
    patrol_index: u32,
    talk_timer_ms: u32,
    movie_timer_ms: u32,
    iris_closed: bool,
}

impl DemoScript {
    pub fn new() -> Self {
        Self::default()
    }

    fn hero(core: &EngineCore) -> Option<Id<Actor>> {
        core.world.find_actor_by_name(HERO)
    }

    fn on_button(&mut self, key: KeyCode, core: &mut EngineCore) -> Result<(), EngineError> {
        match key {
            KeyCode::F5 => core.request_save_slot(DEMO_SLOT),
            key if key == F9 => core.request_load_slot(DEMO_SLOT),
            KeyCode::F11 => core.request_device_reset(DeviceReset::ToggleFullscreen),
            KeyCode::F1 => core.request_device_reset(DeviceReset::SwitchRenderer),
            KeyCode::SPACE => {
                let next = core
                    .current_set()
                    .and_then(|id| core.world.sets.get(id))
                    .map(|set| (set.current_setup + 1) % set.setups.len().max(1));
                if let Some(next) = next {
                    core.make_current_setup(next);
                }
            }
            KeyCode::RETURN => {
                let direction = if self.iris_closed {
                    IrisDirection::Open
                } else {
                    IrisDirection::Close
                };
                self.iris_closed = !self.iris_closed;
                core.play_iris(direction, Point::new(320, 240), IRIS_LENGTH_MS);
            }
            key if key == M => {
                if core.play_movie("intro.snm", Point::default()) {
                    self.movie_timer_ms = 0;
                    core.set_mode(EngineMode::Smush);
                }
            }
            key if key == H => {
                let target = if core.current_set_name() == Some(START_SET) {
                    HALLWAY_SET
                } else {
                    START_SET
                };
                core.set_set_by_name(target)?;
                if let Some(hero) = Self::hero(core) {
                    if let Some(actor) = core.world.actors.get_mut(hero) {
                        actor.put_in_set(target);
                    }
                }
                core.invalidate_active_actors();
            }
            _ => {}
        }
        Ok(())
    }

    fn patrol(&mut self, timing: FrameTiming, core: &mut EngineCore) {
        let Some(hero) = Self::hero(core) else {
            return;
        };
        let talk_style = TextStyle {
            duration_ms: 2_000,
            ..core.text_defaults().say_line
        };
        self.talk_timer_ms = self.talk_timer_ms.saturating_add(timing.frame_time_ms);
        let Some(actor) = core.world.actors.get_mut(hero) else {
            return;
        };
        if !actor.walking {
            self.patrol_index = (self.patrol_index + 1) % PATROL.len() as u32;
            actor.walk_to(PATROL[self.patrol_index as usize]);
        }
        if self.talk_timer_ms >= TALK_EVERY_MS {
            self.talk_timer_ms = 0;
            actor.say_line(talk_style.duration_ms, false);
            core.add_talking_actor(hero);
            core.world
                .text_objects
                .create(TextObject::new("Nice rainy night.", talk_style));
        }
    }
}

impl ScriptEngine for DemoScript {
    fn boot(&mut self, core: &mut EngineCore) -> Result<(), EngineError> {
        core.set_set_by_name(START_SET)?;

        let mut hero = Actor::new(HERO);
        hero.put_in_set(START_SET);
        hero.pos = PATROL[0];
        hero.walk_rate = 1.5;
        hero.talk_color = Color::new(255, 210, 120);
        let hero = core.world.actors.create(hero);
        core.set_selected_actor(Some(hero));

        let say_line = &mut core.text_defaults_mut().say_line;
        say_line.pos = Point::new(40, 400);
        say_line.fg_color = Color::new(255, 210, 120);

        core.world.text_objects.create(TextObject::new(
            HELP_TEXT,
            TextStyle {
                pos: Point::new(8, 8),
                ..TextStyle::default()
            },
        ));

        for key in [
            KeyCode::F1,
            KeyCode::F5,
            F9,
            KeyCode::F11,
            KeyCode::SPACE,
            KeyCode::RETURN,
            M,
            H,
        ] {
            core.enable_control(key, true);
        }
        info!(set = START_SET, "demo_booted");
        Ok(())
    }

    fn update(&mut self, timing: FrameTiming, core: &mut EngineCore) -> Result<(), EngineError> {
        if core.mode() == EngineMode::Smush {
            self.movie_timer_ms = self.movie_timer_ms.saturating_add(timing.frame_time_ms);
            if self.movie_timer_ms >= MOVIE_LENGTH_MS || !core.movie().is_playing() {
                core.movie_mut().stop();
                core.set_mode(EngineMode::Normal);
            }
            return Ok(());
        }
        if core.mode() == EngineMode::Normal {
            self.patrol(timing, core);
        }
        Ok(())
    }

    fn callback(
        &mut self,
        name: &str,
        args: &[ScriptValue],
        core: &mut EngineCore,
    ) -> Result<bool, EngineError> {
        match name {
            PAUSE_HANDLER => {
                if core.mode() == EngineMode::Pause {
                    let previous = core.previous_mode();
                    core.set_mode(previous);
                } else {
                    core.set_previous_mode(core.mode());
                    core.set_mode(EngineMode::Pause);
                }
                info!(mode = ?core.mode(), "demo_pause_toggled");
            }
            EXIT_HANDLER => core.request_quit(),
            CAM_CHANGE_HANDLER | POST_CAM_CHANGE_HANDLER => {
                debug!(handler = name, ?args, "demo_camera_notified");
            }
            SAVE_GAME_CALLBACK => debug!("demo_save_callback"),
            USER_PAINT_HANDLER => debug!("demo_repaint"),
            BUTTON_HANDLER => {
                if let [ScriptValue::Int(code), ScriptValue::Bool(true)] = args {
                    if let Ok(code) = u16::try_from(*code) {
                        self.on_button(KeyCode(code), core)?;
                    }
                }
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn post_restore(&mut self, core: &mut EngineCore) {
        info!(set = ?core.current_set_name(), "demo_restored");
    }

    fn save_state(&self, sink: &mut SaveWriter) {
        sink.write_u32(self.patrol_index);
        sink.write_u32(self.talk_timer_ms);
        sink.write_u32(self.movie_timer_ms);
        sink.write_bool(self.iris_closed);
    }

    fn restore_state(&mut self, source: &mut SaveReader<'_>) -> Result<(), SaveError> {
        self.patrol_index = source.read_u32()? % PATROL.len() as u32;
        self.talk_timer_ms = source.read_u32()?;
        self.movie_timer_ms = source.read_u32()?;
        self.iris_closed = source.read_bool()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use lantern_engine::services::{
        parse_set_document, HeadlessPlatform, HeadlessRendererFactory, MemoryResourceLoader,
        NullAudioEngine, NullMoviePlayer,
    };
    use lantern_engine::{
        Collaborators, Engine, EngineConfig, FrameOutcome, FrameScheduler, InputEvent,
        ManualClock, SaveStorage,
    };

    use super::*;

    fn scheduler(platform: HeadlessPlatform) -> FrameScheduler {
        let mut resources = MemoryResourceLoader::new();
        for name in [START_SET, HALLWAY_SET] {
            let path = Path::new(env!("CARGO_MANIFEST_DIR"))
                .join("../../data")
                .join(name);
            let raw = fs::read_to_string(&path).expect("demo set file");
            resources.insert_set(name, parse_set_document(&path, &raw).expect("parse"));
        }
        let collaborators = Collaborators {
            renderer_factory: Box::new(HeadlessRendererFactory::new()),
            audio: Box::new(NullAudioEngine::new()),
            movie: Box::new(NullMoviePlayer::new()),
            resources: Box::new(resources),
            platform: Box::new(platform),
            clock: Box::new(ManualClock::new(0)),
        };
        let storage = SaveStorage::new(std::env::temp_dir());
        let mut engine = Engine::new(
            EngineConfig::default(),
            storage,
            collaborators,
            Box::new(DemoScript::new()),
        )
        .expect("engine");
        engine.boot().expect("boot");
        FrameScheduler::new(engine)
    }

    #[test]
    fn boot_enters_office_with_hero_selected() {
        let scheduler = scheduler(HeadlessPlatform::new());
        let core = scheduler.engine().core();
        assert_eq!(core.current_set_name(), Some(START_SET));
        let hero = core.world.find_actor_by_name(HERO);
        assert!(hero.is_some());
        assert_eq!(core.selected_actor(), hero);
    }

    #[test]
    fn hero_starts_patrolling_on_first_frames() {
        let mut scheduler = scheduler(HeadlessPlatform::new());
        scheduler.run_frames(5).expect("frames");
        let core = scheduler.engine().core();
        let hero = core.world.find_actor_by_name(HERO).expect("hero");
        let actor = core.world.actors.get(hero).expect("actor");
        assert!(actor.walking);
        assert_eq!(actor.walk_target, PATROL[1]);
    }

    #[test]
    fn space_cycles_camera_setup() {
        let platform = HeadlessPlatform::new();
        let mut scheduler = scheduler(platform.clone());
        scheduler.run_frames(1).expect("frame");
        platform.push_event(InputEvent::KeyDown(KeyCode::SPACE));
        scheduler.run_frames(1).expect("frame");
        let core = scheduler.engine().core();
        let set = core
            .current_set()
            .and_then(|id| core.world.sets.get(id))
            .expect("set");
        assert_eq!(set.current_setup_name(), "office_desk");
    }

    #[test]
    fn hallway_key_moves_hero_between_sets() {
        let platform = HeadlessPlatform::new();
        let mut scheduler = scheduler(platform.clone());
        platform.push_event(InputEvent::KeyDown(H));
        scheduler.run_frames(2).expect("frames");
        let core = scheduler.engine().core();
        assert_eq!(core.current_set_name(), Some(HALLWAY_SET));
        let hero = core.world.find_actor_by_name(HERO).expect("hero");
        assert!(core.world.actors.get(hero).expect("actor").is_in_set(HALLWAY_SET));
    }

    #[test]
    fn pause_key_toggles_pause_mode() {
        let platform = HeadlessPlatform::new();
        let mut scheduler = scheduler(platform.clone());
        platform.push_event(InputEvent::KeyDown(KeyCode::PAUSE));
        scheduler.run_frames(1).expect("frame");
        assert_eq!(scheduler.engine().core().mode(), EngineMode::Pause);
        platform.push_event(InputEvent::KeyDown(KeyCode::PAUSE));
        scheduler.run_frames(1).expect("frame");
        assert_eq!(scheduler.engine().core().mode(), EngineMode::Normal);
    }

    #[test]
    fn window_expose_runs_repaint_handler() {
        let platform = HeadlessPlatform::new();
        let mut scheduler = scheduler(platform.clone());
        platform.push_event(InputEvent::Expose);
        let outcome = scheduler.run_frames(1).expect("frame");
        assert_eq!(outcome, FrameOutcome::Continue);
        assert_eq!(platform.pending_events(), 0);
    }

    #[test]
    fn q_quits() {
        let platform = HeadlessPlatform::new();
        let mut scheduler = scheduler(platform.clone());
        platform.push_event(InputEvent::KeyDown(KeyCode::Q));
        let outcome = scheduler.run_frames(3).expect("frames");
        assert_eq!(outcome, FrameOutcome::Quit);
    }
}
