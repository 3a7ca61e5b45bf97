use std::fmt;

use crate::savegame::SaveError;

use super::active_actors::ActiveActorCache;

/// Top-level engine state. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EngineMode {
    #[default]
    Normal,
    /// Script-driven menus and inventory drawn over a frozen scene.
    Draw,
    /// Full-motion video playback.
    Smush,
    Overworld,
    Pause,
}

/// How a frame is drawn in a given mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawPath {
    /// Current movie frame plus overlay primitives and subtitles.
    MovieOverlay,
    /// Background, states, video, underlays, actors and overlays in z-order.
    SceneComposite,
    /// Drops movie and timing state and repaints the stored display.
    Lightweight,
    Skip,
}

/// Per-mode behaviour of one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePolicy {
    pub draw: DrawPath,
    pub runs_script: bool,
    pub presents: bool,
    /// Actors, talk, iris and timed text advance after the script pass.
    pub updates_world: bool,
    /// Actors in the current set count as active.
    pub scene_actors_active: bool,
}

impl EngineMode {
    pub const ALL: [EngineMode; 5] = [
        EngineMode::Normal,
        EngineMode::Draw,
        EngineMode::Smush,
        EngineMode::Overworld,
        EngineMode::Pause,
    ];

    pub const fn policy(self) -> FramePolicy {
        match self {
            EngineMode::Normal => FramePolicy {
                draw: DrawPath::SceneComposite,
                runs_script: true,
                presents: true,
                updates_world: true,
                scene_actors_active: true,
            },
            EngineMode::Overworld => FramePolicy {
                draw: DrawPath::SceneComposite,
                runs_script: true,
                presents: true,
                updates_world: false,
                scene_actors_active: false,
            },
            EngineMode::Smush => FramePolicy {
                draw: DrawPath::MovieOverlay,
                runs_script: true,
                presents: true,
                updates_world: true,
                scene_actors_active: false,
            },
            EngineMode::Draw => FramePolicy {
                draw: DrawPath::Lightweight,
                runs_script: true,
                presents: true,
                updates_world: false,
                scene_actors_active: true,
            },
            EngineMode::Pause => FramePolicy {
                draw: DrawPath::Skip,
                runs_script: false,
                presents: false,
                updates_world: false,
                scene_actors_active: false,
            },
        }
    }

    pub(crate) const fn to_u32(self) -> u32 {
        match self {
            EngineMode::Normal => 1,
            EngineMode::Smush => 2,
            EngineMode::Draw => 3,
            EngineMode::Overworld => 4,
            EngineMode::Pause => 5,
        }
    }

    pub(crate) fn from_u32(value: u32) -> Result<Self, SaveError> {
        match value {
            1 => Ok(EngineMode::Normal),
            2 => Ok(EngineMode::Smush),
            3 => Ok(EngineMode::Draw),
            4 => Ok(EngineMode::Overworld),
            5 => Ok(EngineMode::Pause),
            other => Err(SaveError::invalid_format(format!(
                "invalid engine mode {other}"
            ))),
        }
    }
}

impl fmt::Display for EngineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineMode::Normal => "normal",
            EngineMode::Draw => "draw",
            EngineMode::Smush => "smush",
            EngineMode::Overworld => "overworld",
            EngineMode::Pause => "pause",
        };
        f.write_str(name)
    }
}

/// Current and previous engine mode. The previous mode is only changed on
/// request; scripts record it before entering menus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeController {
    mode: EngineMode,
    previous: EngineMode,
}

impl ModeController {
    pub fn mode(&self) -> EngineMode {
        self.mode
    }

    pub fn previous_mode(&self) -> EngineMode {
        self.previous
    }

    pub fn policy(&self) -> FramePolicy {
        self.mode.policy()
    }

    /// Any transition is allowed, including to the current mode; the active
    /// actor set always goes stale.
    pub fn set_mode(&mut self, mode: EngineMode, actors: &mut ActiveActorCache) {
        self.mode = mode;
        actors.invalidate();
    }

    pub fn set_previous_mode(&mut self, mode: EngineMode) {
        self.previous = mode;
    }

    pub(crate) fn restore(&mut self, mode: EngineMode, previous: EngineMode) {
        self.mode = mode;
        self.previous = previous;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_transition_invalidates_active_actors() {
        for from in EngineMode::ALL {
            for to in EngineMode::ALL {
                let mut modes = ModeController::default();
                let mut actors = ActiveActorCache::default();
                modes.set_mode(from, &mut actors);
                actors.mark_clean_for_test();
                modes.set_mode(to, &mut actors);
                assert!(actors.is_dirty(), "{from} -> {to}");
                assert_eq!(modes.mode(), to);
            }
        }
    }

    #[test]
    fn set_mode_leaves_previous_mode_alone() {
        let mut modes = ModeController::default();
        let mut actors = ActiveActorCache::default();
        modes.set_previous_mode(EngineMode::Normal);
        modes.set_mode(EngineMode::Draw, &mut actors);
        assert_eq!(modes.previous_mode(), EngineMode::Normal);
    }

    #[test]
    fn pause_runs_neither_draw_nor_script() {
        let policy = EngineMode::Pause.policy();
        assert_eq!(policy.draw, DrawPath::Skip);
        assert!(!policy.runs_script);
        assert!(!policy.presents);
    }

    #[test]
    fn mode_encoding_is_stable() {
        for mode in EngineMode::ALL {
            assert_eq!(EngineMode::from_u32(mode.to_u32()).expect("mode"), mode);
        }
        assert!(EngineMode::from_u32(0).is_err());
    }
}
