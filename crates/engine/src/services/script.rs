use crate::app::{EngineCore, EngineError};
use crate::savegame::{SaveError, SaveReader, SaveWriter};

pub const PAUSE_HANDLER: &str = "pauseHandler";
pub const EXIT_HANDLER: &str = "exitHandler";
pub const USER_PAINT_HANDLER: &str = "userPaintHandler";
pub const CAM_CHANGE_HANDLER: &str = "camChangeHandler";
pub const POST_CAM_CHANGE_HANDLER: &str = "postCamChangeHandler";
pub const SAVE_GAME_CALLBACK: &str = "saveGameCallback";
pub const BUTTON_HANDLER: &str = "buttonHandler";

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Nil,
    Bool(bool),
    Int(i32),
    Str(String),
}

/// Time fed to one script update pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameTiming {
    pub frame_time_ms: u32,
    pub movie_time_ms: u32,
}

/// Script interpreter consumed by the engine.
///
/// Scripts act on the engine through the `EngineCore` they are handed. Calls
/// that would re-enter the script (camera change notifications) are queued on
/// the core and delivered once the current call returns.
pub trait ScriptEngine {
    fn boot(&mut self, _core: &mut EngineCore) -> Result<(), EngineError> {
        Ok(())
    }

    fn update(&mut self, timing: FrameTiming, core: &mut EngineCore) -> Result<(), EngineError>;

    /// Runs the named handler; `Ok(false)` means the script defines no such handler.
    fn callback(
        &mut self,
        name: &str,
        args: &[ScriptValue],
        core: &mut EngineCore,
    ) -> Result<bool, EngineError>;

    fn post_restore(&mut self, _core: &mut EngineCore) {}

    fn save_state(&self, sink: &mut SaveWriter);
    fn restore_state(&mut self, source: &mut SaveReader<'_>) -> Result<(), SaveError>;
}
