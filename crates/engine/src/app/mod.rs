mod active_actors;
mod clock;
mod engine;
mod input;
mod iris;
mod loop_runner;
mod metrics;
mod mode;
mod set_manager;

pub use active_actors::ActiveActorCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{
    Collaborators, DeviceReset, Engine, EngineCore, EngineError, RestoreOutcome,
    DEFAULT_TEXT_SPEED,
};
pub use input::{ControlTable, InputEvent, KeyCode};
pub use iris::{Iris, IrisDirection};
pub use loop_runner::{FrameOutcome, FrameScheduler};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use mode::{DrawPath, EngineMode, FramePolicy, ModeController};
pub use set_manager::{SetManager, SetupChange};
