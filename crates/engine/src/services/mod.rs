//! Subsystems the engine drives but does not implement: rendering, audio,
//! video, scripting, the window system and resource files. Each comes with a
//! headless or null implementation for tools and tests.

mod audio;
mod movie;
mod platform;
mod renderer;
mod resources;
mod script;

pub use audio::{AudioEngine, NullAudioEngine};
pub use movie::{MovieFrame, MoviePlayer, NullMoviePlayer};
pub use platform::{HeadlessPlatform, Platform};
pub use renderer::{
    DrawCall, DrawLog, HeadlessRenderer, HeadlessRendererFactory, Renderer, RendererConfig,
    RendererError, RendererFactory,
};
pub use resources::{
    parse_set_document, BitmapDescriptor, DirResourceLoader, MemoryResourceLoader,
    ResourceError, ResourceLoader, SetDescriptor, SetupDescriptor, StateDescriptor,
};
pub use script::{
    FrameTiming, ScriptEngine, ScriptValue, BUTTON_HANDLER, CAM_CHANGE_HANDLER, EXIT_HANDLER,
    PAUSE_HANDLER, POST_CAM_CHANGE_HANDLER, SAVE_GAME_CALLBACK, USER_PAINT_HANDLER,
};
