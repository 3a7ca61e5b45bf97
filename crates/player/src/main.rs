mod demo;
mod pixels_renderer;
mod window;

use std::path::PathBuf;

use lantern_engine::services::{
    DirResourceLoader, HeadlessPlatform, HeadlessRendererFactory, NullAudioEngine,
    NullMoviePlayer,
};
use lantern_engine::{
    resolve_app_paths, AppPaths, Collaborators, ConfigError, Engine, EngineConfig, EngineError,
    FrameOutcome, FrameScheduler, ManualClock, SaveStorage, StartupError, SystemClock,
};
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use demo::DemoScript;
use pixels_renderer::PixelsRendererFactory;
use window::{WindowError, WinitPlatform};

const DEFAULT_HEADLESS_FRAMES: u64 = 120;

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RunMode {
    Window,
    Headless { frames: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Options {
    mode: RunMode,
    config_path: Option<PathBuf>,
}

fn main() {
    let options = match parse_args(std::env::args().skip(1)) {
        Ok(Some(options)) => options,
        Ok(None) => {
            println!("{}", usage_text());
            return;
        }
        Err(message) => {
            eprintln!("{message}\n\n{}", usage_text());
            std::process::exit(2);
        }
    };

    init_tracing();
    info!("=== Lantern Startup ===");

    if let Err(err) = run(options) {
        error!(error = %err, "startup_failed");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn run(options: Options) -> Result<(), AppError> {
    let app_paths = resolve_app_paths()?;
    info!(
        root = %app_paths.root.display(),
        data_dir = %app_paths.data_dir.display(),
        save_dir = %app_paths.save_dir.display(),
        "startup"
    );
    let config_path = options
        .config_path
        .clone()
        .unwrap_or_else(|| app_paths.config_path.clone());
    let config = EngineConfig::load_or_default(&config_path)?;

    match options.mode {
        RunMode::Window => run_window(&app_paths, config),
        RunMode::Headless { frames } => run_headless(&app_paths, config, frames),
    }
}

fn run_window(app_paths: &AppPaths, config: EngineConfig) -> Result<(), AppError> {
    let platform = WinitPlatform::new(config.screen_width, config.screen_height)?;
    let collaborators = Collaborators {
        renderer_factory: Box::new(PixelsRendererFactory::new(platform.window())),
        audio: Box::new(NullAudioEngine::new()),
        movie: Box::new(NullMoviePlayer::new()),
        resources: Box::new(DirResourceLoader::new(&app_paths.data_dir)),
        platform: Box::new(platform),
        clock: Box::new(SystemClock::new()),
    };
    let mut scheduler = boot(app_paths, config, collaborators)?;
    scheduler.run()?;
    Ok(())
}

fn run_headless(app_paths: &AppPaths, config: EngineConfig, frames: u64) -> Result<(), AppError> {
    let renderer_factory = HeadlessRendererFactory::new();
    let draw_log = renderer_factory.log();
    let collaborators = Collaborators {
        renderer_factory: Box::new(renderer_factory),
        audio: Box::new(NullAudioEngine::new()),
        movie: Box::new(NullMoviePlayer::new()),
        resources: Box::new(DirResourceLoader::new(&app_paths.data_dir)),
        platform: Box::new(HeadlessPlatform::new()),
        clock: Box::new(ManualClock::new(0)),
    };
    let mut scheduler = boot(app_paths, config, collaborators)?;
    let outcome = scheduler.run_frames(frames)?;
    let metrics = scheduler.engine().core().metrics().snapshot();
    info!(
        frames = scheduler.frames(),
        quit = outcome == FrameOutcome::Quit,
        fps = metrics.fps,
        frames_presented = metrics.frames_presented,
        draw_calls = draw_log.calls().len(),
        "headless_run_finished"
    );
    Ok(())
}

fn boot(
    app_paths: &AppPaths,
    config: EngineConfig,
    collaborators: Collaborators,
) -> Result<FrameScheduler, AppError> {
    let storage = SaveStorage::new(&app_paths.save_dir);
    let mut engine = Engine::new(config, storage, collaborators, Box::new(DemoScript::new()))?;
    engine.boot()?;
    Ok(FrameScheduler::new(engine))
}

/// `Ok(None)` means help was requested.
fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Option<Options>, String> {
    let mut options = Options {
        mode: RunMode::Window,
        config_path: None,
    };
    let mut args = args.into_iter().peekable();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "--headless" => {
                let frames = match args.peek() {
                    Some(next) if !next.starts_with("--") => {
                        let raw = args.next().unwrap_or_default();
                        raw.parse::<u64>()
                            .map_err(|_| format!("invalid frame count '{raw}'"))?
                    }
                    _ => DEFAULT_HEADLESS_FRAMES,
                };
                options.mode = RunMode::Headless { frames };
            }
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| "--config requires a path".to_string())?;
                options.config_path = Some(PathBuf::from(path));
            }
            other => return Err(format!("unknown argument '{other}'")),
        }
    }
    Ok(Some(options))
}

fn usage_text() -> String {
    [
        "lantern_player - run the built-in demo",
        "",
        "Usage:",
        "  lantern_player [--config <path>]",
        "  lantern_player --headless [frames] [--config <path>]",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Option<Options>, String> {
        parse_args(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn no_arguments_opens_window() {
        let options = parse(&[]).expect("parse").expect("options");
        assert_eq!(options.mode, RunMode::Window);
        assert_eq!(options.config_path, None);
    }

    #[test]
    fn headless_frame_count_is_optional() {
        let options = parse(&["--headless"]).expect("parse").expect("options");
        assert_eq!(
            options.mode,
            RunMode::Headless {
                frames: DEFAULT_HEADLESS_FRAMES
            }
        );

        let options = parse(&["--headless", "30", "--config", "alt.json"])
            .expect("parse")
            .expect("options");
        assert_eq!(options.mode, RunMode::Headless { frames: 30 });
        assert_eq!(options.config_path, Some(PathBuf::from("alt.json")));
    }

    #[test]
    fn bad_arguments_are_rejected() {
        assert!(parse(&["--headless", "many"]).is_err());
        assert!(parse(&["--config"]).is_err());
        assert!(parse(&["--fast"]).is_err());
        assert_eq!(parse(&["--help"]), Ok(None));
    }
}
