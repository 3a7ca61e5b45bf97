use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod config;
pub mod savegame;
pub mod services;
pub mod world;

pub use app::{
    ActiveActorCache, Clock, Collaborators, ControlTable, DeviceReset, DrawPath, Engine,
    EngineCore, EngineError, EngineMode, FrameOutcome, FramePolicy, FrameScheduler, InputEvent,
    Iris, IrisDirection, KeyCode, LoopMetricsSnapshot, ManualClock, MetricsHandle,
    ModeController, RestoreOutcome, SetManager, SetupChange, SystemClock, DEFAULT_TEXT_SPEED,
};
pub use config::{ConfigError, EngineConfig, FrameBudget, GameVariant, TargetPlatform};
pub use savegame::{SaveError, SaveStorage, SaveTarget};

pub const ROOT_ENV_VAR: &str = "LANTERN_ROOT";
pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub data_dir: PathBuf,
    pub save_dir: PathBuf,
    pub config_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create save directory at {path}: {source}")]
    CreateSaveDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "LANTERN_ROOT is set but does not point to a valid game root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or data/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect game root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or data/.\n\
Set {env_var} explicitly, for example:\n\
PowerShell: $env:{env_var}=\"C:\\path\\to\\lantern\"\n\
Bash/zsh: export {env_var}=\"/path/to/lantern\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    app_paths_for_root(root)
}

/// Derives the game directories under `root`, creating the save directory.
pub fn app_paths_for_root(root: PathBuf) -> Result<AppPaths, StartupError> {
    let data_dir = root.join("data");
    let save_dir = root.join("saves");
    let config_path = root.join(CONFIG_FILE_NAME);

    fs::create_dir_all(&save_dir).map_err(|source| StartupError::CreateSaveDir {
        path: save_dir.clone(),
        source,
    })?;

    Ok(AppPaths {
        root,
        data_dir,
        save_dir,
        config_path,
    })
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let raw = PathBuf::from(value);
            let normalized = normalize_path(&raw);
            if is_root_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            for candidate in exe_dir.ancestors() {
                if is_root_marker(candidate) {
                    return Ok(normalize_path(candidate));
                }
            }

            Err(StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_root_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_data = path.join("data").is_dir();

    cargo_toml && (has_crates || has_data)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
