use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::services::RendererConfig;

pub const DEFAULT_ENGINE_SPEED: u32 = 60;
const MAX_ENGINE_SPEED: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameVariant {
    #[default]
    Grim,
    Monkey4,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPlatform {
    #[default]
    Pc,
    Ps2,
}

/// How long one loop iteration may take before the scheduler stops sleeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameBudget {
    Limited(Duration),
    Unbounded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub game: GameVariant,
    pub platform: TargetPlatform,
    pub demo: bool,
    /// Target frames per second; 0 or anything above 100 means the default 60.
    pub engine_speed: u32,
    pub unbounded_speed: bool,
    pub fullscreen: bool,
    pub soft_renderer: bool,
    pub show_fps: bool,
    pub screen_width: u32,
    pub screen_height: u32,
    pub save_slot: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            game: GameVariant::Grim,
            platform: TargetPlatform::Pc,
            demo: false,
            engine_speed: DEFAULT_ENGINE_SPEED,
            unbounded_speed: false,
            fullscreen: false,
            soft_renderer: true,
            show_fps: false,
            screen_width: 640,
            screen_height: 480,
            save_slot: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file {path} at {field}: {source}")]
    Parse {
        path: PathBuf,
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&raw, path)?;
        config.validate()?;
        Ok(config)
    }

    /// Missing file means defaults; a present but broken file is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(path = %path.display(), "config_missing_using_defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    fn parse(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize::<_, Self>(&mut deserializer).map_err(|error| {
            let field = error.path().to_string();
            ConfigError::Parse {
                path: path.to_path_buf(),
                field: if field.is_empty() { ".".to_string() } else { field },
                source: error.into_inner(),
            }
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.screen_width == 0 {
            return Err(ConfigError::Invalid {
                field: "screen_width",
                message: "must be non-zero".to_string(),
            });
        }
        if self.screen_height == 0 {
            return Err(ConfigError::Invalid {
                field: "screen_height",
                message: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn effective_engine_speed(&self) -> u32 {
        if self.engine_speed == 0 || self.engine_speed > MAX_ENGINE_SPEED {
            DEFAULT_ENGINE_SPEED
        } else {
            self.engine_speed
        }
    }

    pub fn frame_budget(&self) -> FrameBudget {
        if self.unbounded_speed {
            return FrameBudget::Unbounded;
        }
        let millis = 1000 / u64::from(self.effective_engine_speed());
        FrameBudget::Limited(Duration::from_millis(millis))
    }

    pub fn renderer_config(&self) -> RendererConfig {
        RendererConfig {
            width: self.screen_width,
            height: self.screen_height,
            fullscreen: self.fullscreen,
            software: self.soft_renderer,
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn out_of_range_speed_falls_back_to_sixty() {
        for speed in [0, 101, 500] {
            let config = EngineConfig {
                engine_speed: speed,
                ..EngineConfig::default()
            };
            assert_eq!(config.effective_engine_speed(), 60);
        }
        let config = EngineConfig {
            engine_speed: 30,
            ..EngineConfig::default()
        };
        assert_eq!(
            config.frame_budget(),
            FrameBudget::Limited(Duration::from_millis(33))
        );
    }

    #[test]
    fn unbounded_speed_disables_budget() {
        let config = EngineConfig {
            unbounded_speed: true,
            ..EngineConfig::default()
        };
        assert_eq!(config.frame_budget(), FrameBudget::Unbounded);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{ "game": "monkey4", "platform": "ps2", "save_slot": 4 }"#)
            .expect("write");

        let config = EngineConfig::load(&path).expect("load");
        assert_eq!(config.game, GameVariant::Monkey4);
        assert_eq!(config.platform, TargetPlatform::Ps2);
        assert_eq!(config.save_slot, Some(4));
        assert_eq!(config.screen_width, 640);
    }

    #[test]
    fn parse_error_names_offending_field() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{ "screen_width": "wide" }"#).expect("write");

        let error = EngineConfig::load(&path).expect_err("bad type");
        match error {
            ConfigError::Parse { field, .. } => assert_eq!(field, "screen_width"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_screen_size_is_rejected() {
        let config = EngineConfig {
            screen_height: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "screen_height",
                ..
            })
        ));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let temp = TempDir::new().expect("temp");
        let config =
            EngineConfig::load_or_default(&temp.path().join("absent.json")).expect("defaults");
        assert_eq!(config, EngineConfig::default());
    }
}
