use crate::{validate_enum, validate_range};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralSettings,

    #[serde(default)]
    pub playback: PlaybackSettings,

    #[serde(default)]
    pub streams: StreamSettings,
}

/// General daemon settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Playback engine settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaybackSettings {
    /// Position sampling period for both backends
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Volume the daemon starts with (0.0-1.0)
    #[serde(default = "default_initial_volume")]
    pub initial_volume: f32,

    /// Fail a load that is not ready after this many seconds (0 = never)
    #[serde(default = "default_load_timeout")]
    pub load_timeout_secs: u64,

    /// Step for skip commands that do not name one
    #[serde(default = "default_skip_secs")]
    pub skip_secs: f64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            initial_volume: default_initial_volume(),
            load_timeout_secs: default_load_timeout(),
            skip_secs: default_skip_secs(),
        }
    }
}

fn default_tick_interval() -> u64 {
    500
}
fn default_initial_volume() -> f32 {
    1.0
}
fn default_load_timeout() -> u64 {
    20
}
fn default_skip_secs() -> f64 {
    10.0
}

/// Network stream history
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamSettings {
    #[serde(default = "default_max_recent")]
    pub max_recent: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            max_recent: default_max_recent(),
        }
    }
}

fn default_max_recent() -> usize {
    20
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!(
                "Config file not found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded configuration from {}", path.display());
        config.validate()?;

        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("wave");

        Ok(config_dir.join("config.toml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        self.validate_log_level(&self.general.log_level)?;

        let playback = &self.playback;
        validate_range!(
            "playback.tick_interval_ms",
            playback.tick_interval_ms,
            50..=5000
        );
        validate_range!(
            "playback.initial_volume",
            playback.initial_volume,
            0.0..=1.0
        );
        validate_range!(
            "playback.load_timeout_secs",
            playback.load_timeout_secs,
            0..=600
        );
        validate_range!("playback.skip_secs", playback.skip_secs, 1.0..=600.0);
        validate_range!("streams.max_recent", self.streams.max_recent, 0..=500);

        Ok(())
    }

    fn validate_log_level(&self, level: &str) -> Result<()> {
        validate_enum!(level, "trace", "debug", "info", "warn", "error")
    }

    /// The configured log level as a filter for `log::set_max_level`
    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.general
            .log_level
            .parse()
            .unwrap_or(log::LevelFilter::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.playback.tick_interval_ms, 500);
        assert_eq!(config.playback.initial_volume, 1.0);
        assert_eq!(config.playback.load_timeout_secs, 20);
        assert_eq!(config.playback.skip_secs, 10.0);
        assert_eq!(config.streams.max_recent, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let toml = r#"
[playback]
initial_volume = 0.5
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.playback.initial_volume, 0.5);
        assert_eq!(config.playback.tick_interval_ms, 500);
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.streams.max_recent, 20);
    }

    #[test]
    fn test_validate_log_level() {
        let config = Config::default();
        assert!(config.validate_log_level("debug").is_ok());
        assert!(config.validate_log_level("error").is_ok());
        assert!(config.validate_log_level("loud").is_err());
    }

    #[test]
    fn test_validate_ranges() {
        let mut config = Config::default();
        config.playback.tick_interval_ms = 10;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.playback.initial_volume = 1.5;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("playback.initial_volume"), "{}", err);

        let mut config = Config::default();
        config.playback.skip_secs = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.playback.load_timeout_secs = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_level_filter() {
        let mut config = Config::default();
        assert_eq!(config.log_level_filter(), log::LevelFilter::Info);

        config.general.log_level = "trace".to_string();
        assert_eq!(config.log_level_filter(), log::LevelFilter::Trace);
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[general]
log_level = "debug"

[playback]
tick_interval_ms = 250
load_timeout_secs = 0

[streams]
max_recent = 5
"#
        )
        .unwrap();

        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.playback.tick_interval_ms, 250);
        assert_eq!(config.playback.load_timeout_secs, 0);
        assert_eq!(config.streams.max_recent, 5);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_path(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.playback.tick_interval_ms, 500);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[general]\nlog_level = \"verbose\"").unwrap();
        assert!(Config::load_from_path(file.path()).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[playback]\ntick_interval_ms = \"fast\"").unwrap();
        assert!(Config::load_from_path(file.path()).is_err());
    }
}
