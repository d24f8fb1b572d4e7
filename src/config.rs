//! Configuration file support for poreroi.
//!
//! Settings are stored as versioned JSON. Missing sections fall back to
//! their defaults so older files keep loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{sync as sync_defaults, viewport as viewport_defaults};
use crate::sync::SyncSettings;
use crate::viewport::ViewportSettings;

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Get the display name for this log level.
    pub fn name(&self) -> &'static str {
        match self {
            LogLevel::Error => "Error",
            LogLevel::Warn => "Warn",
            LogLevel::Info => "Info",
            LogLevel::Debug => "Debug",
            LogLevel::Trace => "Trace",
        }
    }

    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Version of the configuration file format
    pub version: u32,

    /// Analysis backend connection
    #[serde(default)]
    pub server: ServerConfig,

    /// Remote synchronization policy
    #[serde(default)]
    pub sync: SyncConfig,

    /// Pan and zoom behaviour
    #[serde(default)]
    pub viewport: ViewportConfig,

    /// User preferences
    #[serde(default)]
    pub preferences: UserPreferences,
}

/// Backend connection section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the analysis backend
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Synchronization section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Delay before the automatic notes-save retry
    #[serde(default = "default_note_retry_delay_ms")]
    pub note_retry_delay_ms: u64,

    /// Lifetime of informational notices
    #[serde(default = "default_info_notice_ttl_ms")]
    pub info_notice_ttl_ms: u64,

    /// Also save notes that were emptied
    #[serde(default)]
    pub save_cleared_notes: bool,
}

fn default_note_retry_delay_ms() -> u64 {
    sync_defaults::NOTE_RETRY_DELAY_MS
}

fn default_info_notice_ttl_ms() -> u64 {
    sync_defaults::INFO_NOTICE_TTL_MS
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            note_retry_delay_ms: default_note_retry_delay_ms(),
            info_notice_ttl_ms: default_info_notice_ttl_ms(),
            save_cleared_notes: false,
        }
    }
}

/// Viewport section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportConfig {
    /// Fraction of the container a fitted image fills
    #[serde(default = "default_fit_margin")]
    pub fit_margin: f64,

    /// Zoom factor per wheel step
    #[serde(default = "default_zoom_step")]
    pub zoom_step: f64,
}

fn default_fit_margin() -> f64 {
    viewport_defaults::FIT_MARGIN
}

fn default_zoom_step() -> f64 {
    viewport_defaults::ZOOM_STEP
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            fit_margin: default_fit_margin(),
            zoom_step: default_zoom_step(),
        }
    }
}

/// User preferences section of the config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,
}

impl AppConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: ServerConfig::default(),
            sync: SyncConfig::default(),
            viewport: ViewportConfig::default(),
            preferences: UserPreferences::default(),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        // Validate version compatibility
        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("server.base_url is empty".to_string()));
        }
        let margin = self.viewport.fit_margin;
        if margin.is_nan() || margin <= 0.0 || margin > 1.0 {
            return Err(ConfigError::Invalid(format!(
                "viewport.fit_margin must be in (0, 1], got {}",
                margin
            )));
        }
        let step = self.viewport.zoom_step;
        if step.is_nan() || step <= 1.0 {
            return Err(ConfigError::Invalid(format!(
                "viewport.zoom_step must be greater than 1, got {}",
                step
            )));
        }
        Ok(())
    }

    /// Typed settings for the sync layer.
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            note_retry_delay: Duration::from_millis(self.sync.note_retry_delay_ms),
            info_notice_ttl: Duration::from_millis(self.sync.info_notice_ttl_ms),
            save_cleared_notes: self.sync.save_cleared_notes,
        }
    }

    /// Typed settings for the viewport.
    pub fn viewport_settings(&self) -> ViewportSettings {
        ViewportSettings {
            fit_margin: self.viewport.fit_margin,
            zoom_step: self.viewport.zoom_step,
        }
    }

    /// Get the default config filename.
    pub fn default_filename() -> &'static str {
        "poreroi-config.json"
    }

    /// Get the default config file path.
    pub fn default_path() -> Option<PathBuf> {
        // Try to use XDG config directory, fall back to home directory
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("poreroi").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("poreroi")
                    .join(Self::default_filename())
            })
        }
    }

    /// Load configuration from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Try to load configuration from the default path.
    /// Returns None if the file doesn't exist or can't be read.
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return None;
        }

        match Self::load_from(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Failed to load config file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = self.to_json()?;
        std::fs::write(path, json)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Save configuration to the default path.
    pub fn save_to_default_path(&self) -> Result<(), ConfigError> {
        let path = Self::default_path().ok_or_else(|| {
            ConfigError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config directory",
            ))
        })?;
        self.save_to(&path)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// A value is out of its valid range
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_engine() {
        let config = AppConfig::default();
        assert_eq!(config.sync_settings(), SyncSettings::default());
        assert_eq!(config.viewport_settings(), ViewportSettings::default());
        assert_eq!(config.server.base_url, "http://localhost:8000");
        assert_eq!(config.preferences.log_level, LogLevel::Info);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut config = AppConfig::new();
        config.server.base_url = "http://analysis:9000".to_string();
        config.sync.save_cleared_notes = true;
        config.preferences.log_level = LogLevel::Debug;

        let json = config.to_json().expect("serialize");
        let parsed = AppConfig::from_json(&json).expect("parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let parsed = AppConfig::from_json(r#"{"version": 1, "sync": {"note_retry_delay_ms": 250}}"#)
            .expect("parse");
        assert_eq!(
            parsed.sync_settings().note_retry_delay,
            Duration::from_millis(250)
        );
        assert_eq!(parsed.sync.info_notice_ttl_ms, 4000);
        assert_eq!(parsed.server, ServerConfig::default());
    }

    #[test]
    fn test_version_too_new() {
        let result = AppConfig::from_json(r#"{"version": 99}"#);
        assert!(matches!(
            result,
            Err(ConfigError::VersionTooNew {
                file_version: 99,
                supported_version: CONFIG_VERSION
            })
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let json = r#"{"version": 1, "viewport": {"zoom_step": 0.5}}"#;
        assert!(matches!(
            AppConfig::from_json(json),
            Err(ConfigError::Invalid(_))
        ));

        let json = r#"{"version": 1, "server": {"base_url": " "}}"#;
        assert!(matches!(
            AppConfig::from_json(json),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_log_level_serialization() {
        let json = serde_json::to_string(&LogLevel::Warn).expect("serialize");
        assert_eq!(json, "\"warn\"");
        assert_eq!(LogLevel::Trace.to_level_filter(), log::LevelFilter::Trace);
        assert_eq!(LogLevel::Error.name(), "Error");
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(AppConfig::default_filename());

        let mut config = AppConfig::new();
        config.server.timeout_secs = 5;
        config.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");
        assert_eq!(loaded, config);
        assert_eq!(loaded.server.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loaded = AppConfig::load_from(&dir.path().join("absent.json")).expect("load");
        assert_eq!(loaded, AppConfig::default());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").expect("write");
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError(_))
        ));
    }
}
