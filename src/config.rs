//! Configuration file support for the viewer.
//!
//! Settings are stored as versioned JSON: viewer preferences, the list of
//! segmentation models, the label color map and the preview color.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::color::{ColorTable, Rgba};
use crate::constants::{
    DEFAULT_MASK_ALPHA, DEFAULT_MODEL_VARIANT, MAX_ZOOM, MIN_ZOOM, ZOOM_PRECISION, ZOOM_STEP,
};
use crate::view::{Smoothing, ZoomLimits};

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

/// Install the global logger and set the level.
///
/// The logger is installed once; every call sets the level, so it can be
/// raised or lowered later. On native targets `RUST_LOG`, when set, still
/// filters on top of it.
pub fn init_logging(level: LogLevel) {
    #[cfg(not(target_arch = "wasm32"))]
    {
        let mut builder = env_logger::Builder::from_default_env();
        if std::env::var_os("RUST_LOG").is_none() {
            // The installed filter passes everything; the max level gates output
            builder.filter_level(log::LevelFilter::Trace);
        }
        if builder.try_init().is_err() {
            log::debug!("Logger already installed, changing level to {:?}", level);
        }
        log::set_max_level(level.to_level_filter());
    }

    #[cfg(target_arch = "wasm32")]
    {
        if console_log::init_with_level(log::Level::Trace).is_err() {
            log::debug!("Logger already installed, changing level to {:?}", level);
        }
        log::set_max_level(level.to_level_filter());
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// One selectable segmentation model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Worker script running the mask decoder
    pub worker: String,
    /// Encoder variant requested from the embedding service
    pub variant: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            worker: "worker_pred.js".to_string(),
            variant: DEFAULT_MODEL_VARIANT.to_string(),
        }
    }
}

/// Viewer preferences section of the config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerPreferences {
    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,

    #[serde(default = "default_zoom_step")]
    pub zoom_step: f64,

    #[serde(default = "default_min_zoom")]
    pub min_zoom: f64,

    #[serde(default = "default_max_zoom")]
    pub max_zoom: f64,

    /// Decimal places kept after each zoom step
    #[serde(default = "default_zoom_precision")]
    pub zoom_precision: u32,

    /// Mask alpha applied to non-zero labels
    #[serde(default = "default_alpha")]
    pub default_alpha: u8,

    #[serde(default)]
    pub image_smoothing: bool,

    #[serde(default)]
    pub mask_smoothing: bool,
}

fn default_zoom_step() -> f64 {
    ZOOM_STEP
}

fn default_min_zoom() -> f64 {
    MIN_ZOOM
}

fn default_max_zoom() -> f64 {
    MAX_ZOOM
}

fn default_zoom_precision() -> u32 {
    ZOOM_PRECISION
}

fn default_alpha() -> u8 {
    DEFAULT_MASK_ALPHA
}

impl Default for ViewerPreferences {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            zoom_step: default_zoom_step(),
            min_zoom: default_min_zoom(),
            max_zoom: default_max_zoom(),
            zoom_precision: default_zoom_precision(),
            default_alpha: default_alpha(),
            image_smoothing: false,
            mask_smoothing: false,
        }
    }
}

fn default_models() -> Vec<ModelConfig> {
    vec![ModelConfig::default()]
}

fn default_color_map() -> BTreeMap<String, String> {
    [
        ("1", "#FF0000"),
        ("2", "#0000FF"),
        ("3", "#00FF00"),
        ("4", "#00F00F"),
        ("5", "#00F0F0"),
        ("6", "#FFFF00"),
    ]
    .into_iter()
    .map(|(label, hex)| (label.to_string(), hex.to_string()))
    .collect()
}

fn default_preview_color() -> Rgba {
    Rgba::new(0, 255, 0, 128)
}

/// Viewer configuration that can be exported and imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Version of the configuration file format
    pub version: u32,

    #[serde(default)]
    pub preferences: ViewerPreferences,

    /// Selectable segmentation models, in menu order
    #[serde(default = "default_models")]
    pub models: Vec<ModelConfig>,

    /// Label value to `#RRGGBB` color
    #[serde(default = "default_color_map")]
    pub color_map: BTreeMap<String, String>,

    /// Color of the live segmentation preview
    #[serde(default = "default_preview_color")]
    pub preview_color: Rgba,
}

impl ViewerConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            preferences: ViewerPreferences::default(),
            models: default_models(),
            color_map: default_color_map(),
            preview_color: default_preview_color(),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        Ok(config)
    }

    pub fn zoom_limits(&self) -> ZoomLimits {
        let p = &self.preferences;
        ZoomLimits {
            step: p.zoom_step,
            min: p.min_zoom.min(p.max_zoom),
            max: p.max_zoom.max(p.min_zoom),
            precision: p.zoom_precision,
        }
    }

    pub fn smoothing(&self) -> Smoothing {
        Smoothing {
            image: self.preferences.image_smoothing,
            mask: self.preferences.mask_smoothing,
        }
    }

    /// Build the label lookup table from the color map.
    pub fn color_table(&self) -> crate::error::Result<ColorTable> {
        ColorTable::from_hex_map(&self.color_map)
    }

    /// Get the default filename for config export.
    pub fn default_filename() -> &'static str {
        "aramis-config.json"
    }

    /// Get the default config file path for auto-load/save.
    /// Returns None on WASM (no filesystem access).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn default_path() -> Option<std::path::PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("aramis").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home| {
                home.join(".config")
                    .join("aramis")
                    .join(Self::default_filename())
            })
        }
    }

    /// Load configuration from `path`.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_path(path: &std::path::Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Write configuration to `path`, creating parent directories.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to_path(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Try to load configuration from the default path.
    /// Returns None if the file doesn't exist or can't be read.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return None;
        }

        match Self::load_from_path(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Failed to load config file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Save configuration to the default path.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to_default_path(&self) -> Result<(), ConfigError> {
        let path = Self::default_path().ok_or_else(|| {
            ConfigError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config directory",
            ))
        })?;
        self.save_to_path(&path)
    }
}

impl Default for ViewerConfig {
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

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ViewerConfig::new();
        assert_eq!(config.models, vec![ModelConfig::default()]);
        assert_eq!(config.models[0].variant, "vit_h");
        assert_eq!(config.preview_color, Rgba::new(0, 255, 0, 128));
        assert_eq!(config.zoom_limits(), ZoomLimits::default());

        let table = config.color_table().unwrap();
        assert_eq!(table.len(), 6);
        assert_eq!(table.color(4), Rgba::new(0, 240, 15, 255));
    }

    #[test]
    fn test_json_roundtrip() {
        let mut config = ViewerConfig::new();
        config.preferences.default_alpha = 128;
        config.preferences.log_level = LogLevel::Debug;

        let parsed = ViewerConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = ViewerConfig::from_json(r#"{ "version": 1 }"#).unwrap();
        assert_eq!(config, ViewerConfig::new());
    }

    #[test]
    fn test_version_too_new() {
        let json = format!(r#"{{ "version": {} }}"#, CONFIG_VERSION + 1);
        assert!(matches!(
            ViewerConfig::from_json(&json),
            Err(ConfigError::VersionTooNew { .. })
        ));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            ViewerConfig::from_json("not json"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_inverted_zoom_bounds_are_ordered() {
        let mut config = ViewerConfig::new();
        config.preferences.min_zoom = 4.0;
        config.preferences.max_zoom = 0.5;
        let limits = config.zoom_limits();
        assert_eq!((limits.min, limits.max), (0.5, 4.0));
    }

    #[test]
    fn test_save_and_load_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(ViewerConfig::default_filename());

        let mut config = ViewerConfig::new();
        config.color_map.insert("7".to_string(), "#123456".to_string());
        config.save_to_path(&path).unwrap();

        let loaded = ViewerConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.color_map.get("7").map(String::as_str), Some("#123456"));
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging(LogLevel::Warn);
        assert!(!log::log_enabled!(log::Level::Info));
        init_logging(LogLevel::Debug);
        assert_eq!(log::max_level(), log::LevelFilter::Debug);
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(log::log_enabled!(log::Level::Debug));
        }
    }
}
