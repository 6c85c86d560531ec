//! # Config Loader
//!
//! Loads the viewer configuration.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate field constraints and cross-field rules
//! - Produce a [`ViewerConfig`]
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("viewer.toml")).unwrap();
//! println!("namespace: {}", config.namespace);
//! ```

mod parser;
mod validator;

pub use contracts::ViewerConfig;
pub use parser::ConfigFormat;

use contracts::TimingError;
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// The format follows the extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<ViewerConfig, TimingError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load from `path` when given, otherwise validated defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<ViewerConfig, TimingError> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => {
                let config = ViewerConfig::default();
                validator::validate(&config)?;
                Ok(config)
            }
        }
    }

    /// Load configuration from string
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<ViewerConfig, TimingError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }

    /// Check an already assembled config, e.g. after command-line overrides
    pub fn validate(config: &ViewerConfig) -> Result<(), TimingError> {
        validator::validate(config)
    }

    pub fn to_toml(config: &ViewerConfig) -> Result<String, TimingError> {
        toml::to_string_pretty(config)
            .map_err(|e| TimingError::config_parse(format!("TOML serialize error: {e}")))
    }

    pub fn to_json(config: &ViewerConfig) -> Result<String, TimingError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| TimingError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    fn detect_format(path: &Path) -> Result<ConfigFormat, TimingError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            TimingError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            TimingError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    fn read_file(path: &Path) -> Result<String, TimingError> {
        Ok(std::fs::read_to_string(path)?)
    }
}
