//! Configuration loading traits and types.
//!
//! Every vibrator service loads one TOML file through [`ConfigLoader`] and
//! validates it before registering a controller.
//!
//! # Usage
//!
//! ```rust,no_run
//! use vib_common::config::{ConfigLoader, ConfigError, VibratorConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = VibratorConfig::load(Path::new("vibrator.toml"))?;
//!     config.validate()?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use crate::consts::{
    DEFAULT_DRIVER, FREQ_ALERT, FREQ_MAX, HAPTIC_ENGINE_FREQ_MAX, HAPTIC_ENGINE_FREQ_MIN,
    MAX_INTENSITY, MAX_TIMEOUT_MS, VIB_SERVICE_NAME,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common configuration fields shared across vibrator services.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "vibrator-main"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: VIB_SERVICE_NAME.to_string(),
        }
    }
}

/// Allowed frequency domain.
///
/// Two bands are accepted: the preset band `[alert, preset_end)` and the
/// haptic-engine band `[engine_min, engine_max]`. Everything below `alert`,
/// in the gap between the bands, or above `engine_max` is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrequencyDomain {
    /// Reserved alert frequency; also the reset value on disable.
    #[serde(default = "default_freq_alert")]
    pub alert: i32,
    /// End (exclusive) of the preset band.
    #[serde(default = "default_freq_preset_end")]
    pub preset_end: i32,
    /// Start of the haptic-engine band.
    #[serde(default = "default_freq_engine_min")]
    pub engine_min: i32,
    /// End (inclusive) of the haptic-engine band.
    #[serde(default = "default_freq_engine_max")]
    pub engine_max: i32,
}

fn default_freq_alert() -> i32 {
    FREQ_ALERT
}

fn default_freq_preset_end() -> i32 {
    FREQ_MAX
}

fn default_freq_engine_min() -> i32 {
    HAPTIC_ENGINE_FREQ_MIN
}

fn default_freq_engine_max() -> i32 {
    HAPTIC_ENGINE_FREQ_MAX
}

impl FrequencyDomain {
    /// Returns true if `frequency` lies in one of the two accepted bands.
    #[inline]
    pub const fn contains(&self, frequency: i32) -> bool {
        if frequency < self.alert {
            return false;
        }
        if frequency >= self.preset_end && frequency < self.engine_min {
            return false;
        }
        frequency <= self.engine_max
    }
}

impl Default for FrequencyDomain {
    fn default() -> Self {
        Self {
            alert: FREQ_ALERT,
            preset_end: FREQ_MAX,
            engine_min: HAPTIC_ENGINE_FREQ_MIN,
            engine_max: HAPTIC_ENGINE_FREQ_MAX,
        }
    }
}

/// Numeric limits enforced by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VibLimits {
    /// Intensity magnitude bound.
    #[serde(default = "default_max_intensity")]
    pub max_intensity: i32,
    /// Clamp for single-shot requests, in milliseconds.
    #[serde(default = "default_max_timeout_ms")]
    pub max_timeout_ms: u32,
    /// Accepted frequency bands.
    #[serde(default)]
    pub frequency: FrequencyDomain,
}

fn default_max_intensity() -> i32 {
    MAX_INTENSITY
}

fn default_max_timeout_ms() -> u32 {
    MAX_TIMEOUT_MS
}

impl VibLimits {
    /// Returns true if `intensity` lies in `[-max_intensity, max_intensity]`.
    #[inline]
    pub const fn intensity_in_range(&self, intensity: i32) -> bool {
        intensity >= -self.max_intensity && intensity <= self.max_intensity
    }

    /// Clamp a raw request to `[0, max_timeout_ms]`.
    #[inline]
    pub fn clamp_timeout(&self, value_ms: i64) -> u32 {
        value_ms.clamp(0, i64::from(self.max_timeout_ms)) as u32
    }

    /// Validate the limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_intensity <= 0 {
            return Err(ConfigError::ValidationError(format!(
                "max_intensity must be greater than 0 (got {})",
                self.max_intensity
            )));
        }
        if self.max_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "max_timeout_ms must be greater than 0".to_string(),
            ));
        }
        let f = &self.frequency;
        if !(f.alert < f.preset_end && f.preset_end <= f.engine_min && f.engine_min <= f.engine_max)
        {
            return Err(ConfigError::ValidationError(format!(
                "frequency bands must satisfy alert < preset_end <= engine_min <= engine_max \
                 (got {} / {} / {} / {})",
                f.alert, f.preset_end, f.engine_min, f.engine_max
            )));
        }
        Ok(())
    }
}

impl Default for VibLimits {
    fn default() -> Self {
        Self {
            max_intensity: MAX_INTENSITY,
            max_timeout_ms: MAX_TIMEOUT_MS,
            frequency: FrequencyDomain::default(),
        }
    }
}

/// Optional thermal source settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThermalConfig {
    /// Fixed temperature reported to the tuning hook, in degrees Celsius.
    pub fixed_celsius: i32,
}

/// Main configuration loaded from `vibrator.toml`.
///
/// # TOML Example
///
/// ```toml
/// driver = "simulation"
/// event_cmd = "FOLDER_OPEN"
///
/// [shared]
/// service_name = "vibrator"
///
/// [limits]
/// max_intensity = 10000
/// max_timeout_ms = 10000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VibratorConfig {
    /// Common service settings.
    #[serde(default)]
    pub shared: SharedConfig,

    /// Backend name resolved through the driver registry.
    #[serde(default = "default_driver")]
    pub driver: String,

    /// Initial event command (wire name). Unknown names map to `NONE`.
    #[serde(default)]
    pub event_cmd: Option<String>,

    /// Controller limits.
    #[serde(default)]
    pub limits: VibLimits,

    /// Thermal source. Absent means no temperature tuning.
    #[serde(default)]
    pub thermal: Option<ThermalConfig>,
}

fn default_driver() -> String {
    DEFAULT_DRIVER.to_string()
}

impl VibratorConfig {
    /// Validate the full configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        if self.driver.is_empty() {
            return Err(ConfigError::ValidationError(
                "driver cannot be empty".to_string(),
            ));
        }
        self.limits.validate()
    }
}

impl Default for VibratorConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig::default(),
            driver: default_driver(),
            event_cmd: None,
            limits: VibLimits::default(),
            thermal: None,
        }
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn test_log_level_deserialization() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct TestWrapper {
            level: LogLevel,
        }

        assert_eq!(
            toml::from_str::<TestWrapper>("level = \"trace\"")
                .unwrap()
                .level,
            LogLevel::Trace
        );
        assert_eq!(
            toml::from_str::<TestWrapper>("level = \"warn\"")
                .unwrap()
                .level,
            LogLevel::Warn
        );
    }

    #[test]
    fn test_shared_config_validation_empty_service_name() {
        let config = SharedConfig {
            log_level: LogLevel::Info,
            service_name: "".to_string(),
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_frequency_domain_bands() {
        let f = FrequencyDomain::default();
        assert!(!f.contains(-1));
        assert!(f.contains(FREQ_ALERT));
        assert!(f.contains(FREQ_MAX - 1));
        assert!(!f.contains(FREQ_MAX));
        assert!(!f.contains(HAPTIC_ENGINE_FREQ_MIN - 1));
        assert!(f.contains(HAPTIC_ENGINE_FREQ_MIN));
        assert!(f.contains(HAPTIC_ENGINE_FREQ_MAX));
        assert!(!f.contains(HAPTIC_ENGINE_FREQ_MAX + 1));
    }

    #[test]
    fn test_limits_clamp_timeout() {
        let limits = VibLimits::default();
        assert_eq!(limits.clamp_timeout(-5), 0);
        assert_eq!(limits.clamp_timeout(500), 500);
        assert_eq!(limits.clamp_timeout(1_000_000), MAX_TIMEOUT_MS);
    }

    #[test]
    fn test_limits_reject_overlapping_bands() {
        let mut limits = VibLimits::default();
        limits.frequency.engine_min = 3;
        assert!(matches!(
            limits.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_config_loader_file_not_found() {
        let result = VibratorConfig::load(Path::new("/nonexistent/path/vibrator.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn test_config_loader_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid toml {{{{").unwrap();

        let result = VibratorConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_vibrator_config_defaults_fill_missing_tables() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"driver = "simulation"

[shared]
service_name = "vib-test"
log_level = "debug"

[limits]
max_intensity = 5000
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = VibratorConfig::load(file.path()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.shared.log_level, LogLevel::Debug);
        assert_eq!(config.limits.max_intensity, 5000);
        assert_eq!(config.limits.max_timeout_ms, MAX_TIMEOUT_MS);
        assert_eq!(config.limits.frequency, FrequencyDomain::default());
        assert!(config.thermal.is_none());
    }
}
