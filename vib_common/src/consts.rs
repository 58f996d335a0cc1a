//! System-wide constants for the vibrator sequencing engine.
//!
//! Capacities size fixed-capacity storage and are therefore compile-time
//! only. Numeric limits have configurable counterparts in
//! [`crate::config::VibLimits`]; the values here are their defaults.

use static_assertions::const_assert;

/// Canonical service name (used for logging and thread names).
pub const VIB_SERVICE_NAME: &str = "vibrator";

/// Largest accepted intensity magnitude. Valid range is `[-MAX_INTENSITY, MAX_INTENSITY]`.
pub const MAX_INTENSITY: i32 = 10_000;

/// Upper clamp for a single-shot request, in milliseconds.
pub const MAX_TIMEOUT_MS: u32 = 10_000;

/// Maximum number of steps held by the packet store.
pub const PACKET_MAX_SIZE: usize = 1000;

/// Integers per step in the bulk packet format: time, intensity, frequency, overdrive.
pub const PACKET_FIELDS: usize = 4;

/// Capacity of the calibration arrays (intensities / durations).
pub const MAX_HAPTIC_STEP_SIZE: usize = 7;

/// Reserved "alert" frequency. Used as the reset value on disable.
pub const FREQ_ALERT: i32 = 0;

/// End (exclusive) of the preset-frequency band that starts at [`FREQ_ALERT`].
pub const FREQ_MAX: i32 = 6;

/// Lowest frequency of the haptic-engine band.
pub const HAPTIC_ENGINE_FREQ_MIN: i32 = 1200;

/// Highest frequency of the haptic-engine band (inclusive).
pub const HAPTIC_ENGINE_FREQ_MAX: i32 = 3500;

/// Longest accepted event-command input, in bytes.
pub const MAX_STR_LEN_EVENT_CMD: usize = 32;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "/etc/vib/vibrator.toml";

/// Default backend name
pub const DEFAULT_DRIVER: &str = "simulation";

const_assert!(FREQ_ALERT < FREQ_MAX);
const_assert!(FREQ_MAX <= HAPTIC_ENGINE_FREQ_MIN);
const_assert!(HAPTIC_ENGINE_FREQ_MIN <= HAPTIC_ENGINE_FREQ_MAX);
const_assert!(PACKET_MAX_SIZE * PACKET_FIELDS <= i32::MAX as usize);
