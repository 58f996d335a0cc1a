//! Prelude module for common re-exports.
//!
//! ```rust
//! use vib_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    ConfigError, ConfigLoader, FrequencyDomain, LogLevel, SharedConfig, ThermalConfig,
    VibLimits, VibratorConfig,
};

// ─── Errors ─────────────────────────────────────────────────────────
pub use crate::error::{VibError, VibResult};

// ─── Capability Set ─────────────────────────────────────────────────
pub use crate::capability::{CalibrationArray, Capabilities, DriverFactory, VibratorOps};

// ─── Packets & events ───────────────────────────────────────────────
pub use crate::event::EventCommand;
pub use crate::packet::{PacketStore, WaveformStep};

// ─── Constants ──────────────────────────────────────────────────────
pub use crate::consts::{
    FREQ_ALERT, MAX_HAPTIC_STEP_SIZE, MAX_INTENSITY, MAX_TIMEOUT_MS, PACKET_FIELDS,
    PACKET_MAX_SIZE,
};
