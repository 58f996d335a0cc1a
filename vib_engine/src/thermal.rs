//! Temperature source and the tuning pass-through run before each enable.

use tracing::{debug, error, warn};
use vib_common::capability::{Capabilities, VibratorOps};
use vib_common::config::ThermalConfig;
use vib_common::error::{VibError, VibResult};

/// Supplier of the temperature used for actuator tuning.
pub trait ThermalSource: Send + Sync {
    /// Current temperature in degrees Celsius.
    fn read_celsius(&self) -> VibResult<i32>;
}

/// Source that always reports the same temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedThermal {
    celsius: i32,
}

impl FixedThermal {
    /// Report `celsius` on every read.
    pub const fn new(celsius: i32) -> Self {
        Self { celsius }
    }
}

impl From<ThermalConfig> for FixedThermal {
    fn from(config: ThermalConfig) -> Self {
        Self::new(config.fixed_celsius)
    }
}

impl ThermalSource for FixedThermal {
    fn read_celsius(&self) -> VibResult<i32> {
        Ok(self.celsius)
    }
}

/// Forward the current temperature to the backend's tuning hook.
///
/// Returns `Unsupported` without reading anything when the hook is absent.
/// A failed read is logged and skips tuning; it never blocks playback.
pub(crate) fn tune_for_temperature(
    ops: &dyn VibratorOps,
    source: Option<&dyn ThermalSource>,
) -> VibResult<()> {
    if !ops.capabilities().has(Capabilities::TUNING_WITH_TEMP) {
        return Err(VibError::Unsupported);
    }
    let Some(source) = source else {
        debug!("no thermal source, skipping tuning");
        return Ok(());
    };

    let celsius = source.read_celsius().map_err(|e| {
        warn!("temperature read failed: {}", e);
        e
    })?;

    ops.set_tuning_with_temp(celsius).map_err(|e| {
        error!("set_tuning_with_temp({}) error: {}", celsius, e);
        e
    })
}
