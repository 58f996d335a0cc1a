//! Capability Set: the backend interface the controller drives.
//!
//! A backend declares what it can do through [`VibratorOps::capabilities`]
//! and overrides the matching typed methods. Every method defaults to
//! [`VibError::Unsupported`], so a backend only writes the operations it
//! actually has. The controller checks [`Capabilities`] before calling, so
//! absent operations are never invoked.
//!
//! # Concurrency
//!
//! Every call the controller makes happens while it holds its state lock.
//! Implementations therefore never see two concurrent calls from the same
//! controller and need no reentrancy guard against it.

use crate::consts::MAX_HAPTIC_STEP_SIZE;
use crate::error::{VibError, VibResult};
use crate::event::EventCommand;
use bitflags::bitflags;
use std::sync::Arc;

/// Per-step calibration values reported by a backend.
pub type CalibrationArray = heapless::Vec<i32, MAX_HAPTIC_STEP_SIZE>;

bitflags! {
    /// Operations a backend provides.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// `enable`
        const ENABLE                    = 1 << 0;
        /// `set_intensity`
        const INTENSITY                 = 1 << 1;
        /// `set_frequency`
        const FREQUENCY                 = 1 << 2;
        /// `set_overdrive`
        const OVERDRIVE                 = 1 << 3;
        /// `set_tuning_with_temp`
        const TUNING_WITH_TEMP          = 1 << 4;
        /// `get_calibration`
        const CALIBRATION               = 1 << 5;
        /// `get_step_size`
        const STEP_SIZE                 = 1 << 6;
        /// `get_intensities`
        const INTENSITIES               = 1 << 7;
        /// `get_haptic_intensities`
        const HAPTIC_INTENSITIES        = 1 << 8;
        /// `get_haptic_durations`
        const HAPTIC_DURATIONS          = 1 << 9;
        /// `get_cp_trigger_index` / `set_cp_trigger_index`
        const CP_TRIGGER_INDEX          = 1 << 10;
        /// `get_cp_trigger_queue` / `set_cp_trigger_queue`
        const CP_TRIGGER_QUEUE          = 1 << 11;
        /// `get_pwle` / `set_pwle`
        const PWLE                      = 1 << 12;
        /// `get_virtual_composite_indexes`
        const VIRTUAL_COMPOSITE_INDEXES = 1 << 13;
        /// `get_virtual_pwle_indexes`
        const VIRTUAL_PWLE_INDEXES      = 1 << 14;
        /// `get_motor_type`
        const MOTOR_TYPE                = 1 << 15;
        /// `set_use_sep_index`
        const USE_SEP_INDEX             = 1 << 16;
        /// `get_num_waves`
        const NUM_WAVES                 = 1 << 17;
        /// `set_event_cmd`
        const EVENT_CMD                 = 1 << 18;
    }
}

impl Capabilities {
    /// Minimal set for amplitude-controlled playback.
    pub const BASIC: Self = Self::from_bits_truncate(
        Self::ENABLE.bits() | Self::INTENSITY.bits(),
    );

    /// Everything a multi-frequency haptic-engine backend typically offers.
    pub const HAPTIC_ENGINE: Self = Self::from_bits_truncate(
        Self::ENABLE.bits()
            | Self::INTENSITY.bits()
            | Self::FREQUENCY.bits()
            | Self::OVERDRIVE.bits(),
    );

    /// Returns true if `cap` is fully present.
    #[inline]
    pub const fn has(&self, cap: Capabilities) -> bool {
        self.contains(cap)
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::empty()
    }
}

/// Hardware backend driven by the controller.
///
/// Any method may be left at its default, which reports
/// [`VibError::Unsupported`]. Returning any other error means the backend
/// tried and failed.
pub trait VibratorOps: Send + Sync {
    /// Backend identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Operations this backend provides.
    fn capabilities(&self) -> Capabilities;

    /// Energize or release the actuator.
    fn enable(&self, _on: bool) -> VibResult<()> {
        Err(VibError::Unsupported)
    }

    /// Apply an intensity, already validated against the limits.
    fn set_intensity(&self, _intensity: i32) -> VibResult<()> {
        Err(VibError::Unsupported)
    }

    /// Apply a frequency, already validated against the frequency domain.
    fn set_frequency(&self, _frequency: i32) -> VibResult<()> {
        Err(VibError::Unsupported)
    }

    /// Switch overdrive on or off.
    fn set_overdrive(&self, _on: bool) -> VibResult<()> {
        Err(VibError::Unsupported)
    }

    /// Retune for the given temperature (degrees Celsius).
    fn set_tuning_with_temp(&self, _celsius: i32) -> VibResult<()> {
        Err(VibError::Unsupported)
    }

    /// Whether calibration data is available.
    fn get_calibration(&self) -> VibResult<bool> {
        Err(VibError::Unsupported)
    }

    /// Number of calibrated steps.
    fn get_step_size(&self) -> VibResult<usize> {
        Err(VibError::Unsupported)
    }

    /// Calibrated intensities.
    fn get_intensities(&self) -> VibResult<CalibrationArray> {
        Err(VibError::Unsupported)
    }

    /// Calibrated haptic intensities.
    fn get_haptic_intensities(&self) -> VibResult<CalibrationArray> {
        Err(VibError::Unsupported)
    }

    /// Calibrated haptic durations.
    fn get_haptic_durations(&self) -> VibResult<CalibrationArray> {
        Err(VibError::Unsupported)
    }

    /// Current on-chip trigger index, backend formatted.
    fn get_cp_trigger_index(&self) -> VibResult<String> {
        Err(VibError::Unsupported)
    }

    /// Select an on-chip trigger index.
    fn set_cp_trigger_index(&self, _raw: &str) -> VibResult<()> {
        Err(VibError::Unsupported)
    }

    /// Current on-chip trigger queue, backend formatted.
    fn get_cp_trigger_queue(&self) -> VibResult<String> {
        Err(VibError::Unsupported)
    }

    /// Program an on-chip trigger queue.
    fn set_cp_trigger_queue(&self, _raw: &str) -> VibResult<()> {
        Err(VibError::Unsupported)
    }

    /// Current PWLE waveform, backend formatted.
    fn get_pwle(&self) -> VibResult<String> {
        Err(VibError::Unsupported)
    }

    /// Program a PWLE waveform.
    fn set_pwle(&self, _raw: &str) -> VibResult<()> {
        Err(VibError::Unsupported)
    }

    /// Virtual composite index table.
    fn get_virtual_composite_indexes(&self) -> VibResult<String> {
        Err(VibError::Unsupported)
    }

    /// Virtual PWLE index table.
    fn get_virtual_pwle_indexes(&self) -> VibResult<String> {
        Err(VibError::Unsupported)
    }

    /// Motor type string.
    fn get_motor_type(&self) -> VibResult<String> {
        Err(VibError::Unsupported)
    }

    /// Toggle separate-index mode.
    fn set_use_sep_index(&self, _on: bool) -> VibResult<()> {
        Err(VibError::Unsupported)
    }

    /// Number of on-chip waveforms, backend formatted.
    fn get_num_waves(&self) -> VibResult<String> {
        Err(VibError::Unsupported)
    }

    /// Forward a device event command.
    fn set_event_cmd(&self, _cmd: EventCommand) -> VibResult<()> {
        Err(VibError::Unsupported)
    }
}

/// Factory function that creates a backend instance.
pub type DriverFactory = fn() -> Arc<dyn VibratorOps>;

#[cfg(test)]
mod tests {
    use super::*;

    struct EnableOnly;

    impl VibratorOps for EnableOnly {
        fn name(&self) -> &'static str {
            "enable-only"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::ENABLE
        }

        fn enable(&self, _on: bool) -> VibResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_default_methods_report_unsupported() {
        let ops = EnableOnly;
        assert!(ops.enable(true).is_ok());
        assert_eq!(ops.set_intensity(10), Err(VibError::Unsupported));
        assert_eq!(ops.get_motor_type(), Err(VibError::Unsupported));
        assert_eq!(
            ops.set_event_cmd(EventCommand::FolderOpen),
            Err(VibError::Unsupported)
        );
    }

    #[test]
    fn test_capability_sets() {
        assert!(Capabilities::HAPTIC_ENGINE.has(Capabilities::BASIC));
        assert!(!Capabilities::BASIC.has(Capabilities::FREQUENCY));
        assert!(Capabilities::default().is_empty());
    }
}
