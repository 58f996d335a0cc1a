//! Simulated actuator state and call log.

use vib_common::capability::Capabilities;
use vib_common::consts::FREQ_ALERT;
use vib_common::event::EventCommand;

/// One call received by the simulation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCall {
    /// `enable`
    Enable(bool),
    /// `set_intensity`
    Intensity(i32),
    /// `set_frequency`
    Frequency(i32),
    /// `set_overdrive`
    Overdrive(bool),
    /// `set_tuning_with_temp`
    Tuning(i32),
    /// `set_cp_trigger_index`
    TriggerIndex(String),
    /// `set_cp_trigger_queue`
    TriggerQueue(String),
    /// `set_pwle`
    Pwle(String),
    /// `set_use_sep_index`
    UseSepIndex(bool),
    /// `set_event_cmd`
    EventCmd(EventCommand),
}

/// Actuator outputs as the simulated hardware sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimOutput {
    /// Motor energized.
    pub enabled: bool,
    /// Applied intensity.
    pub intensity: i32,
    /// Applied frequency.
    pub frequency: i32,
    /// Overdrive on.
    pub overdrive: bool,
}

impl Default for SimOutput {
    fn default() -> Self {
        Self {
            enabled: false,
            intensity: 0,
            frequency: FREQ_ALERT,
            overdrive: false,
        }
    }
}

/// Mutable backend state guarded by the driver's lock.
#[derive(Debug, Default)]
pub(super) struct SimState {
    pub output: SimOutput,
    pub celsius: Option<i32>,
    pub trigger_index: String,
    pub trigger_queue: String,
    pub pwle: String,
    pub use_sep_index: bool,
    pub event_cmd: EventCommand,
    pub log: Vec<SimCall>,
    pub failing: Capabilities,
    pub failures: u64,
}
