//! Simulation backend implementation.
//!
//! `SimulationVibrator` implements every `VibratorOps` method but only
//! accepts the calls its capability set allows. Each accepted call is
//! appended to a log before it takes effect, so a test sees attempted calls
//! even when failure injection makes them fail.

use super::state::{SimCall, SimOutput, SimState};
use parking_lot::Mutex;
use tracing::{debug, warn};
use vib_common::capability::{CalibrationArray, Capabilities, VibratorOps};
use vib_common::consts::MAX_HAPTIC_STEP_SIZE;
use vib_common::error::{VibError, VibResult};
use vib_common::event::EventCommand;

const DEFAULT_MOTOR_TYPE: &str = "LRA";
const DEFAULT_NUM_WAVES: u32 = 24;
const VIRTUAL_COMPOSITE_INDEXES: &str = "0~9";
const VIRTUAL_PWLE_INDEXES: &str = "0~4";

/// Calibration data reported by the simulated motor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calibration {
    /// Number of calibrated steps.
    pub step_size: usize,
    /// Intensity per step.
    pub intensities: CalibrationArray,
    /// Haptic intensity per step.
    pub haptic_intensities: CalibrationArray,
    /// Haptic duration per step.
    pub haptic_durations: CalibrationArray,
}

impl Calibration {
    /// Build from per-step slices; the step size is the length of `intensities`.
    ///
    /// # Errors
    /// `InvalidArgument` if a slice does not fit `MAX_HAPTIC_STEP_SIZE`.
    pub fn from_slices(
        intensities: &[i32],
        haptic_intensities: &[i32],
        haptic_durations: &[i32],
    ) -> VibResult<Self> {
        let array = |values: &[i32]| {
            let mut out = CalibrationArray::new();
            for &v in values {
                out.push(v).map_err(|_| {
                    VibError::invalid(format!(
                        "{} calibration values exceed {}",
                        values.len(),
                        MAX_HAPTIC_STEP_SIZE
                    ))
                })?;
            }
            Ok::<_, VibError>(out)
        };
        Ok(Self {
            step_size: intensities.len(),
            intensities: array(intensities)?,
            haptic_intensities: array(haptic_intensities)?,
            haptic_durations: array(haptic_durations)?,
        })
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            step_size: 6,
            intensities: CalibrationArray::from_iter([0, 2000, 4000, 6000, 8000, 10000]),
            haptic_intensities: CalibrationArray::from_iter([0, 1500, 3500, 5500, 7500, 10000]),
            haptic_durations: CalibrationArray::from_iter([0, 10, 15, 20, 25, 30]),
        }
    }
}

/// In-memory vibrator backend.
pub struct SimulationVibrator {
    name: &'static str,
    caps: Capabilities,
    calibration: Option<Calibration>,
    motor_type: &'static str,
    num_waves: u32,
    state: Mutex<SimState>,
}

impl SimulationVibrator {
    /// Create a backend offering exactly `caps`, without calibration data.
    pub fn new(caps: Capabilities) -> Self {
        Self {
            name: "simulation",
            caps,
            calibration: None,
            motor_type: DEFAULT_MOTOR_TYPE,
            num_waves: DEFAULT_NUM_WAVES,
            state: Mutex::new(SimState::default()),
        }
    }

    /// Backend offering every operation, with default calibration data.
    pub fn full() -> Self {
        Self::new(Capabilities::all()).with_calibration(Calibration::default())
    }

    /// Make the calls behind `failing` report a backend failure.
    pub fn with_failures(self, failing: Capabilities) -> Self {
        self.set_failures(failing);
        self
    }

    /// Attach calibration data.
    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = Some(calibration);
        self
    }

    /// Report `motor_type` instead of the default.
    pub fn with_motor_type(mut self, motor_type: &'static str) -> Self {
        self.motor_type = motor_type;
        self
    }

    /// Change failure injection at runtime.
    pub fn set_failures(&self, failing: Capabilities) {
        self.state.lock().failing = failing;
    }

    /// Every call received so far, in order.
    pub fn call_log(&self) -> Vec<SimCall> {
        self.state.lock().log.clone()
    }

    /// Forget the recorded calls.
    pub fn clear_log(&self) {
        self.state.lock().log.clear();
    }

    /// Current simulated actuator outputs.
    pub fn output(&self) -> SimOutput {
        self.state.lock().output
    }

    /// Number of calls that failed through injection.
    pub fn failure_count(&self) -> u64 {
        self.state.lock().failures
    }

    fn check(&self, cap: Capabilities) -> VibResult<()> {
        if self.caps.has(cap) {
            Ok(())
        } else {
            Err(VibError::Unsupported)
        }
    }

    /// Log a setter call and apply it unless failure injection is active.
    fn record(
        &self,
        cap: Capabilities,
        call: SimCall,
        apply: impl FnOnce(&mut SimState),
    ) -> VibResult<()> {
        self.check(cap)?;
        let mut st = self.state.lock();
        debug!("sim: {:?}", call);
        st.log.push(call.clone());
        if st.failing.intersects(cap) {
            st.failures += 1;
            warn!("sim: injected failure for {:?}", call);
            return Err(VibError::backend(format!("simulated failure: {call:?}")));
        }
        apply(&mut st);
        Ok(())
    }

    fn query<T>(&self, cap: Capabilities, read: impl FnOnce(&SimState) -> T) -> VibResult<T> {
        self.check(cap)?;
        let mut st = self.state.lock();
        if st.failing.intersects(cap) {
            st.failures += 1;
            return Err(VibError::backend(format!("simulated read failure: {cap:?}")));
        }
        Ok(read(&st))
    }

    fn calibration_data(&self, cap: Capabilities) -> VibResult<&Calibration> {
        self.query(cap, |_| ())?;
        self.calibration
            .as_ref()
            .ok_or_else(|| VibError::backend("no calibration data"))
    }
}

impl Default for SimulationVibrator {
    fn default() -> Self {
        Self::full()
    }
}

impl VibratorOps for SimulationVibrator {
    fn name(&self) -> &'static str {
        self.name
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn enable(&self, on: bool) -> VibResult<()> {
        self.record(Capabilities::ENABLE, SimCall::Enable(on), |st| {
            st.output.enabled = on;
        })
    }

    fn set_intensity(&self, intensity: i32) -> VibResult<()> {
        self.record(Capabilities::INTENSITY, SimCall::Intensity(intensity), |st| {
            st.output.intensity = intensity;
        })
    }

    fn set_frequency(&self, frequency: i32) -> VibResult<()> {
        self.record(Capabilities::FREQUENCY, SimCall::Frequency(frequency), |st| {
            st.output.frequency = frequency;
        })
    }

    fn set_overdrive(&self, on: bool) -> VibResult<()> {
        self.record(Capabilities::OVERDRIVE, SimCall::Overdrive(on), |st| {
            st.output.overdrive = on;
        })
    }

    fn set_tuning_with_temp(&self, celsius: i32) -> VibResult<()> {
        self.record(Capabilities::TUNING_WITH_TEMP, SimCall::Tuning(celsius), |st| {
            st.celsius = Some(celsius);
        })
    }

    fn get_calibration(&self) -> VibResult<bool> {
        self.query(Capabilities::CALIBRATION, |_| self.calibration.is_some())
    }

    fn get_step_size(&self) -> VibResult<usize> {
        Ok(self.calibration_data(Capabilities::STEP_SIZE)?.step_size)
    }

    fn get_intensities(&self) -> VibResult<CalibrationArray> {
        Ok(self.calibration_data(Capabilities::INTENSITIES)?.intensities.clone())
    }

    fn get_haptic_intensities(&self) -> VibResult<CalibrationArray> {
        Ok(self
            .calibration_data(Capabilities::HAPTIC_INTENSITIES)?
            .haptic_intensities
            .clone())
    }

    fn get_haptic_durations(&self) -> VibResult<CalibrationArray> {
        Ok(self
            .calibration_data(Capabilities::HAPTIC_DURATIONS)?
            .haptic_durations
            .clone())
    }

    fn get_cp_trigger_index(&self) -> VibResult<String> {
        self.query(Capabilities::CP_TRIGGER_INDEX, |st| {
            if st.trigger_index.is_empty() {
                "0".to_string()
            } else {
                st.trigger_index.clone()
            }
        })
    }

    fn set_cp_trigger_index(&self, raw: &str) -> VibResult<()> {
        let raw = raw.trim().to_string();
        self.record(
            Capabilities::CP_TRIGGER_INDEX,
            SimCall::TriggerIndex(raw.clone()),
            |st| st.trigger_index = raw,
        )
    }

    fn get_cp_trigger_queue(&self) -> VibResult<String> {
        self.query(Capabilities::CP_TRIGGER_QUEUE, |st| st.trigger_queue.clone())
    }

    fn set_cp_trigger_queue(&self, raw: &str) -> VibResult<()> {
        let raw = raw.trim().to_string();
        self.record(
            Capabilities::CP_TRIGGER_QUEUE,
            SimCall::TriggerQueue(raw.clone()),
            |st| st.trigger_queue = raw,
        )
    }

    fn get_pwle(&self) -> VibResult<String> {
        self.query(Capabilities::PWLE, |st| st.pwle.clone())
    }

    fn set_pwle(&self, raw: &str) -> VibResult<()> {
        let raw = raw.trim().to_string();
        self.record(Capabilities::PWLE, SimCall::Pwle(raw.clone()), |st| st.pwle = raw)
    }

    fn get_virtual_composite_indexes(&self) -> VibResult<String> {
        self.query(Capabilities::VIRTUAL_COMPOSITE_INDEXES, |_| {
            VIRTUAL_COMPOSITE_INDEXES.to_string()
        })
    }

    fn get_virtual_pwle_indexes(&self) -> VibResult<String> {
        self.query(Capabilities::VIRTUAL_PWLE_INDEXES, |_| {
            VIRTUAL_PWLE_INDEXES.to_string()
        })
    }

    fn get_motor_type(&self) -> VibResult<String> {
        self.query(Capabilities::MOTOR_TYPE, |_| self.motor_type.to_string())
    }

    fn set_use_sep_index(&self, on: bool) -> VibResult<()> {
        self.record(Capabilities::USE_SEP_INDEX, SimCall::UseSepIndex(on), |st| {
            st.use_sep_index = on;
        })
    }

    fn get_num_waves(&self) -> VibResult<String> {
        self.query(Capabilities::NUM_WAVES, |_| self.num_waves.to_string())
    }

    fn set_event_cmd(&self, cmd: EventCommand) -> VibResult<()> {
        self.record(Capabilities::EVENT_CMD, SimCall::EventCmd(cmd), |st| {
            st.event_cmd = cmd;
        })
    }
}
