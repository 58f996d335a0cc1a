//! Sequencing engine.
//!
//! The `Controller` is the single authority over what the actuator is doing.
//! Every state transition and every backend call happens under one state
//! lock. Timer expiries never touch that state directly: the expiry handler
//! queues a step advance on the worker, and the worker applies it.
//!
//! Requests that restart or stop playback first cancel the timer and then
//! flush the worker, both before taking the lock. Each arming also carries
//! the run token current at that moment; the worker drops expiries whose
//! token no longer matches, so a step from an old run can never land after a
//! newer run has started.

use crate::notifier::{NotifierChain, VibEvent};
use crate::thermal::{FixedThermal, ThermalSource, tune_for_temperature};
use crate::timer::{OneShotTimer, ThreadTimer};
use crate::worker::{WorkSlot, Worker};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use vib_common::capability::{CalibrationArray, Capabilities, VibratorOps};
use vib_common::config::{VibLimits, VibratorConfig};
use vib_common::consts::{MAX_HAPTIC_STEP_SIZE, MAX_STR_LEN_EVENT_CMD};
use vib_common::error::{VibError, VibResult};
use vib_common::event::EventCommand;
use vib_common::packet::{PacketStore, WaveformStep};

/// Motor type reported when the backend cannot tell.
pub const MOTOR_TYPE_NONE: &str = "NONE";

/// Playback mode of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Actuator released, nothing armed.
    #[default]
    Idle,
    /// Single-shot timeout running (or an indexed trigger playing).
    SingleShot,
    /// Packet sequence running.
    Packet,
}

/// Values last applied to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorOutput {
    /// Motor energized.
    pub enabled: bool,
    /// Applied intensity.
    pub intensity: i32,
    /// Applied frequency.
    pub frequency: i32,
    /// Overdrive on.
    pub overdrive: bool,
}

/// Packet playback cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketCursor {
    /// A packet is loaded and drives the next request.
    pub enabled: bool,
    /// The actuator is energized as part of packet playback.
    pub running: bool,
    /// Step being played.
    pub current_step: usize,
    /// Steps in the loaded packet.
    pub step_count: usize,
}

/// Counters for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStats {
    /// Runs started by `request_timeout`.
    pub runs_started: u64,
    /// Packet steps applied.
    pub steps_applied: u64,
    /// Backend calls that reported a failure.
    pub backend_failures: u64,
    /// Expiries dropped because their run had been superseded.
    pub stale_expiries: u64,
}

/// Point-in-time copy of the controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSnapshot {
    /// A backend is bound.
    pub registered: bool,
    /// Current playback mode.
    pub playback: PlaybackState,
    /// Requested timeout or current step duration.
    pub timeout_ms: u32,
    /// Intensity setpoint.
    pub intensity: i32,
    /// Frequency setpoint.
    pub frequency: i32,
    /// Active on-chip waveform index (0 = none).
    pub index: u32,
    /// Packet cursor.
    pub cursor: PacketCursor,
    /// Values last applied to the backend.
    pub output: ActuatorOutput,
    /// Counters.
    pub stats: EngineStats,
}

struct EngineState {
    ops: Option<Arc<dyn VibratorOps>>,
    caps: Capabilities,
    timeout_ms: u32,
    intensity: i32,
    frequency: i32,
    index: u32,
    playback: PlaybackState,
    packet: PacketStore,
    cursor: PacketCursor,
    output: ActuatorOutput,
    run_token: u64,
    stats: EngineStats,
}

impl EngineState {
    fn new(ops: Arc<dyn VibratorOps>, limits: &VibLimits) -> Self {
        let caps = ops.capabilities();
        let alert = limits.frequency.alert;
        Self {
            ops: Some(ops),
            caps,
            timeout_ms: 0,
            intensity: if caps.has(Capabilities::INTENSITY) {
                limits.max_intensity
            } else {
                0
            },
            frequency: alert,
            index: 0,
            playback: PlaybackState::Idle,
            packet: PacketStore::new(),
            cursor: PacketCursor::default(),
            output: ActuatorOutput {
                enabled: false,
                intensity: 0,
                frequency: alert,
                overdrive: false,
            },
            run_token: 0,
            stats: EngineStats::default(),
        }
    }

    fn bound(&self) -> VibResult<Arc<dyn VibratorOps>> {
        self.ops.clone().ok_or(VibError::NotInitialized)
    }

    fn require(&self, cap: Capabilities) -> VibResult<()> {
        if self.caps.has(cap) {
            Ok(())
        } else {
            Err(VibError::Unsupported)
        }
    }

    /// Issue one output call if the capability is present and record the
    /// applied value on success.
    fn drive(
        &mut self,
        cap: Capabilities,
        what: &str,
        call: impl FnOnce() -> VibResult<()>,
        apply: impl FnOnce(&mut ActuatorOutput),
    ) -> VibResult<()> {
        self.require(cap)?;
        match call() {
            Ok(()) => {
                apply(&mut self.output);
                Ok(())
            }
            Err(e) => {
                self.stats.backend_failures += 1;
                error!("{} error: {}", what, e);
                Err(e)
            }
        }
    }

    fn next_run(&mut self) -> u64 {
        self.run_token = self.run_token.wrapping_add(1);
        self.run_token
    }

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            registered: self.ops.is_some(),
            playback: self.playback,
            timeout_ms: self.timeout_ms,
            intensity: self.intensity,
            frequency: self.frequency,
            index: self.index,
            cursor: self.cursor,
            output: self.output,
            stats: self.stats,
        }
    }
}

struct Inner {
    state: Mutex<EngineState>,
    event_cmd: Mutex<EventCommand>,
    limits: VibLimits,
    timer: Arc<dyn OneShotTimer>,
    notifier: Arc<NotifierChain>,
    thermal: Option<Arc<dyn ThermalSource>>,
}

impl Inner {
    /// Issue enable and broadcast the transition. Nothing is broadcast when
    /// the backend has no enable call; a failed call is still broadcast.
    fn drive_enable(&self, st: &mut EngineState, ops: &dyn VibratorOps, on: bool) {
        if st.require(Capabilities::ENABLE).is_err() {
            return;
        }
        let _ = st.drive(Capabilities::ENABLE, "enable", || ops.enable(on), |o| {
            o.enabled = on;
        });
        self.notifier.notify(&VibEvent {
            active: on,
            index: st.index,
            timeout_ms: st.timeout_ms,
        });
    }

    fn drive_intensity(st: &mut EngineState, ops: &dyn VibratorOps, intensity: i32) -> VibResult<()> {
        st.drive(
            Capabilities::INTENSITY,
            "set_intensity",
            || ops.set_intensity(intensity),
            |o| o.intensity = intensity,
        )
    }

    fn drive_frequency(st: &mut EngineState, ops: &dyn VibratorOps, frequency: i32) -> VibResult<()> {
        st.drive(
            Capabilities::FREQUENCY,
            "set_frequency",
            || ops.set_frequency(frequency),
            |o| o.frequency = frequency,
        )
    }

    fn drive_overdrive(st: &mut EngineState, ops: &dyn VibratorOps, on: bool) -> VibResult<()> {
        st.drive(
            Capabilities::OVERDRIVE,
            "set_overdrive",
            || ops.set_overdrive(on),
            |o| o.overdrive = on,
        )
    }

    /// Single-shot enable: tuning, stored frequency, stored intensity, enable.
    fn haptic_enable(&self, st: &mut EngineState, ops: &dyn VibratorOps) {
        if st.caps.has(Capabilities::TUNING_WITH_TEMP)
            && tune_for_temperature(ops, self.thermal.as_deref()).is_err()
        {
            debug!("temperature tuning skipped");
        }
        let (frequency, intensity) = (st.frequency, st.intensity);
        let _ = Self::drive_frequency(st, ops, frequency);
        let _ = Self::drive_intensity(st, ops, intensity);
        self.drive_enable(st, ops, true);
    }

    /// Drive the actuator to its safe state. Every call is attempted.
    fn disable_locked(&self, st: &mut EngineState, ops: &dyn VibratorOps) {
        // A step advance finishing during the drain may have re-armed.
        self.timer.cancel();
        st.index = 0;
        st.cursor = PacketCursor::default();
        st.playback = PlaybackState::Idle;

        self.drive_enable(st, ops, false);
        let _ = Self::drive_overdrive(st, ops, false);
        let _ = Self::drive_frequency(st, ops, self.limits.frequency.alert);
        let _ = Self::drive_intensity(st, ops, 0);
    }

    /// Apply one packet step without toggling enable between consecutive
    /// steps of the same polarity.
    fn apply_packet_step(&self, st: &mut EngineState, ops: &dyn VibratorOps, step: WaveformStep) {
        info!(
            "packet step {}/{}: time {} intensity {} freq {} overdrive {}",
            st.cursor.current_step + 1,
            st.cursor.step_count,
            step.time_ms,
            step.intensity,
            step.frequency,
            step.overdrive
        );
        st.timeout_ms = step.time_ms;
        let _ = Self::drive_overdrive(st, ops, step.overdrive);
        if self.limits.frequency.contains(step.frequency) {
            let _ = Self::drive_frequency(st, ops, step.frequency);
        } else {
            warn!("packet step frequency {} out of range, not applied", step.frequency);
        }

        if step.intensity != 0 {
            let _ = Self::drive_intensity(st, ops, step.intensity);
            if !st.cursor.running {
                self.drive_enable(st, ops, true);
                st.cursor.running = true;
            }
        } else {
            if st.cursor.running {
                self.drive_enable(st, ops, false);
                st.cursor.running = false;
            }
            let _ = Self::drive_intensity(st, ops, 0);
        }
        st.stats.steps_applied += 1;
    }

    fn arm(&self, st: &EngineState, after_ms: u32) {
        debug!("arming timer for {} ms (run {})", after_ms, st.run_token);
        self.timer
            .start(Duration::from_millis(u64::from(after_ms)), st.run_token);
    }

    /// Worker entry point: move to the next step or finish the run.
    fn advance_step(&self, token: u64) {
        let mut st = self.state.lock();
        if token != st.run_token {
            st.stats.stale_expiries += 1;
            debug!("dropping expiry for run {} (current {})", token, st.run_token);
            return;
        }
        let Some(ops) = st.ops.clone() else {
            return;
        };

        if st.cursor.enabled {
            st.cursor.current_step += 1;
            let next = st.cursor.current_step;
            let step = if next < st.cursor.step_count {
                st.packet.get(next).copied()
            } else {
                None
            };
            if let Some(step) = step {
                st.playback = PlaybackState::Packet;
                self.apply_packet_step(&mut st, &*ops, step);
                self.arm(&st, step.time_ms);
                return;
            }
            info!("packet finished after {} steps", st.cursor.step_count);
        }
        self.disable_locked(&mut st, &*ops);
    }
}

/// Timer context: hand the advance to the worker and leave the timer idle.
fn on_timer_expiry(slot: &WorkSlot, token: u64) {
    if !slot.queue(token) {
        debug!("step advance already pending, replaced with run {}", token);
    }
}

/// Builder for a [`Controller`].
///
/// Defaults: [`VibratorConfig::default`], a [`ThreadTimer`], a fresh
/// [`NotifierChain`], and the thermal source from the config (if any).
#[derive(Default)]
pub struct ControllerBuilder {
    config: VibratorConfig,
    timer: Option<Arc<dyn OneShotTimer>>,
    thermal: Option<Arc<dyn ThermalSource>>,
    notifier: Option<Arc<NotifierChain>>,
}

impl ControllerBuilder {
    /// Start from defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config` for limits, thermal source and the initial event command.
    pub fn config(mut self, config: VibratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `timer` as the deadline source.
    pub fn timer(mut self, timer: Arc<dyn OneShotTimer>) -> Self {
        self.timer = Some(timer);
        self
    }

    /// Use `source` for temperature tuning, overriding the config.
    pub fn thermal(mut self, source: Arc<dyn ThermalSource>) -> Self {
        self.thermal = Some(source);
        self
    }

    /// Broadcast on an existing chain.
    pub fn notifier(mut self, chain: Arc<NotifierChain>) -> Self {
        self.notifier = Some(chain);
        self
    }

    /// Bind `ops` and start the worker.
    ///
    /// # Errors
    /// `InitFailed` if the config is invalid or a thread cannot be spawned.
    pub fn register(self, ops: Arc<dyn VibratorOps>) -> VibResult<Controller> {
        self.config
            .validate()
            .map_err(|e| VibError::InitFailed(e.to_string()))?;

        let limits = self.config.limits;
        let thermal = self.thermal.or_else(|| {
            self.config
                .thermal
                .map(|t| Arc::new(FixedThermal::from(t)) as Arc<dyn ThermalSource>)
        });
        let event_cmd = self
            .config
            .event_cmd
            .as_deref()
            .map(EventCommand::from_name)
            .unwrap_or_default();

        let slot = Arc::new(WorkSlot::new());
        let timer = self
            .timer
            .unwrap_or_else(|| Arc::new(ThreadTimer::new("vib_timer")) as Arc<dyn OneShotTimer>);
        let expiry_slot = Arc::clone(&slot);
        timer.bind(Arc::new(move |token| on_timer_expiry(&expiry_slot, token)))?;

        let name = ops.name();
        let state = EngineState::new(ops, &limits);
        let caps = state.caps;
        let inner = Arc::new(Inner {
            state: Mutex::new(state),
            event_cmd: Mutex::new(event_cmd),
            limits,
            timer,
            notifier: self.notifier.unwrap_or_default(),
            thermal,
        });

        let worker_inner = Arc::clone(&inner);
        let worker = Worker::spawn("vib_worker", slot, move |token| {
            worker_inner.advance_step(token);
        })?;

        info!(
            "vibrator '{}' registered (caps: {:?}, event: {})",
            name, caps, event_cmd
        );
        Ok(Controller { inner, worker })
    }
}

/// Haptic actuator controller bound to one backend.
pub struct Controller {
    inner: Arc<Inner>,
    worker: Worker,
}

impl Controller {
    /// Register `ops` with the given config and default collaborators.
    ///
    /// # Errors
    /// See [`ControllerBuilder::register`].
    pub fn register(ops: Arc<dyn VibratorOps>, config: &VibratorConfig) -> VibResult<Self> {
        ControllerBuilder::new().config(config.clone()).register(ops)
    }

    /// Cancel the pending deadline and wait for in-flight step work.
    fn drain(&self) {
        if self.inner.timer.cancel() {
            debug!("pending deadline cancelled");
        }
        self.worker.flush();
    }

    /// Start, restart or stop playback.
    ///
    /// `value_ms` is clamped to `[0, max_timeout_ms]`. Zero disables. A
    /// loaded packet plays from its first step; otherwise the stored
    /// frequency and intensity are applied and the actuator enabled for
    /// `value_ms`. No timer is armed while an on-chip index is selected.
    pub fn request_timeout(&self, value_ms: i64) -> VibResult<()> {
        self.drain();

        let inner = &*self.inner;
        let mut st = inner.state.lock();
        let ops = st.bound()?;
        let timeout = inner.limits.clamp_timeout(value_ms);
        inner.timer.cancel();
        st.next_run();
        st.timeout_ms = timeout;

        if timeout == 0 {
            info!("request_timeout: 0, disabling");
            inner.disable_locked(&mut st, &*ops);
            return Ok(());
        }
        st.stats.runs_started += 1;

        let first = if st.cursor.enabled {
            st.packet.get(0).copied()
        } else {
            None
        };
        if let Some(first) = first {
            info!(
                "request_timeout: starting packet of {} steps",
                st.cursor.step_count
            );
            st.playback = PlaybackState::Packet;
            st.cursor.current_step = 0;
            st.cursor.running = false;
            inner.apply_packet_step(&mut st, &*ops, first);
            if st.index == 0 {
                inner.arm(&st, first.time_ms);
            }
        } else {
            info!("request_timeout: {} ms (index {})", timeout, st.index);
            st.playback = PlaybackState::SingleShot;
            inner.haptic_enable(&mut st, &*ops);
            if st.index == 0 {
                inner.arm(&st, timeout);
            }
        }
        Ok(())
    }

    /// Stop playback and drive the actuator to its safe state.
    ///
    /// Always issues the full reset sequence, even when already idle.
    pub fn disable(&self) -> VibResult<()> {
        self.drain();
        let mut st = self.inner.state.lock();
        let ops = st.bound()?;
        st.next_run();
        self.inner.disable_locked(&mut st, &*ops);
        Ok(())
    }

    /// Replace the packet store.
    ///
    /// # Errors
    /// `InvalidArgument` if a step is out of range. The previous packet is
    /// kept but packet mode is switched off.
    pub fn load_packet(&self, packet: PacketStore) -> VibResult<()> {
        self.commit_packet(Ok(packet))
    }

    /// Decode the flat bulk format and load it. See [`PacketStore::from_flat`].
    pub fn load_packet_flat(&self, values: &[i64]) -> VibResult<()> {
        self.commit_packet(PacketStore::from_flat(values))
    }

    /// Parse the textual bulk format and load it. See [`PacketStore::parse`].
    pub fn load_packet_str(&self, text: &str) -> VibResult<()> {
        self.commit_packet(PacketStore::parse(text))
    }

    fn commit_packet(&self, decoded: VibResult<PacketStore>) -> VibResult<()> {
        let mut st = self.inner.state.lock();
        st.bound()?;

        let packet = match decoded.and_then(|p| p.validate(&self.inner.limits).map(|()| p)) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("packet rejected: {}", e);
                st.cursor.enabled = false;
                return Err(e);
            }
        };

        st.cursor = PacketCursor {
            enabled: !packet.is_empty(),
            running: st.cursor.running,
            current_step: 0,
            step_count: packet.len(),
        };
        info!(
            "packet loaded: {} steps, {} ms total",
            packet.len(),
            packet.total_duration_ms()
        );
        st.packet = packet;
        Ok(())
    }

    /// Set and apply the intensity setpoint.
    ///
    /// # Errors
    /// `Unsupported` without the intensity capability, `InvalidArgument`
    /// outside `[-max_intensity, max_intensity]`.
    pub fn set_intensity(&self, intensity: i32) -> VibResult<()> {
        let mut st = self.inner.state.lock();
        let ops = st.bound()?;
        st.require(Capabilities::INTENSITY)?;
        if !self.inner.limits.intensity_in_range(intensity) {
            warn!("intensity {} out of range", intensity);
            return Err(VibError::invalid(format!("intensity {intensity} out of range")));
        }
        st.intensity = intensity;
        Inner::drive_intensity(&mut st, &*ops, intensity)
    }

    /// Set and apply the frequency setpoint.
    ///
    /// # Errors
    /// `Unsupported` without the frequency capability, `InvalidArgument`
    /// outside the configured frequency bands.
    pub fn set_frequency(&self, frequency: i32) -> VibResult<()> {
        let mut st = self.inner.state.lock();
        let ops = st.bound()?;
        st.require(Capabilities::FREQUENCY)?;
        if !self.inner.limits.frequency.contains(frequency) {
            warn!("frequency {} out of range", frequency);
            return Err(VibError::invalid(format!("frequency {frequency} out of range")));
        }
        st.frequency = frequency;
        Inner::drive_frequency(&mut st, &*ops, frequency)
    }

    /// Switch overdrive.
    pub fn set_overdrive(&self, on: bool) -> VibResult<()> {
        let mut st = self.inner.state.lock();
        let ops = st.bound()?;
        st.require(Capabilities::OVERDRIVE)?;
        Inner::drive_overdrive(&mut st, &*ops, on)
    }

    /// Intensity setpoint.
    pub fn intensity(&self) -> VibResult<i32> {
        let st = self.inner.state.lock();
        st.bound()?;
        Ok(st.intensity)
    }

    /// Frequency setpoint.
    pub fn frequency(&self) -> VibResult<i32> {
        let st = self.inner.state.lock();
        st.bound()?;
        Ok(st.frequency)
    }

    /// Milliseconds until the pending deadline, 0 when nothing is armed.
    pub fn remaining_ms(&self) -> VibResult<u64> {
        self.inner.state.lock().bound()?;
        let remaining = self.inner.timer.remaining().unwrap_or_default();
        Ok(u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX))
    }

    /// Loaded steps while packet mode is on, empty otherwise.
    pub fn packet(&self) -> VibResult<Vec<WaveformStep>> {
        let st = self.inner.state.lock();
        st.bound()?;
        if st.cursor.enabled {
            Ok(st.packet.as_slice().to_vec())
        } else {
            Ok(Vec::new())
        }
    }

    /// Current playback mode.
    pub fn playback(&self) -> PlaybackState {
        self.inner.state.lock().playback
    }

    /// Copy of the full controller state.
    pub fn snapshot(&self) -> EngineSnapshot {
        self.inner.state.lock().snapshot()
    }

    /// Capabilities of the bound backend; empty once unregistered.
    pub fn capabilities(&self) -> Capabilities {
        self.inner.state.lock().caps
    }

    /// Enable/disable notification chain.
    pub fn notifier(&self) -> &Arc<NotifierChain> {
        &self.inner.notifier
    }

    /// Wait until no step advance is pending or running.
    pub fn flush(&self) {
        self.worker.flush();
    }

    /// Run `call` against the backend under the state lock.
    fn with_backend<T>(
        &self,
        cap: Capabilities,
        what: &str,
        call: impl FnOnce(&dyn VibratorOps) -> VibResult<T>,
    ) -> VibResult<T> {
        let st = self.inner.state.lock();
        let ops = st.ops.as_deref().ok_or(VibError::NotInitialized)?;
        st.require(cap)?;
        call(ops).map_err(|e| {
            error!("{} error: {}", what, e);
            e
        })
    }

    // ─── On-chip triggers ───────────────────────────────────────────

    /// Select an on-chip waveform. While non-zero, requests rely on the
    /// backend for timing and no timer is armed.
    pub fn set_trigger_index(&self, text: &str) -> VibResult<()> {
        let mut st = self.inner.state.lock();
        let ops = st.bound()?;
        st.require(Capabilities::CP_TRIGGER_INDEX)?;
        let index: u32 = text
            .trim()
            .parse()
            .map_err(|_| VibError::invalid(format!("bad trigger index '{}'", text.trim())))?;
        st.index = index;
        info!("trigger index set to {}", index);
        ops.set_cp_trigger_index(text).map_err(|e| {
            error!("set_cp_trigger_index error: {}", e);
            e
        })
    }

    /// Backend trigger index.
    pub fn trigger_index(&self) -> VibResult<String> {
        self.with_backend(Capabilities::CP_TRIGGER_INDEX, "get_cp_trigger_index", |ops| {
            ops.get_cp_trigger_index()
        })
    }

    /// Program the backend trigger queue.
    pub fn set_trigger_queue(&self, text: &str) -> VibResult<()> {
        self.with_backend(Capabilities::CP_TRIGGER_QUEUE, "set_cp_trigger_queue", |ops| {
            ops.set_cp_trigger_queue(text)
        })
    }

    /// Backend trigger queue.
    pub fn trigger_queue(&self) -> VibResult<String> {
        self.with_backend(Capabilities::CP_TRIGGER_QUEUE, "get_cp_trigger_queue", |ops| {
            ops.get_cp_trigger_queue()
        })
    }

    /// Program a PWLE waveform.
    pub fn set_pwle(&self, text: &str) -> VibResult<()> {
        self.with_backend(Capabilities::PWLE, "set_pwle", |ops| ops.set_pwle(text))
    }

    /// Backend PWLE waveform.
    pub fn pwle(&self) -> VibResult<String> {
        self.with_backend(Capabilities::PWLE, "get_pwle", |ops| ops.get_pwle())
    }

    /// Virtual composite index table.
    pub fn virtual_composite_indexes(&self) -> VibResult<String> {
        self.with_backend(
            Capabilities::VIRTUAL_COMPOSITE_INDEXES,
            "get_virtual_composite_indexes",
            |ops| ops.get_virtual_composite_indexes(),
        )
    }

    /// Virtual PWLE index table.
    pub fn virtual_pwle_indexes(&self) -> VibResult<String> {
        self.with_backend(
            Capabilities::VIRTUAL_PWLE_INDEXES,
            "get_virtual_pwle_indexes",
            |ops| ops.get_virtual_pwle_indexes(),
        )
    }

    /// Number of on-chip waveforms.
    pub fn num_waves(&self) -> VibResult<String> {
        self.with_backend(Capabilities::NUM_WAVES, "get_num_waves", |ops| {
            ops.get_num_waves()
        })
    }

    /// Motor type, or [`MOTOR_TYPE_NONE`] if the backend cannot report it.
    pub fn motor_type(&self) -> VibResult<String> {
        match self.with_backend(Capabilities::MOTOR_TYPE, "get_motor_type", |ops| {
            ops.get_motor_type()
        }) {
            Err(VibError::Unsupported) => Ok(MOTOR_TYPE_NONE.to_string()),
            other => other,
        }
    }

    /// Toggle separate-index mode. A no-op on backends without it.
    pub fn set_use_sep_index(&self, on: bool) -> VibResult<()> {
        match self.with_backend(Capabilities::USE_SEP_INDEX, "set_use_sep_index", |ops| {
            ops.set_use_sep_index(on)
        }) {
            Err(VibError::Unsupported) => Ok(()),
            other => other,
        }
    }

    // ─── Calibration ────────────────────────────────────────────────

    fn calibration(
        &self,
        cap: Capabilities,
        what: &str,
        get: impl FnOnce(&dyn VibratorOps) -> VibResult<CalibrationArray>,
    ) -> VibResult<CalibrationArray> {
        let needed = cap | Capabilities::CALIBRATION | Capabilities::STEP_SIZE;
        self.with_backend(needed, what, |ops| {
            if !ops.get_calibration()? {
                return Err(VibError::backend("no calibration data"));
            }
            let step_size = ops.get_step_size()?;
            if step_size == 0 || step_size >= MAX_HAPTIC_STEP_SIZE {
                return Err(VibError::invalid(format!(
                    "calibration step size {step_size} out of range"
                )));
            }
            let mut values = get(ops)?;
            values.truncate(step_size);
            Ok(values)
        })
    }

    /// Calibrated intensity per step.
    pub fn intensities(&self) -> VibResult<CalibrationArray> {
        self.calibration(Capabilities::INTENSITIES, "get_intensities", |ops| {
            ops.get_intensities()
        })
    }

    /// Calibrated haptic intensity per step.
    pub fn haptic_intensities(&self) -> VibResult<CalibrationArray> {
        self.calibration(
            Capabilities::HAPTIC_INTENSITIES,
            "get_haptic_intensities",
            |ops| ops.get_haptic_intensities(),
        )
    }

    /// Calibrated haptic duration per step.
    pub fn haptic_durations(&self) -> VibResult<CalibrationArray> {
        self.calibration(
            Capabilities::HAPTIC_DURATIONS,
            "get_haptic_durations",
            |ops| ops.get_haptic_durations(),
        )
    }

    // ─── Event command ──────────────────────────────────────────────

    /// Map `text` onto an [`EventCommand`], forward and store it.
    ///
    /// The command is stored even if the backend rejects it.
    pub fn set_event_cmd(&self, text: &str) -> VibResult<()> {
        let st = self.inner.state.lock();
        let ops = st.bound()?;
        st.require(Capabilities::EVENT_CMD)?;
        if text.len() > MAX_STR_LEN_EVENT_CMD {
            return Err(VibError::invalid(format!(
                "event command longer than {MAX_STR_LEN_EVENT_CMD} bytes"
            )));
        }
        let cmd = EventCommand::from_input(text);
        let result = ops.set_event_cmd(cmd);
        *self.inner.event_cmd.lock() = cmd;
        info!("event command: {}", cmd);
        result.map_err(|e| {
            error!("set_event_cmd error: {}", e);
            e
        })
    }

    /// Last stored event command.
    pub fn event_cmd(&self) -> VibResult<EventCommand> {
        let st = self.inner.state.lock();
        st.bound()?;
        Ok(*self.inner.event_cmd.lock())
    }

    // ─── Lifecycle ──────────────────────────────────────────────────

    /// Stop playback and unbind the backend.
    ///
    /// # Errors
    /// `NotInitialized` if already unregistered.
    pub fn unregister(&self) -> VibResult<()> {
        self.drain();
        let mut st = self.inner.state.lock();
        let ops = st.bound()?;
        st.next_run();
        self.inner.disable_locked(&mut st, &*ops);
        st.ops = None;
        st.caps = Capabilities::empty();
        info!("vibrator '{}' unregistered", ops.name());
        Ok(())
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if self.unregister().is_ok() {
            debug!("controller dropped while registered");
        }
        self.worker.stop();
    }
}
