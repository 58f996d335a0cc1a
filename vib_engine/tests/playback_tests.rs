//! Playback integration tests on a virtual clock.
//!
//! Every test drives the controller with a `ManualTimer`, so step timing is
//! checked exactly without sleeping.

use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use vib_common::capability::{Capabilities, VibratorOps};
use vib_common::config::VibLimits;
use vib_common::consts::{PACKET_FIELDS, PACKET_MAX_SIZE};
use vib_common::error::{VibError, VibResult};
use vib_common::packet::WaveformStep;
use vib_engine::controller::{Controller, ControllerBuilder, PlaybackState};
use vib_engine::drivers::simulation::{SimCall, SimulationVibrator};
use vib_engine::notifier::{NotifyStatus, VibEvent};
use vib_engine::thermal::FixedThermal;
use vib_engine::timer::ManualTimer;

const RESET: [SimCall; 4] = [
    SimCall::Enable(false),
    SimCall::Overdrive(false),
    SimCall::Frequency(0),
    SimCall::Intensity(0),
];

struct Rig {
    ctl: Controller,
    sim: Arc<SimulationVibrator>,
    timer: ManualTimer,
    events: Arc<Mutex<Vec<(Duration, VibEvent)>>>,
}

impl Rig {
    fn new(sim: SimulationVibrator) -> Self {
        Self::with_builder(sim, ControllerBuilder::new())
    }

    fn with_builder(sim: SimulationVibrator, builder: ControllerBuilder) -> Self {
        let sim = Arc::new(sim);
        let timer = ManualTimer::new();
        let ctl = builder
            .timer(Arc::new(timer.clone()))
            .register(sim.clone())
            .unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let (sink, clock) = (Arc::clone(&events), timer.clone());
        ctl.notifier().register(Arc::new(move |ev: &VibEvent| {
            sink.lock().push((clock.now(), *ev));
            NotifyStatus::Ok
        }));

        Self {
            ctl,
            sim,
            timer,
            events,
        }
    }

    /// Fire deadlines until nothing is armed.
    fn run_to_idle(&self) {
        while self.timer.fire_next().is_some() {
            self.ctl.flush();
        }
    }

    fn event_log(&self) -> Vec<(u64, bool)> {
        self.events
            .lock()
            .iter()
            .map(|(at, ev)| (at.as_millis() as u64, ev.active))
            .collect()
    }
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

#[test]
fn test_single_shot_500ms() {
    let rig = Rig::new(SimulationVibrator::new(Capabilities::HAPTIC_ENGINE));
    rig.ctl.request_timeout(500).unwrap();

    assert_eq!(
        rig.sim.call_log(),
        vec![
            SimCall::Frequency(0),
            SimCall::Intensity(10_000),
            SimCall::Enable(true)
        ]
    );
    assert_eq!(rig.timer.deadline(), Some(ms(500)));
    assert!(rig.sim.output().enabled);

    assert!(!rig.timer.advance(ms(499)));
    assert!(rig.sim.output().enabled);
    assert!(rig.timer.advance(ms(1)));
    rig.ctl.flush();

    assert_eq!(rig.sim.call_log()[3..], RESET);
    assert_eq!(rig.event_log(), vec![(0, true), (500, false)]);

    let snap = rig.ctl.snapshot();
    assert_eq!(snap.playback, PlaybackState::Idle);
    assert_eq!(snap.output.frequency, 0);
    assert_eq!(snap.output.intensity, 0);
    assert!(!rig.timer.is_armed());
}

#[test]
fn test_two_step_packet_timeline() {
    let rig = Rig::new(SimulationVibrator::new(Capabilities::HAPTIC_ENGINE));
    rig.ctl.load_packet_str("8 100 50 10 0 200 0 10 0").unwrap();
    assert_eq!(
        rig.ctl.packet().unwrap(),
        vec![
            WaveformStep::new(100, 50, 10, false),
            WaveformStep::new(200, 0, 10, false)
        ]
    );

    rig.ctl.request_timeout(1).unwrap();
    assert_eq!(rig.ctl.playback(), PlaybackState::Packet);
    // Frequency 10 lies between the preset and haptic-engine bands.
    assert_eq!(
        rig.sim.call_log(),
        vec![
            SimCall::Overdrive(false),
            SimCall::Intensity(50),
            SimCall::Enable(true)
        ]
    );
    assert_eq!(rig.timer.deadline(), Some(ms(100)));
    rig.sim.clear_log();

    assert_eq!(rig.timer.fire_next(), Some(ms(100)));
    rig.ctl.flush();
    assert_eq!(
        rig.sim.call_log(),
        vec![
            SimCall::Overdrive(false),
            SimCall::Enable(false),
            SimCall::Intensity(0)
        ]
    );
    let snap = rig.ctl.snapshot();
    assert!(!snap.cursor.running);
    assert_eq!(snap.cursor.current_step, 1);
    assert_eq!(rig.timer.deadline(), Some(ms(300)));
    rig.sim.clear_log();

    assert_eq!(rig.timer.fire_next(), Some(ms(300)));
    rig.ctl.flush();
    assert_eq!(rig.sim.call_log(), RESET);
    assert_eq!(rig.ctl.playback(), PlaybackState::Idle);
    assert!(rig.ctl.packet().unwrap().is_empty());
    assert_eq!(
        rig.event_log(),
        vec![(0, true), (100, false), (300, false)]
    );
}

#[test]
fn test_disable_is_idempotent() {
    let rig = Rig::new(SimulationVibrator::new(Capabilities::HAPTIC_ENGINE));
    rig.ctl.request_timeout(400).unwrap();
    rig.sim.clear_log();

    rig.ctl.disable().unwrap();
    let first = rig.ctl.snapshot();
    rig.ctl.request_timeout(0).unwrap();
    let second = rig.ctl.snapshot();

    assert_eq!(first.playback, PlaybackState::Idle);
    assert_eq!(first.output, second.output);
    assert_eq!(first.cursor, second.cursor);
    let mut expected = RESET.to_vec();
    expected.extend(RESET);
    assert_eq!(rig.sim.call_log(), expected);
    assert!(rig.timer.fire_next().is_none());
}

#[test]
fn test_restart_replaces_single_shot_deadline() {
    let rig = Rig::new(SimulationVibrator::new(Capabilities::BASIC));
    rig.ctl.request_timeout(500).unwrap();
    rig.timer.advance(ms(200));
    rig.ctl.request_timeout(300).unwrap();
    assert_eq!(rig.timer.deadline(), Some(ms(500)));
    assert_eq!(rig.ctl.remaining_ms(), Ok(300));

    rig.run_to_idle();
    let disables = rig
        .sim
        .call_log()
        .into_iter()
        .filter(|c| *c == SimCall::Enable(false))
        .count();
    assert_eq!(disables, 1);
    assert_eq!(rig.timer.now(), ms(500));
}

#[test]
fn test_restart_mid_packet_replays_from_first_step() {
    let rig = Rig::new(SimulationVibrator::new(Capabilities::HAPTIC_ENGINE));
    rig.ctl
        .load_packet_str("12 100 50 1200 0 100 60 1300 0 100 70 1400 1")
        .unwrap();
    rig.ctl.request_timeout(1).unwrap();
    rig.timer.fire_next();
    rig.ctl.flush();
    assert_eq!(rig.ctl.snapshot().cursor.current_step, 1);

    rig.sim.clear_log();
    rig.ctl.request_timeout(1).unwrap();
    let snap = rig.ctl.snapshot();
    assert_eq!(snap.cursor.current_step, 0);
    assert!(snap.cursor.running);
    // Packet restarts with the actuator re-enabled for step 0.
    assert_eq!(
        rig.sim.call_log(),
        vec![
            SimCall::Overdrive(false),
            SimCall::Frequency(1200),
            SimCall::Intensity(50),
            SimCall::Enable(true)
        ]
    );

    rig.run_to_idle();
    // Two steps of the first run, then all three of the restarted one.
    assert_eq!(rig.ctl.snapshot().stats.steps_applied, 5);
    assert_eq!(rig.timer.now(), ms(400));
}

#[test]
fn test_packet_overflow_keeps_previous_packet() {
    let rig = Rig::new(SimulationVibrator::new(Capabilities::HAPTIC_ENGINE));
    rig.ctl.load_packet_str("4 100 50 1200 0").unwrap();

    let count = (PACKET_MAX_SIZE * PACKET_FIELDS + PACKET_FIELDS) as i64;
    let mut values = vec![count];
    values.extend(std::iter::repeat_n(1, count as usize));
    assert!(matches!(
        rig.ctl.load_packet_flat(&values),
        Err(VibError::InvalidArgument(_))
    ));

    let snap = rig.ctl.snapshot();
    assert!(!snap.cursor.enabled);
    assert_eq!(snap.cursor.step_count, 1);

    // Packet mode is off, so the next request is a single shot.
    rig.ctl.request_timeout(100).unwrap();
    assert_eq!(rig.ctl.playback(), PlaybackState::SingleShot);
}

#[test]
fn test_malformed_packet_rejected() {
    let rig = Rig::new(SimulationVibrator::new(Capabilities::HAPTIC_ENGINE));
    for bad in ["", "5 1 2 3 4 5", "8 100 50 10 0 200 0", "4 x 1 2 3"] {
        assert!(rig.ctl.load_packet_str(bad).is_err(), "{bad:?} accepted");
    }
    assert!(rig.ctl.packet().unwrap().is_empty());
}

#[test]
fn test_empty_packet_falls_back_to_single_shot() {
    let rig = Rig::new(SimulationVibrator::new(Capabilities::BASIC));
    rig.ctl.load_packet_flat(&[0]).unwrap();
    assert!(!rig.ctl.snapshot().cursor.enabled);
    rig.ctl.request_timeout(50).unwrap();
    assert_eq!(rig.ctl.playback(), PlaybackState::SingleShot);
}

#[test]
fn test_indexed_trigger_arms_no_timer() {
    let rig = Rig::new(SimulationVibrator::full());
    rig.ctl.set_trigger_index("5\n").unwrap();
    assert_eq!(rig.ctl.trigger_index().unwrap(), "5");

    rig.ctl.request_timeout(500).unwrap();
    assert!(!rig.timer.is_armed());
    assert_eq!(rig.ctl.remaining_ms(), Ok(0));
    assert_eq!(rig.ctl.playback(), PlaybackState::SingleShot);
    assert_eq!(rig.events.lock()[0].1.index, 5);

    rig.ctl.request_timeout(0).unwrap();
    assert_eq!(rig.ctl.snapshot().index, 0);
    assert!(matches!(
        rig.ctl.set_trigger_index("abc"),
        Err(VibError::InvalidArgument(_))
    ));
}

#[test]
fn test_indexed_trigger_unsupported_on_basic_backend() {
    let rig = Rig::new(SimulationVibrator::new(Capabilities::BASIC));
    assert_eq!(rig.ctl.set_trigger_index("3"), Err(VibError::Unsupported));
    assert_eq!(rig.ctl.snapshot().index, 0);
}

#[test]
fn test_no_notification_without_enable_capability() {
    let rig = Rig::new(SimulationVibrator::new(Capabilities::INTENSITY));
    rig.ctl.request_timeout(10).unwrap();
    rig.run_to_idle();
    assert!(rig.event_log().is_empty());
    assert_eq!(
        rig.sim.call_log(),
        vec![SimCall::Intensity(10_000), SimCall::Intensity(0)]
    );
}

#[test]
fn test_failed_enable_still_notifies() {
    let sim = SimulationVibrator::new(Capabilities::BASIC).with_failures(Capabilities::ENABLE);
    let rig = Rig::new(sim);
    rig.ctl.request_timeout(10).unwrap();
    rig.run_to_idle();
    assert_eq!(rig.event_log(), vec![(0, true), (10, false)]);
    assert!(!rig.sim.output().enabled);
}

#[test]
fn test_unsubscribed_listener_gets_nothing() {
    let rig = Rig::new(SimulationVibrator::new(Capabilities::BASIC));
    let hits = Arc::new(Mutex::new(0u32));
    let counter = Arc::clone(&hits);
    let id = rig.ctl.notifier().register(Arc::new(move |_: &VibEvent| {
        *counter.lock() += 1;
        NotifyStatus::Done
    }));

    rig.ctl.request_timeout(10).unwrap();
    rig.ctl.notifier().unregister(id).unwrap();
    rig.run_to_idle();
    assert_eq!(*hits.lock(), 1);
    assert!(rig.ctl.notifier().unregister(id).is_err());
}

#[test]
fn test_tuning_runs_before_single_shot() {
    let sim = SimulationVibrator::new(Capabilities::BASIC | Capabilities::TUNING_WITH_TEMP);
    let builder = ControllerBuilder::new().thermal(Arc::new(FixedThermal::new(36)));
    let rig = Rig::with_builder(sim, builder);

    rig.ctl.request_timeout(20).unwrap();
    assert_eq!(rig.sim.call_log()[0], SimCall::Tuning(36));

    // Packet steps do not retune.
    rig.ctl.disable().unwrap();
    rig.sim.clear_log();
    rig.ctl.load_packet_str("4 10 100 1200 0").unwrap();
    rig.ctl.request_timeout(1).unwrap();
    assert!(!rig.sim.call_log().contains(&SimCall::Tuning(36)));
}

#[test]
fn test_tuning_failure_does_not_block_playback() {
    let sim = SimulationVibrator::new(Capabilities::BASIC | Capabilities::TUNING_WITH_TEMP)
        .with_failures(Capabilities::TUNING_WITH_TEMP);
    let builder = ControllerBuilder::new().thermal(Arc::new(FixedThermal::new(36)));
    let rig = Rig::with_builder(sim, builder);

    rig.ctl.request_timeout(20).unwrap();
    assert!(rig.sim.output().enabled);
    assert_eq!(rig.timer.deadline(), Some(ms(20)));
}

#[test]
fn test_unregister_mid_run() {
    let rig = Rig::new(SimulationVibrator::new(Capabilities::HAPTIC_ENGINE));
    rig.ctl.request_timeout(500).unwrap();
    rig.ctl.unregister().unwrap();

    assert!(!rig.sim.output().enabled);
    assert!(rig.timer.fire_next().is_none());
    assert_eq!(rig.ctl.set_intensity(5), Err(VibError::NotInitialized));
    assert_eq!(rig.ctl.load_packet_str("4 1 1 1 0"), Err(VibError::NotInitialized));
    assert_eq!(rig.ctl.disable(), Err(VibError::NotInitialized));
    assert_eq!(rig.ctl.unregister(), Err(VibError::NotInitialized));
    assert!(!rig.ctl.snapshot().registered);
}

/// Backend whose frequency call blocks, keeping a step advance in flight.
struct SlowFrequency {
    sim: Arc<SimulationVibrator>,
    delay: Duration,
}

impl VibratorOps for SlowFrequency {
    fn name(&self) -> &'static str {
        "slow-frequency"
    }

    fn capabilities(&self) -> Capabilities {
        self.sim.capabilities()
    }

    fn enable(&self, on: bool) -> VibResult<()> {
        self.sim.enable(on)
    }

    fn set_intensity(&self, intensity: i32) -> VibResult<()> {
        self.sim.set_intensity(intensity)
    }

    fn set_frequency(&self, frequency: i32) -> VibResult<()> {
        thread::sleep(self.delay);
        self.sim.set_frequency(frequency)
    }

    fn set_overdrive(&self, on: bool) -> VibResult<()> {
        self.sim.set_overdrive(on)
    }
}

#[test]
fn test_stop_during_step_advance_leaves_nothing_armed() {
    let sim = Arc::new(SimulationVibrator::new(Capabilities::HAPTIC_ENGINE));
    let timer = ManualTimer::new();
    let ctl = ControllerBuilder::new()
        .timer(Arc::new(timer.clone()))
        .register(Arc::new(SlowFrequency {
            sim: Arc::clone(&sim),
            delay: ms(50),
        }))
        .unwrap();
    ctl.load_packet_str("12 100 50 1200 0 200 60 1200 0 300 70 1200 0")
        .unwrap();
    ctl.request_timeout(1).unwrap();

    // The worker re-arms for step 1 while the stop request is draining.
    assert_eq!(timer.fire_next(), Some(ms(100)));
    ctl.request_timeout(0).unwrap();

    assert_eq!(ctl.playback(), PlaybackState::Idle);
    assert!(!timer.is_armed());
    assert_eq!(ctl.remaining_ms(), Ok(0));
    assert!(!sim.output().enabled);
}

#[test]
fn test_out_of_band_step_frequency_not_applied() {
    let rig = Rig::new(SimulationVibrator::new(Capabilities::HAPTIC_ENGINE));
    rig.ctl.load_packet_str("4 100 50 600 0").unwrap();
    rig.ctl.request_timeout(1).unwrap();

    assert_eq!(
        rig.sim.call_log(),
        vec![
            SimCall::Overdrive(false),
            SimCall::Intensity(50),
            SimCall::Enable(true)
        ]
    );
    assert_eq!(rig.ctl.snapshot().output.frequency, 0);
    assert_eq!(rig.timer.deadline(), Some(ms(100)));
}

#[test]
fn test_packet_loaded_during_single_shot_switches_mode_on_expiry() {
    let rig = Rig::new(SimulationVibrator::new(Capabilities::HAPTIC_ENGINE));
    rig.ctl.request_timeout(100).unwrap();
    rig.ctl.load_packet_str("8 50 40 1200 0 50 0 1200 0").unwrap();
    assert_eq!(rig.ctl.playback(), PlaybackState::SingleShot);

    rig.timer.fire_next();
    rig.ctl.flush();
    let snap = rig.ctl.snapshot();
    assert_eq!(snap.playback, PlaybackState::Packet);
    assert_eq!(snap.cursor.current_step, 1);
    assert_eq!(rig.timer.deadline(), Some(ms(150)));

    rig.run_to_idle();
    assert_eq!(rig.ctl.playback(), PlaybackState::Idle);
}

fn arb_step() -> impl Strategy<Value = WaveformStep> {
    (
        0u32..500,
        prop_oneof![Just(0i32), -10_000i32..=10_000],
        0i32..4_000,
        any::<bool>(),
    )
        .prop_map(|(t, i, f, o)| WaveformStep::new(t, i, f, o))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Each step is applied once, in order, and the run lasts exactly the
    /// sum of the step durations.
    #[test]
    fn packet_steps_apply_in_order(steps in proptest::collection::vec(arb_step(), 1..24)) {
        let rig = Rig::new(SimulationVibrator::new(Capabilities::HAPTIC_ENGINE));
        let mut values = vec![(steps.len() * PACKET_FIELDS) as i64];
        for s in &steps {
            values.extend([
                i64::from(s.time_ms),
                i64::from(s.intensity),
                i64::from(s.frequency),
                i64::from(s.overdrive),
            ]);
        }
        rig.ctl.load_packet_flat(&values).unwrap();
        rig.ctl.request_timeout(1).unwrap();
        rig.run_to_idle();

        let total: u64 = steps.iter().map(|s| u64::from(s.time_ms)).sum();
        prop_assert_eq!(rig.timer.now(), ms(total));
        prop_assert_eq!(rig.ctl.snapshot().stats.steps_applied, steps.len() as u64);
        prop_assert_eq!(rig.ctl.playback(), PlaybackState::Idle);

        let log = rig.sim.call_log();
        let frequencies: Vec<i32> = log
            .iter()
            .filter_map(|c| match c {
                SimCall::Frequency(f) => Some(*f),
                _ => None,
            })
            .collect();
        let domain = VibLimits::default().frequency;
        let mut expected: Vec<i32> = steps
            .iter()
            .map(|s| s.frequency)
            .filter(|f| domain.contains(*f))
            .collect();
        expected.push(0);
        prop_assert_eq!(frequencies, expected);

        // Enable only toggles on polarity changes; the final reset may repeat `false`.
        let enables: Vec<bool> = log
            .iter()
            .filter_map(|c| match c {
                SimCall::Enable(on) => Some(*on),
                _ => None,
            })
            .collect();
        let (last, during) = enables.split_last().unwrap();
        prop_assert!(!*last);
        prop_assert!(during.first().is_none_or(|first| *first));
        prop_assert!(during.windows(2).all(|w| w[0] != w[1]));
    }
}
