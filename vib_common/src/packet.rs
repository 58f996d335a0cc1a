//! Waveform steps and the fixed-capacity packet store.
//!
//! A packet is loaded in one piece from the bulk format: a flat integer
//! sequence `count, t0, i0, f0, o0, t1, i1, f1, o1, ...` where `count` is
//! the number of integers that follow (four per step). Loads are all or
//! nothing: any malformed group rejects the whole packet.

use crate::config::VibLimits;
use crate::consts::{PACKET_FIELDS, PACKET_MAX_SIZE};
use crate::error::{VibError, VibResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WaveformStep {
    /// How long this step lasts before the next one is applied.
    pub time_ms: u32,
    /// Intensity; zero releases the actuator.
    pub intensity: i32,
    /// Frequency for this step.
    pub frequency: i32,
    /// Overdrive flag.
    pub overdrive: bool,
}

impl WaveformStep {
    /// Construct a step.
    pub const fn new(time_ms: u32, intensity: i32, frequency: i32, overdrive: bool) -> Self {
        Self {
            time_ms,
            intensity,
            frequency,
            overdrive,
        }
    }

    /// Build a step from one four-integer group of the bulk format.
    fn from_group(index: usize, group: &[i64]) -> VibResult<Self> {
        let [time, intensity, frequency, overdrive] = group else {
            return Err(VibError::invalid(format!(
                "packet step {index}: expected {PACKET_FIELDS} fields, got {}",
                group.len()
            )));
        };

        let time_ms = u32::try_from(*time).map_err(|_| {
            VibError::invalid(format!("packet step {index}: time {time} out of range"))
        })?;
        let intensity = i32::try_from(*intensity).map_err(|_| {
            VibError::invalid(format!(
                "packet step {index}: intensity {intensity} out of range"
            ))
        })?;
        let frequency = i32::try_from(*frequency).map_err(|_| {
            VibError::invalid(format!(
                "packet step {index}: frequency {frequency} out of range"
            ))
        })?;

        Ok(Self::new(time_ms, intensity, frequency, *overdrive != 0))
    }
}

/// Ordered, fixed-capacity sequence of steps. Replaced wholesale, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PacketStore {
    steps: heapless::Vec<WaveformStep, PACKET_MAX_SIZE>,
}

impl PacketStore {
    /// An empty store.
    pub const fn new() -> Self {
        Self {
            steps: heapless::Vec::new(),
        }
    }

    /// Build a store from explicit steps.
    ///
    /// # Errors
    /// `InvalidArgument` if more than [`PACKET_MAX_SIZE`] steps are given.
    pub fn from_steps(steps: &[WaveformStep]) -> VibResult<Self> {
        if steps.len() > PACKET_MAX_SIZE {
            return Err(VibError::invalid(format!(
                "packet size over: {} steps (max {PACKET_MAX_SIZE})",
                steps.len()
            )));
        }
        let mut store = Self::new();
        for step in steps {
            store
                .steps
                .push(*step)
                .map_err(|_| VibError::invalid("packet store full"))?;
        }
        Ok(store)
    }

    /// Decode the flat bulk format (`count` first, then `count` integers).
    ///
    /// Integers after the declared `count` are ignored.
    ///
    /// # Errors
    /// `InvalidArgument` if `count` is negative, exceeds
    /// `PACKET_MAX_SIZE * PACKET_FIELDS`, is not a multiple of
    /// [`PACKET_FIELDS`], or if fewer than `count` integers follow.
    pub fn from_flat(values: &[i64]) -> VibResult<Self> {
        let Some((&count, rest)) = values.split_first() else {
            return Err(VibError::invalid("packet is empty"));
        };

        let max = (PACKET_MAX_SIZE * PACKET_FIELDS) as i64;
        if count < 0 || count > max {
            return Err(VibError::invalid(format!(
                "packet size over: {count} (max {max})"
            )));
        }
        let count = count as usize;
        if count % PACKET_FIELDS != 0 {
            return Err(VibError::invalid(format!(
                "packet count {count} is not a multiple of {PACKET_FIELDS}"
            )));
        }
        if rest.len() < count {
            return Err(VibError::invalid(format!(
                "packet declares {count} values but only {} follow",
                rest.len()
            )));
        }

        let mut store = Self::new();
        for (index, group) in rest[..count].chunks(PACKET_FIELDS).enumerate() {
            let step = WaveformStep::from_group(index, group)?;
            store
                .steps
                .push(step)
                .map_err(|_| VibError::invalid("packet store full"))?;
        }
        Ok(store)
    }

    /// Tokenize and decode the textual bulk format.
    ///
    /// Tokens may be separated by whitespace or commas.
    pub fn parse(text: &str) -> VibResult<Self> {
        let values = text
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|tok| !tok.is_empty())
            .map(|tok| {
                tok.parse::<i64>()
                    .map_err(|_| VibError::invalid(format!("packet data error at '{tok}'")))
            })
            .collect::<VibResult<Vec<i64>>>()?;
        Self::from_flat(&values)
    }

    /// Check every step intensity against the controller limits.
    ///
    /// Step frequencies are not checked here. Out-of-band values are skipped
    /// when the step is applied, so the rest of the step still plays.
    pub fn validate(&self, limits: &VibLimits) -> VibResult<()> {
        for (index, step) in self.steps.iter().enumerate() {
            if !limits.intensity_in_range(step.intensity) {
                return Err(VibError::invalid(format!(
                    "packet step {index}: intensity {} out of range",
                    step.intensity
                )));
            }
        }
        Ok(())
    }

    /// Number of steps.
    #[inline]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True if no steps are stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&WaveformStep> {
        self.steps.get(index)
    }

    /// All steps in order.
    #[inline]
    pub fn as_slice(&self) -> &[WaveformStep] {
        &self.steps
    }

    /// Sum of all step durations.
    pub fn total_duration_ms(&self) -> u64 {
        self.steps.iter().map(|s| u64::from(s.time_ms)).sum()
    }
}

impl fmt::Display for PacketStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            write!(
                f,
                "{},{},{},{},",
                step.time_ms,
                step.intensity,
                step.frequency,
                u8::from(step.overdrive)
            )?;
        }
        Ok(())
    }
}
