//! Simulation backend.
//!
//! Records every call it receives and keeps the resulting actuator state,
//! so the engine can run without hardware and tests can assert on the exact
//! call sequence.

mod driver;
mod state;

pub use driver::{Calibration, SimulationVibrator};
pub use state::{SimCall, SimOutput};

use std::sync::Arc;
use vib_common::capability::{Capabilities, VibratorOps};

/// Factory for a full-featured haptic-engine simulation.
pub fn create_driver() -> Arc<dyn VibratorOps> {
    Arc::new(SimulationVibrator::full())
}

/// Factory for an enable/intensity-only simulation.
pub fn create_basic_driver() -> Arc<dyn VibratorOps> {
    Arc::new(SimulationVibrator::new(Capabilities::BASIC))
}
