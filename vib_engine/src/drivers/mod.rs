//! Vibrator backend implementations.
//!
//! - [`simulation`] - In-memory backend for development and testing
//!
//! # Adding New Backends
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement `VibratorOps` from `vib_common::capability`
//! 3. Register a factory in [`register_all_drivers`]

pub mod simulation;

use crate::driver_registry::DriverRegistry;

/// Register all built-in backends.
pub fn register_all_drivers(registry: &mut DriverRegistry) {
    registry.register("simulation", simulation::create_driver);
    registry.register("simulation-basic", simulation::create_basic_driver);
}
