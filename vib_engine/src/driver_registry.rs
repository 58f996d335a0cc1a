//! Driver registry for vibrator backends.
//!
//! Provides a `DriverRegistry` struct for registering and retrieving backend
//! factories. This uses constructor-injection rather than global state.

use std::collections::HashMap;
use std::sync::Arc;
use vib_common::capability::{DriverFactory, VibratorOps};
use vib_common::error::{VibError, VibResult};

/// Registry of available vibrator backends.
///
/// Constructed at startup, populated via `register()`, and consulted once to
/// build the backend handed to the controller.
pub struct DriverRegistry {
    factories: HashMap<&'static str, DriverFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry holding every built-in backend.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        crate::drivers::register_all_drivers(&mut registry);
        registry
    }

    /// Register a backend factory.
    ///
    /// # Panics
    /// Panics if a backend with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: DriverFactory) {
        if self.factories.contains_key(name) {
            panic!("Driver '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Get a backend factory by name.
    pub fn get_factory(&self, name: &str) -> Option<DriverFactory> {
        self.factories.get(name).copied()
    }

    /// Create a backend instance by name.
    ///
    /// # Errors
    /// Returns `VibError::InitFailed` if no backend with the given name is registered.
    pub fn create_driver(&self, name: &str) -> VibResult<Arc<dyn VibratorOps>> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| VibError::InitFailed(format!("driver '{name}' not found")))?;
        Ok(factory())
    }

    /// List all registered backend names, sorted.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
