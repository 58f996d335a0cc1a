//! # Vibrator Sequencing Engine
//!
//! Turns "vibrate for N ms" and "play this waveform packet" requests into a
//! time-ordered series of backend calls, using one one-shot timer and one
//! serialized worker.
//!
//! Backends implement the `VibratorOps` trait defined in
//! `vib_common::capability`.
//!
//! # Module Structure
//!
//! - [`controller`] - Sequencing engine, playback state machine
//! - [`timer`] - One-shot deadline sources (thread and virtual clock)
//! - [`worker`] - Single-slot serialized worker
//! - [`notifier`] - Enable/disable subscriber chain
//! - [`thermal`] - Temperature source for actuator tuning
//! - [`driver_registry`] - Backend factory registration
//! - [`drivers`] - Backend implementations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        vib_engine                                │
//! │  ┌─────────────┐  start  ┌──────────────┐  queue  ┌───────────┐  │
//! │  │  Controller │────────►│ OneShotTimer │────────►│  Worker   │  │
//! │  │ (state lock)│◄────────┼──────────────┼─────────│ (1 slot)  │  │
//! │  └──────┬──────┘        advance_step(token)       └───────────┘  │
//! │         │                                                        │
//! │         ├──────────────► NotifierChain (ON/OFF events)           │
//! │         ▼                                                        │
//! │  ┌────────────────┐                                              │
//! │  │  VibratorOps   │ (trait object, from DriverRegistry)          │
//! │  └────────────────┘                                              │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod controller;
pub mod driver_registry;
pub mod drivers;
pub mod notifier;
pub mod thermal;
pub mod timer;
pub mod worker;

// Re-export key types for convenience
pub use crate::controller::{Controller, ControllerBuilder, EngineSnapshot, PlaybackState};
pub use crate::driver_registry::DriverRegistry;
pub use crate::notifier::{NotifierChain, NotifyStatus, VibEvent};
pub use crate::timer::{ManualTimer, OneShotTimer, ThreadTimer};
