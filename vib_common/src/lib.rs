//! Vibrator Common Library
//!
//! Shared constants, configuration and types for the vibrator sequencing
//! engine and the backends it drives.
//!
//! # Module Structure
//!
//! - [`consts`] - Capacities and default limits
//! - [`config`] - Configuration loading traits and types
//! - [`error`] - Error taxonomy shared by controller and backends
//! - [`capability`] - Capability Set trait and capability flags
//! - [`packet`] - Waveform steps, packet store and the bulk load format
//! - [`event`] - Device event commands
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use vib_common::prelude::*;
//!
//! let packet = PacketStore::parse("8 100 50 10 0 200 0 10 0").unwrap();
//! assert_eq!(packet.len(), 2);
//! ```

pub mod capability;
pub mod config;
pub mod consts;
pub mod error;
pub mod event;
pub mod packet;
pub mod prelude;
