//! Error types for vibrator operations.
//!
//! `Unsupported` is a feature-negation signal, not a failure: it is what a
//! caller gets back when the bound backend lacks the capability an
//! operation needs.

use thiserror::Error;

/// Error type for controller and capability-set operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VibError {
    /// The backend does not provide the capability this operation needs.
    #[error("Operation not supported by backend")]
    Unsupported,

    /// Input rejected before any hardware call was attempted.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The backend operation itself failed.
    #[error("Backend failure: {0}")]
    BackendFailure(String),

    /// No backend is bound to the controller.
    #[error("Controller not initialized")]
    NotInitialized,

    /// Registration could not complete (thread spawn, config).
    #[error("Initialization failed: {0}")]
    InitFailed(String),
}

impl VibError {
    /// Shorthand for an [`VibError::InvalidArgument`] with a formatted message.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Shorthand for a [`VibError::BackendFailure`] with a formatted message.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::BackendFailure(msg.into())
    }

    /// Returns true for the capability-absent signal.
    #[inline]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported)
    }
}

/// Result alias used across the workspace.
pub type VibResult<T> = Result<T, VibError>;
