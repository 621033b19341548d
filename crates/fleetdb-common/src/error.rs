//! Error types for FleetDB
//!
//! This module defines the closed error taxonomy shared by every store
//! backend. Backend-specific failures (SDK error codes, I/O errors) are
//! translated into these kinds at the backend boundary and never leak
//! past the store facade.

use thiserror::Error;

/// Common result type for FleetDB store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for FleetDB store operations
#[derive(Debug, Error)]
pub enum Error {
    /// The key has no current record.
    #[error("record not found")]
    RecordNotFound,

    /// Create found a differing existing record, or the update's expected
    /// prior snapshot no longer matches the current one. Callers re-read
    /// and retry, or surface the conflict to their own caller.
    #[error("conditional check failed")]
    ConditionalCheckFailed,

    /// The caller attempted to change an immutable field, or supplied a
    /// malformed key.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The caller-supplied deadline elapsed before durable I/O was issued.
    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// Checksum mismatch, corrupted on-disk snapshot, or any invariant
    /// violation not attributable to caller input.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this is the not-found kind
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound)
    }

    /// Check if this is the CAS conflict kind
    #[must_use]
    pub fn is_conditional_check_failed(&self) -> bool {
        matches!(self, Self::ConditionalCheckFailed)
    }

    /// Routine outcomes the control plane's state machines handle as part
    /// of normal operation, as opposed to kinds that indicate a bug.
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::RecordNotFound | Self::ConditionalCheckFailed)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Internal(format!("i/o error: {e}"))
    }
}
