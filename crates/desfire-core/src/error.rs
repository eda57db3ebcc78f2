//! Core error type for transport-level operations.

use crate::transport::error::TransportError;

/// Result alias used throughout the crate
pub type Result<T> = core::result::Result<T, Error>;

/// Core error type for the transport-agnostic APDU plumbing layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Other error with message
    #[error("{0}")]
    Message(String),
}

impl Error {
    /// Create a new error with a dynamic message
    pub fn message<S: Into<String>>(message: S) -> Self {
        Self::Message(message.into())
    }
}
