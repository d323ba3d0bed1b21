//! Error types for the aquanet receiver.
//!
//! All errors implement the `std::error::Error` trait and carry structured
//! context. The taxonomy mirrors the containment policy of the server:
//!
//! - **Bind**: the listener could not acquire its port. Fatal to `start`,
//!   surfaced to the caller, never retried internally.
//! - **FrameLength / FrameField**: a malformed or unsupported frame. Local to
//!   the frame; the connection handler drops the frame and keeps reading.
//! - **Connection**: I/O failure on an inbound socket. Closes only the
//!   affected connection.
//! - **Forward**: outbound mirror failure. Contained in the forwarder and
//!   recovered via backoff reconnect, never escalated to the inbound path.
//!
//! ```rust
//! use aquanet::AquanetError;
//!
//! let error = AquanetError::frame_length(120, 64);
//! assert!(!error.is_retryable());
//! ```

use thiserror::Error;

/// Result type alias for aquanet operations.
pub type Result<T, E = AquanetError> = std::result::Result<T, E>;

/// Main error type for the receiver, decoder and forwarder.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AquanetError {
    #[error("failed to bind listener on {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connection error: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("invalid frame length: expected {expected} bytes, got {actual}")]
    FrameLength { expected: usize, actual: usize },

    #[error("invalid frame field '{field}': {details}")]
    FrameField { field: &'static str, details: String },

    #[error("forwarding failed: {reason}")]
    Forward {
        reason: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("invalid configuration: {details}")]
    Config { details: String },
}

impl AquanetError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            AquanetError::Connection { .. } => true,
            AquanetError::Forward { .. } => true,
            AquanetError::Bind { .. } => false,
            AquanetError::FrameLength { .. } => false,
            AquanetError::FrameField { .. } => false,
            AquanetError::Config { .. } => false,
        }
    }

    /// Returns whether this error is local to a single frame.
    ///
    /// Frame-local errors are recovered by discarding the offending frame
    /// and keeping the connection open.
    pub fn is_frame_local(&self) -> bool {
        matches!(self, AquanetError::FrameLength { .. } | AquanetError::FrameField { .. })
    }

    /// Helper constructor for listener bind failures.
    pub fn bind_failed(addr: impl Into<String>, source: std::io::Error) -> Self {
        AquanetError::Bind { addr: addr.into(), source }
    }

    /// Helper constructor for inbound connection failures.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        AquanetError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for inbound connection failures with an I/O source.
    pub fn connection_failed_with_source(reason: impl Into<String>, source: std::io::Error) -> Self {
        AquanetError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for frame length mismatches.
    pub fn frame_length(expected: usize, actual: usize) -> Self {
        AquanetError::FrameLength { expected, actual }
    }

    /// Helper constructor for out-of-range or unsupported frame fields.
    pub fn frame_field(field: &'static str, details: impl Into<String>) -> Self {
        AquanetError::FrameField { field, details: details.into() }
    }

    /// Helper constructor for forwarding failures.
    pub fn forward_failed(reason: impl Into<String>, source: Option<std::io::Error>) -> Self {
        AquanetError::Forward { reason: reason.into(), source }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        AquanetError::Config { details: details.into() }
    }
}

impl From<serde_yaml_ng::Error> for AquanetError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        AquanetError::Config { details: err.to_string() }
    }
}
