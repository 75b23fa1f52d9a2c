//! Error types for cast-to-TV core.
//!
//! Every failure that can reach the channel boundary is a [`CastError`].
//! Each variant maps to a stable, machine-readable code so the UI layer can
//! render feedback without parsing messages.

use serde_json::{json, Value};
use thiserror::Error;

// ============================================================================
// Wire error codes
// ============================================================================

/// Machine-readable error codes carried in error replies.
pub mod codes {
    pub const NOT_IMPLEMENTED: &str = "NOT_IMPLEMENTED";
    pub const INVALID_ARGUMENT: &str = "INVALID_ARGUMENT";
    pub const ALREADY_ACTIVE: &str = "ALREADY_ACTIVE";
    pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
    pub const CAPTURE_START_FAILED: &str = "CAPTURE_START_FAILED";
    pub const TRANSPORT_ERROR: &str = "TRANSPORT_ERROR";
    pub const DEVICE_UNREACHABLE: &str = "DEVICE_UNREACHABLE";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const CANCELLED: &str = "CANCELLED";
    pub const INTERNAL: &str = "INTERNAL";
}

// ============================================================================
// Cast Error
// ============================================================================

/// Errors produced by command parsing, handlers and the capture session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CastError {
    /// Method name is not part of the command set
    #[error("method not implemented: {0}")]
    UnknownCommand(String),

    /// Arguments failed boundary validation
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A mirroring session is already running
    #[error("a mirroring session is already active")]
    AlreadyActive,

    /// User or platform refused screen capture
    #[error("screen capture permission denied")]
    PermissionDenied,

    /// Capture backend could not start
    #[error("screen capture failed to start: {0}")]
    CaptureStartFailed(String),

    /// Transport failed after the receiver was reached
    #[error("transport error: {0}")]
    TransportError(String),

    /// Receiver could not be reached
    #[error("receiver unreachable: {0}")]
    DeviceUnreachable(String),

    /// A setup step exceeded its configured deadline
    #[error("timed out waiting for {0}")]
    Timeout(String),

    /// Operation was cancelled by a stop request
    #[error("operation cancelled")]
    Cancelled,

    /// Unexpected internal failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl CastError {
    /// Stable wire code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            CastError::UnknownCommand(_) => codes::NOT_IMPLEMENTED,
            CastError::InvalidArgument(_) => codes::INVALID_ARGUMENT,
            CastError::AlreadyActive => codes::ALREADY_ACTIVE,
            CastError::PermissionDenied => codes::PERMISSION_DENIED,
            CastError::CaptureStartFailed(_) => codes::CAPTURE_START_FAILED,
            CastError::TransportError(_) => codes::TRANSPORT_ERROR,
            CastError::DeviceUnreachable(_) => codes::DEVICE_UNREACHABLE,
            CastError::Timeout(_) => codes::TIMEOUT,
            CastError::Cancelled => codes::CANCELLED,
            CastError::Internal(_) => codes::INTERNAL,
        }
    }

    /// Structured details attached to the error reply, if any.
    pub fn details(&self) -> Value {
        match self {
            CastError::UnknownCommand(method) => json!({ "method": method }),
            CastError::DeviceUnreachable(device_id) => json!({ "deviceId": device_id }),
            CastError::Timeout(step) => json!({ "step": step }),
            _ => Value::Null,
        }
    }

    /// Whether the error came from the caller rather than the platform.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            CastError::UnknownCommand(_) | CastError::InvalidArgument(_) | CastError::AlreadyActive
        )
    }
}

impl From<serde_json::Error> for CastError {
    fn from(e: serde_json::Error) -> Self {
        CastError::InvalidArgument(e.to_string())
    }
}

impl From<tokio::task::JoinError> for CastError {
    fn from(e: tokio::task::JoinError) -> Self {
        CastError::Internal(format!("session task failed: {}", e))
    }
}
