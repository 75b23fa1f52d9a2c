//! Replies returned across the channel boundary.

use serde_json::Value;

use crate::errors::CastError;

/// The single reply produced for every method call.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResult {
    /// Call succeeded; `Value::Null` means success with no payload
    Success(Value),
    /// Call failed with a structured error
    Error {
        code: String,
        message: String,
        details: Value,
    },
    /// Method is not supported on this platform/version
    NotImplemented,
}

impl MethodResult {
    /// Success with no payload.
    pub fn empty() -> Self {
        MethodResult::Success(Value::Null)
    }

    /// Build the reply for a failed call.
    ///
    /// Unknown commands surface as [`MethodResult::NotImplemented`], never as
    /// a generic error.
    pub fn from_error(err: &CastError) -> Self {
        match err {
            CastError::UnknownCommand(_) => MethodResult::NotImplemented,
            other => MethodResult::Error {
                code: other.code().to_string(),
                message: other.to_string(),
                details: other.details(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, MethodResult::Success(_))
    }

    pub fn is_not_implemented(&self) -> bool {
        matches!(self, MethodResult::NotImplemented)
    }

    /// Error code, if this is an error reply.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            MethodResult::Error { code, .. } => Some(code),
            _ => None,
        }
    }
}
