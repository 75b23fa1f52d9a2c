//! Error types for the Android bridge

use thiserror::Error;

use ctv_core::config::ConfigError;
use ctv_core::CastError;

/// Bridge-level errors. Command failures never use this type; they travel
/// back to the caller as error replies.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("JNI error: {0}")]
    Jni(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        BridgeError::Codec(format!("JSON error: {}", e))
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(e: std::io::Error) -> Self {
        BridgeError::Runtime(e.to_string())
    }
}

#[cfg(target_os = "android")]
impl From<jni::errors::Error> for BridgeError {
    fn from(e: jni::errors::Error) -> Self {
        BridgeError::Jni(e.to_string())
    }
}

impl From<BridgeError> for CastError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::Codec(msg) | BridgeError::InvalidParameter(msg) => {
                CastError::InvalidArgument(msg)
            }
            other => CastError::Internal(other.to_string()),
        }
    }
}
