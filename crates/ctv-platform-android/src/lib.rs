//! Cast-to-TV Platform Android - native side of the casting method channel
//!
//! This crate exposes the cast-to-TV command contract to the Android host
//! over JNI. The host forwards each channel call as a JSON message and
//! gets back exactly one reply envelope.

mod codec;
mod core;
mod error;
mod logging;

// Re-export main types
pub use crate::codec::{decode_method_call, decode_reply, encode_method_call, encode_reply};
pub use crate::core::BridgeCore;
pub use crate::error::BridgeError;
pub use crate::logging::init as init_logging;

// JNI bindings - only compile on Android targets
#[cfg(target_os = "android")]
mod jni_bindings;
