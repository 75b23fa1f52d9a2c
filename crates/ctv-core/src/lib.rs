//! Cast-to-TV core - command contract and capture lifecycle.
//!
//! This crate implements:
//! - Typed channel commands and replies
//! - Command dispatch over an injected handler
//! - The capture session state machine
//! - Platform traits for permission, capture and transport
//! - Configuration
//! - A simulated platform for tests and demos

#![forbid(unsafe_code)]

// Channel contract
pub mod command;
pub mod reply;
pub mod dispatch;
pub mod handler;

// Capture lifecycle
pub mod session;
pub mod platform;

// Supporting modules
pub mod config;
pub mod errors;
pub mod harness;

#[cfg(test)]
mod proptests;

pub use command::{Command, MethodCall, StartScreenMirroringRequest, CHANNEL_NAME};
pub use dispatch::Dispatcher;
pub use errors::CastError;
pub use handler::{CastHandler, PlaceholderHandler, SessionHandler};
pub use reply::MethodResult;
pub use session::{CaptureSession, CaptureState, SessionPlatform};
