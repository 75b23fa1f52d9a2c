//! Platform abstraction for screen capture and casting.
//!
//! The session engine never talks to an OS API directly. It drives these
//! traits, and each platform (or the simulated harness) supplies them.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CastError;

/// Target display device for a mirroring session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receiver {
    pub id: String,
    pub name: Option<String>,
}

impl Receiver {
    /// Label for logs: the name when known, otherwise the id.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Proof that screen capture was allowed by the user/platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGrant {
    pub id: u64,
    pub granted_at: DateTime<Utc>,
}

/// Capture parameters handed to the capturer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            target_fps: 30,
            width: 1280,
            height: 720,
        }
    }
}

/// One captured frame. The payload is opaque to the session engine.
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    /// Capture time in milliseconds since the Unix epoch
    pub timestamp_ms: i64,
}

impl CaptureFrame {
    pub fn new(data: Bytes, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ms: Utc::now().timestamp_millis(),
        }
    }
}

#[async_trait]
pub trait PermissionBroker: Send + Sync {
    /// Ask for screen-capture permission. May wait on user interaction.
    async fn request_capture_permission(&self) -> Result<PermissionGrant, CastError>;
    /// Give a grant back to the platform.
    async fn revoke(&self, grant: PermissionGrant) -> Result<(), CastError>;
}

#[async_trait]
pub trait ScreenCapturer: Send + Sync {
    async fn start(
        &self,
        grant: &PermissionGrant,
        settings: &CaptureSettings,
    ) -> Result<Box<dyn CaptureStream>, CastError>;
}

#[async_trait]
pub trait CaptureStream: Send {
    /// Next frame, or `None` once the stream has ended.
    async fn next_frame(&mut self) -> Result<Option<CaptureFrame>, CastError>;
    async fn stop(&mut self) -> Result<(), CastError>;
}

#[async_trait]
pub trait CastTransport: Send + Sync {
    async fn connect(&self, receiver: &Receiver) -> Result<Box<dyn TransportSession>, CastError>;
}

#[async_trait]
pub trait TransportSession: Send {
    fn receiver(&self) -> &Receiver;
    async fn send_frame(&mut self, frame: CaptureFrame) -> Result<(), CastError>;
    async fn disconnect(&mut self) -> Result<(), CastError>;
}
