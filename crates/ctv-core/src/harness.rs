//! Simulated platform for tests and the demo CLI.
//!
//! Every backend counts the resources it has handed out and not yet had
//! back, so callers can check that a session released everything.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tracing::debug;

use crate::errors::CastError;
use crate::platform::{
    CaptureFrame, CaptureSettings, CaptureStream, CastTransport, PermissionBroker,
    PermissionGrant, Receiver, ScreenCapturer, TransportSession,
};
use crate::session::SessionPlatform;

/// How the simulated permission prompt answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionBehavior {
    Grant,
    GrantAfter(Duration),
    Deny,
    /// Never answers, like a prompt the user ignores
    Hang,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportBehavior {
    Connect,
    ConnectAfter(Duration),
    Unreachable,
    /// Connects, then fails every frame send
    FailOnSend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureBehavior {
    /// Produce frames at the target fps; `limit` ends the stream
    Frames { limit: Option<u64> },
    /// Produce unlimited frames, but only after `delay`
    StartAfter(Duration),
    FailToStart,
}

/// Live resource counts across the simulated platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub grants: usize,
    pub streams: usize,
    pub links: usize,
}

impl ResourceCounts {
    pub fn is_clear(&self) -> bool {
        self.grants == 0 && self.streams == 0 && self.links == 0
    }
}

// ============================================================================
// Permission broker
// ============================================================================

pub struct SimulatedPermissionBroker {
    behavior: PermissionBehavior,
    next_id: AtomicU64,
    live: AtomicUsize,
    revoked: AtomicUsize,
}

impl SimulatedPermissionBroker {
    pub fn new(behavior: PermissionBehavior) -> Self {
        Self {
            behavior,
            next_id: AtomicU64::new(1),
            live: AtomicUsize::new(0),
            revoked: AtomicUsize::new(0),
        }
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn revoked(&self) -> usize {
        self.revoked.load(Ordering::SeqCst)
    }

    fn grant(&self) -> PermissionGrant {
        self.live.fetch_add(1, Ordering::SeqCst);
        PermissionGrant {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            granted_at: Utc::now(),
        }
    }
}

#[async_trait]
impl PermissionBroker for SimulatedPermissionBroker {
    async fn request_capture_permission(&self) -> Result<PermissionGrant, CastError> {
        match self.behavior {
            PermissionBehavior::Grant => Ok(self.grant()),
            PermissionBehavior::GrantAfter(delay) => {
                tokio::time::sleep(delay).await;
                Ok(self.grant())
            }
            PermissionBehavior::Deny => Err(CastError::PermissionDenied),
            PermissionBehavior::Hang => std::future::pending().await,
        }
    }

    async fn revoke(&self, grant: PermissionGrant) -> Result<(), CastError> {
        debug!("revoking simulated grant {}", grant.id);
        self.live.fetch_sub(1, Ordering::SeqCst);
        self.revoked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Capturer
// ============================================================================

pub struct SimulatedCapturer {
    behavior: CaptureBehavior,
    live: Arc<AtomicUsize>,
}

impl SimulatedCapturer {
    pub fn new(behavior: CaptureBehavior) -> Self {
        Self {
            behavior,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScreenCapturer for SimulatedCapturer {
    async fn start(
        &self,
        grant: &PermissionGrant,
        settings: &CaptureSettings,
    ) -> Result<Box<dyn CaptureStream>, CastError> {
        let limit = match self.behavior {
            CaptureBehavior::FailToStart => {
                return Err(CastError::CaptureStartFailed(
                    "simulated display unavailable".into(),
                ))
            }
            CaptureBehavior::Frames { limit } => limit,
            CaptureBehavior::StartAfter(delay) => {
                tokio::time::sleep(delay).await;
                None
            }
        };

        debug!("simulated capture started under grant {}", grant.id);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimulatedStream {
            settings: *settings,
            limit,
            produced: 0,
            live: self.live.clone(),
            stopped: false,
        }))
    }
}

struct SimulatedStream {
    settings: CaptureSettings,
    limit: Option<u64>,
    produced: u64,
    live: Arc<AtomicUsize>,
    stopped: bool,
}

#[async_trait]
impl CaptureStream for SimulatedStream {
    async fn next_frame(&mut self) -> Result<Option<CaptureFrame>, CastError> {
        if self.stopped || self.limit.is_some_and(|limit| self.produced >= limit) {
            return Ok(None);
        }

        let interval = Duration::from_secs(1) / self.settings.target_fps.max(1);
        tokio::time::sleep(interval).await;

        self.produced += 1;
        Ok(Some(CaptureFrame::new(
            Bytes::from(self.produced.to_be_bytes().to_vec()),
            self.settings.width,
            self.settings.height,
        )))
    }

    async fn stop(&mut self) -> Result<(), CastError> {
        if !self.stopped {
            self.stopped = true;
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

// ============================================================================
// Transport
// ============================================================================

pub struct SimulatedTransport {
    behavior: TransportBehavior,
    live: Arc<AtomicUsize>,
    disconnects: Arc<AtomicUsize>,
    frames: Arc<AtomicU64>,
}

impl SimulatedTransport {
    pub fn new(behavior: TransportBehavior) -> Self {
        Self {
            behavior,
            live: Arc::new(AtomicUsize::new(0)),
            disconnects: Arc::new(AtomicUsize::new(0)),
            frames: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Frames accepted by every link so far.
    pub fn frames_received(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }

    fn open(&self, receiver: &Receiver) -> Box<dyn TransportSession> {
        self.live.fetch_add(1, Ordering::SeqCst);
        Box::new(SimulatedLink {
            receiver: receiver.clone(),
            fail_on_send: self.behavior == TransportBehavior::FailOnSend,
            live: self.live.clone(),
            disconnects: self.disconnects.clone(),
            frames: self.frames.clone(),
            connected: true,
        })
    }
}

#[async_trait]
impl CastTransport for SimulatedTransport {
    async fn connect(&self, receiver: &Receiver) -> Result<Box<dyn TransportSession>, CastError> {
        match self.behavior {
            TransportBehavior::Connect | TransportBehavior::FailOnSend => Ok(self.open(receiver)),
            TransportBehavior::ConnectAfter(delay) => {
                tokio::time::sleep(delay).await;
                Ok(self.open(receiver))
            }
            TransportBehavior::Unreachable => Err(CastError::DeviceUnreachable(receiver.id.clone())),
        }
    }
}

struct SimulatedLink {
    receiver: Receiver,
    fail_on_send: bool,
    live: Arc<AtomicUsize>,
    disconnects: Arc<AtomicUsize>,
    frames: Arc<AtomicU64>,
    connected: bool,
}

#[async_trait]
impl TransportSession for SimulatedLink {
    fn receiver(&self) -> &Receiver {
        &self.receiver
    }

    async fn send_frame(&mut self, _frame: CaptureFrame) -> Result<(), CastError> {
        if !self.connected {
            return Err(CastError::TransportError("link closed".into()));
        }
        if self.fail_on_send {
            return Err(CastError::TransportError("simulated send failure".into()));
        }
        self.frames.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), CastError> {
        if self.connected {
            self.connected = false;
            self.live.fetch_sub(1, Ordering::SeqCst);
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

// ============================================================================
// Platform bundle
// ============================================================================

/// All three simulated backends, kept concrete so tests can inspect them.
pub struct SimulatedPlatform {
    pub permissions: Arc<SimulatedPermissionBroker>,
    pub capturer: Arc<SimulatedCapturer>,
    pub transport: Arc<SimulatedTransport>,
}

impl SimulatedPlatform {
    pub fn builder() -> SimulatedPlatformBuilder {
        SimulatedPlatformBuilder::default()
    }

    pub fn session_platform(&self) -> SessionPlatform {
        SessionPlatform {
            permissions: self.permissions.clone(),
            capturer: self.capturer.clone(),
            transport: self.transport.clone(),
        }
    }

    pub fn resources(&self) -> ResourceCounts {
        ResourceCounts {
            grants: self.permissions.live(),
            streams: self.capturer.live(),
            links: self.transport.live(),
        }
    }
}

pub struct SimulatedPlatformBuilder {
    permission: PermissionBehavior,
    transport: TransportBehavior,
    capture: CaptureBehavior,
}

impl Default for SimulatedPlatformBuilder {
    fn default() -> Self {
        Self {
            permission: PermissionBehavior::Grant,
            transport: TransportBehavior::Connect,
            capture: CaptureBehavior::Frames { limit: None },
        }
    }
}

impl SimulatedPlatformBuilder {
    pub fn permission(mut self, behavior: PermissionBehavior) -> Self {
        self.permission = behavior;
        self
    }

    pub fn transport(mut self, behavior: TransportBehavior) -> Self {
        self.transport = behavior;
        self
    }

    pub fn capture(mut self, behavior: CaptureBehavior) -> Self {
        self.capture = behavior;
        self
    }

    pub fn build(self) -> SimulatedPlatform {
        SimulatedPlatform {
            permissions: Arc::new(SimulatedPermissionBroker::new(self.permission)),
            capturer: Arc::new(SimulatedCapturer::new(self.capture)),
            transport: Arc::new(SimulatedTransport::new(self.transport)),
        }
    }
}
