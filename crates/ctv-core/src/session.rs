//! Capture session state machine.
//!
//! A session walks `Idle -> RequestingPermission -> Capturing -> Stopping ->
//! Idle`. Setup and frame pumping run on a spawned task so callers never
//! block on the platform. `stop()` cancels that task at any point and only
//! returns once every resource the task acquired has been released.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::errors::CastError;
use crate::platform::{
    CaptureSettings, CaptureStream, CastTransport, PermissionBroker, PermissionGrant, Receiver,
    ScreenCapturer, TransportSession,
};

// ============================================================================
// State
// ============================================================================

/// Lifecycle state of the capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureState {
    /// No session; nothing held
    Idle,
    /// Waiting on permission, transport and capture setup
    RequestingPermission { receiver: Receiver },
    /// Frames are flowing to the receiver
    Capturing {
        receiver: Receiver,
        started_at: DateTime<Utc>,
    },
    /// Teardown in progress
    Stopping,
}

impl CaptureState {
    pub fn name(&self) -> &'static str {
        match self {
            CaptureState::Idle => "idle",
            CaptureState::RequestingPermission { .. } => "requesting_permission",
            CaptureState::Capturing { .. } => "capturing",
            CaptureState::Stopping => "stopping",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, CaptureState::Idle)
    }

    pub fn receiver(&self) -> Option<&Receiver> {
        match self {
            CaptureState::RequestingPermission { receiver }
            | CaptureState::Capturing { receiver, .. } => Some(receiver),
            _ => None,
        }
    }
}

// ============================================================================
// Platform bundle
// ============================================================================

/// The platform services a session drives.
#[derive(Clone)]
pub struct SessionPlatform {
    pub permissions: Arc<dyn PermissionBroker>,
    pub capturer: Arc<dyn ScreenCapturer>,
    pub transport: Arc<dyn CastTransport>,
}

/// Shared between the session handle and its background task.
#[derive(Clone)]
struct SessionContext {
    platform: SessionPlatform,
    capture: CaptureSettings,
    timeouts: SessionConfig,
    state_tx: Arc<watch::Sender<CaptureState>>,
    last_error: Arc<Mutex<Option<CastError>>>,
    frames_sent: Arc<AtomicU64>,
}

struct RunningTask {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Resources acquired by a session task, released in reverse order.
#[derive(Default)]
struct Held {
    grant: Option<PermissionGrant>,
    link: Option<Box<dyn TransportSession>>,
    stream: Option<Box<dyn CaptureStream>>,
}

impl Held {
    async fn release(&mut self, platform: &SessionPlatform) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.stop().await {
                warn!("failed to stop capture stream: {}", e);
            }
        }
        if let Some(mut link) = self.link.take() {
            let label = link.receiver().label().to_string();
            if let Err(e) = link.disconnect().await {
                warn!("failed to disconnect from {}: {}", label, e);
            }
        }
        if let Some(grant) = self.grant.take() {
            let id = grant.id;
            if let Err(e) = platform.permissions.revoke(grant).await {
                warn!("failed to revoke capture permission {}: {}", id, e);
            }
        }
    }
}

// ============================================================================
// Capture Session
// ============================================================================

/// Single-slot screen mirroring session.
pub struct CaptureSession {
    ctx: SessionContext,
    task: Mutex<Option<RunningTask>>,
}

impl CaptureSession {
    pub fn new(platform: SessionPlatform, capture: CaptureSettings, timeouts: SessionConfig) -> Self {
        let (state_tx, _) = watch::channel(CaptureState::Idle);
        Self {
            ctx: SessionContext {
                platform,
                capture,
                timeouts,
                state_tx: Arc::new(state_tx),
                last_error: Arc::new(Mutex::new(None)),
                frames_sent: Arc::new(AtomicU64::new(0)),
            },
            task: Mutex::new(None),
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> CaptureState {
        self.ctx.state_tx.borrow().clone()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<CaptureState> {
        self.ctx.state_tx.subscribe()
    }

    /// Failure that ended the most recent session, if any.
    pub async fn last_error(&self) -> Option<CastError> {
        self.ctx.last_error.lock().await.clone()
    }

    /// Frames delivered to the receiver by the most recent session.
    pub fn frames_sent(&self) -> u64 {
        self.ctx.frames_sent.load(Ordering::Relaxed)
    }

    /// Begin mirroring to `receiver`.
    ///
    /// Returns as soon as the session is accepted; setup continues in the
    /// background. Only valid from `Idle`.
    pub async fn start(&self, receiver: Receiver) -> Result<(), CastError> {
        let mut task = self.task.lock().await;

        if !self.state().is_idle() {
            return Err(CastError::AlreadyActive);
        }

        // A previous session that ended on its own has already released
        // everything; reap its task before reusing the slot.
        if let Some(previous) = task.take() {
            previous.handle.await?;
        }

        *self.ctx.last_error.lock().await = None;
        self.ctx.frames_sent.store(0, Ordering::Relaxed);
        self.ctx
            .state_tx
            .send_replace(CaptureState::RequestingPermission {
                receiver: receiver.clone(),
            });
        info!("starting screen mirroring to {} ({})", receiver.label(), receiver.id);

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = tokio::spawn(run_session(self.ctx.clone(), receiver, cancel_rx));
        *task = Some(RunningTask {
            cancel: cancel_tx,
            handle,
        });

        Ok(())
    }

    /// Stop mirroring. Safe in every state; a no-op when idle.
    pub async fn stop(&self) -> Result<(), CastError> {
        let mut task = self.task.lock().await;

        let Some(running) = task.take() else {
            debug!("stop requested with no active session");
            return Ok(());
        };

        if !self.state().is_idle() {
            self.ctx.state_tx.send_replace(CaptureState::Stopping);
            info!("stopping screen mirroring");
        }

        let _ = running.cancel.send(true);
        let joined = running.handle.await;
        self.ctx.state_tx.send_replace(CaptureState::Idle);
        joined?;

        info!("screen mirroring stopped");
        Ok(())
    }

    /// Wait until the state satisfies `pred`, up to `limit`.
    pub async fn wait_for<F>(&self, pred: F, limit: Duration) -> Result<CaptureState, CastError>
    where
        F: Fn(&CaptureState) -> bool,
    {
        let mut rx = self.subscribe();
        let waited = tokio::time::timeout(limit, async {
            loop {
                {
                    let state = rx.borrow_and_update();
                    if pred(&*state) {
                        return Ok((*state).clone());
                    }
                }
                if rx.changed().await.is_err() {
                    return Err(CastError::Internal("session state channel closed".into()));
                }
            }
        })
        .await;

        waited.map_err(|_| CastError::Timeout("session state".into()))?
    }
}

// ============================================================================
// Background task
// ============================================================================

async fn run_session(ctx: SessionContext, receiver: Receiver, mut cancel: watch::Receiver<bool>) {
    let mut held = Held::default();
    let outcome = drive(&ctx, &receiver, &mut held, &mut cancel).await;
    held.release(&ctx.platform).await;

    match outcome {
        Ok(()) => info!("capture stream to {} ended", receiver.label()),
        Err(CastError::Cancelled) => debug!("session for {} cancelled", receiver.label()),
        Err(e) => {
            warn!("mirroring to {} failed: {}", receiver.label(), e);
            *ctx.last_error.lock().await = Some(e);
        }
    }

    ctx.state_tx.send_replace(CaptureState::Idle);
}

async fn drive(
    ctx: &SessionContext,
    receiver: &Receiver,
    held: &mut Held,
    cancel: &mut watch::Receiver<bool>,
) -> Result<(), CastError> {
    let platform = &ctx.platform;

    let grant = guarded(
        cancel,
        ctx.timeouts.permission_timeout(),
        "capture permission",
        platform.permissions.request_capture_permission(),
    )
    .await?;
    debug!("capture permission {} granted", grant.id);
    held.grant = Some(grant);

    let link = guarded(
        cancel,
        ctx.timeouts.connect_timeout(),
        "receiver connection",
        platform.transport.connect(receiver),
    )
    .await?;
    debug!("connected to {}", receiver.label());
    held.link = Some(link);

    let grant = held
        .grant
        .as_ref()
        .ok_or_else(|| CastError::Internal("permission grant missing".into()))?;
    let stream = guarded(
        cancel,
        ctx.timeouts.capture_timeout(),
        "capture start",
        platform.capturer.start(grant, &ctx.capture),
    )
    .await?;
    held.stream = Some(stream);

    // Stop may have claimed the state while setup was finishing.
    let started_at = Utc::now();
    let promoted = ctx.state_tx.send_if_modified(|state| {
        if matches!(state, CaptureState::RequestingPermission { .. }) {
            *state = CaptureState::Capturing {
                receiver: receiver.clone(),
                started_at,
            };
            true
        } else {
            false
        }
    });
    if !promoted {
        return Err(CastError::Cancelled);
    }
    info!(
        "capturing at {} fps ({}x{}) for {}",
        ctx.capture.target_fps,
        ctx.capture.width,
        ctx.capture.height,
        receiver.label()
    );

    pump(ctx, held, cancel).await
}

/// Move frames from the capture stream to the receiver until cancelled or
/// the stream ends.
async fn pump(
    ctx: &SessionContext,
    held: &mut Held,
    cancel: &mut watch::Receiver<bool>,
) -> Result<(), CastError> {
    let (Some(stream), Some(link)) = (held.stream.as_mut(), held.link.as_mut()) else {
        return Err(CastError::Internal("capture pipeline incomplete".into()));
    };

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancelled(cancel) => return Err(CastError::Cancelled),
            frame = stream.next_frame() => frame?,
        };

        let Some(frame) = frame else {
            return Ok(());
        };

        tokio::select! {
            biased;
            _ = cancelled(cancel) => return Err(CastError::Cancelled),
            sent = link.send_frame(frame) => sent?,
        }
        ctx.frames_sent.fetch_add(1, Ordering::Relaxed);
    }
}

/// Run one setup step, racing it against cancellation and a deadline.
async fn guarded<T, F>(
    cancel: &mut watch::Receiver<bool>,
    limit: Duration,
    step: &str,
    fut: F,
) -> Result<T, CastError>
where
    F: Future<Output = Result<T, CastError>>,
{
    if *cancel.borrow() {
        return Err(CastError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancelled(cancel) => Err(CastError::Cancelled),
        res = tokio::time::timeout(limit, fut) => match res {
            Ok(inner) => inner,
            Err(_) => Err(CastError::Timeout(step.to_string())),
        },
    }
}

/// Resolves once cancellation is signalled or the session handle is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{CaptureBehavior, PermissionBehavior, SimulatedPlatform, TransportBehavior};

    const SETTLE: Duration = Duration::from_secs(2);

    fn receiver() -> Receiver {
        Receiver {
            id: "abc".into(),
            name: Some("Living Room TV".into()),
        }
    }

    fn fast_settings() -> CaptureSettings {
        CaptureSettings {
            target_fps: 60,
            width: 64,
            height: 36,
        }
    }

    fn session_for(platform: &SimulatedPlatform) -> CaptureSession {
        CaptureSession::new(
            platform.session_platform(),
            fast_settings(),
            SessionConfig::default(),
        )
    }

    async fn wait_frames(session: &CaptureSession, count: u64) {
        tokio::time::timeout(SETTLE, async {
            while session.frames_sent() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("frames should flow");
    }

    #[tokio::test]
    async fn test_initial_state_is_idle() {
        let platform = SimulatedPlatform::builder().build();
        let session = session_for(&platform);
        assert_eq!(session.state(), CaptureState::Idle);
        assert_eq!(session.last_error().await, None);
    }

    #[tokio::test]
    async fn test_start_reaches_capturing_and_stop_releases() {
        let platform = SimulatedPlatform::builder().build();
        let session = session_for(&platform);

        session.start(receiver()).await.unwrap();
        let state = session
            .wait_for(|s| matches!(s, CaptureState::Capturing { .. }), SETTLE)
            .await
            .unwrap();
        assert_eq!(state.receiver(), Some(&receiver()));

        wait_frames(&session, 2).await;
        let counts = platform.resources();
        assert_eq!((counts.grants, counts.streams, counts.links), (1, 1, 1));

        session.stop().await.unwrap();
        assert!(session.state().is_idle());
        assert!(platform.resources().is_clear());
        assert!(platform.transport.frames_received() >= 2);
        assert_eq!(session.last_error().await, None);
    }

    #[tokio::test]
    async fn test_stop_immediately_after_start_releases_everything() {
        let platform = SimulatedPlatform::builder()
            .permission(PermissionBehavior::GrantAfter(Duration::from_millis(20)))
            .build();
        let session = session_for(&platform);

        session.start(receiver()).await.unwrap();
        assert!(matches!(
            session.state(),
            CaptureState::RequestingPermission { .. }
        ));
        session.stop().await.unwrap();

        assert!(session.state().is_idle());
        assert!(platform.resources().is_clear());
        assert_eq!(session.frames_sent(), 0);
        assert_eq!(session.last_error().await, None);
    }

    #[tokio::test]
    async fn test_stop_while_connecting_revokes_grant() {
        let platform = SimulatedPlatform::builder()
            .transport(TransportBehavior::ConnectAfter(Duration::from_millis(200)))
            .build();
        let session = session_for(&platform);

        session.start(receiver()).await.unwrap();
        tokio::time::timeout(SETTLE, async {
            while platform.resources().grants == 0 {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap();

        session.stop().await.unwrap();
        assert!(platform.resources().is_clear());
        assert_eq!(platform.permissions.revoked(), 1);
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let platform = SimulatedPlatform::builder().build();
        let session = session_for(&platform);
        session.stop().await.unwrap();
        session.stop().await.unwrap();
        assert!(session.state().is_idle());
    }

    #[tokio::test]
    async fn test_permission_denied_returns_to_idle() {
        let platform = SimulatedPlatform::builder()
            .permission(PermissionBehavior::Deny)
            .build();
        let session = session_for(&platform);

        session.start(receiver()).await.unwrap();
        session.wait_for(CaptureState::is_idle, SETTLE).await.unwrap();

        assert_eq!(session.last_error().await, Some(CastError::PermissionDenied));
        assert!(platform.resources().is_clear());
    }

    #[tokio::test]
    async fn test_unreachable_receiver_revokes_grant() {
        let platform = SimulatedPlatform::builder()
            .transport(TransportBehavior::Unreachable)
            .build();
        let session = session_for(&platform);

        session.start(receiver()).await.unwrap();
        session.wait_for(CaptureState::is_idle, SETTLE).await.unwrap();

        assert_eq!(
            session.last_error().await,
            Some(CastError::DeviceUnreachable("abc".into()))
        );
        assert!(platform.resources().is_clear());
        assert_eq!(platform.permissions.revoked(), 1);
    }

    #[tokio::test]
    async fn test_capture_start_failure_releases_link_and_grant() {
        let platform = SimulatedPlatform::builder()
            .capture(CaptureBehavior::FailToStart)
            .build();
        let session = session_for(&platform);

        session.start(receiver()).await.unwrap();
        session.wait_for(CaptureState::is_idle, SETTLE).await.unwrap();

        assert!(matches!(
            session.last_error().await,
            Some(CastError::CaptureStartFailed(_))
        ));
        assert!(platform.resources().is_clear());
        assert_eq!(platform.transport.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_permission_timeout() {
        let platform = SimulatedPlatform::builder()
            .permission(PermissionBehavior::Hang)
            .build();
        let session = CaptureSession::new(
            platform.session_platform(),
            fast_settings(),
            SessionConfig {
                permission_timeout_ms: 30,
                ..SessionConfig::default()
            },
        );

        session.start(receiver()).await.unwrap();
        session.wait_for(CaptureState::is_idle, SETTLE).await.unwrap();

        assert_eq!(
            session.last_error().await,
            Some(CastError::Timeout("capture permission".into()))
        );
        assert!(platform.resources().is_clear());
    }

    #[tokio::test]
    async fn test_connect_timeout_revokes_grant() {
        let platform = SimulatedPlatform::builder()
            .transport(TransportBehavior::ConnectAfter(Duration::from_millis(500)))
            .build();
        let session = CaptureSession::new(
            platform.session_platform(),
            fast_settings(),
            SessionConfig {
                connect_timeout_ms: 30,
                ..SessionConfig::default()
            },
        );

        session.start(receiver()).await.unwrap();
        session.wait_for(CaptureState::is_idle, SETTLE).await.unwrap();

        assert_eq!(
            session.last_error().await,
            Some(CastError::Timeout("receiver connection".into()))
        );
        assert!(platform.resources().is_clear());
        assert_eq!(platform.permissions.revoked(), 1);
        assert_eq!(platform.transport.disconnects(), 0);
    }

    #[tokio::test]
    async fn test_capture_timeout_is_separate_from_connect() {
        let platform = SimulatedPlatform::builder()
            .capture(CaptureBehavior::StartAfter(Duration::from_millis(500)))
            .build();
        let session = CaptureSession::new(
            platform.session_platform(),
            fast_settings(),
            SessionConfig {
                connect_timeout_ms: 5_000,
                capture_timeout_ms: 30,
                ..SessionConfig::default()
            },
        );

        session.start(receiver()).await.unwrap();
        session.wait_for(CaptureState::is_idle, SETTLE).await.unwrap();

        assert_eq!(
            session.last_error().await,
            Some(CastError::Timeout("capture start".into()))
        );
        assert!(platform.resources().is_clear());
        assert_eq!(platform.transport.disconnects(), 1);
        assert_eq!(platform.permissions.revoked(), 1);
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let platform = SimulatedPlatform::builder().build();
        let session = session_for(&platform);

        session.start(receiver()).await.unwrap();
        session
            .wait_for(|s| matches!(s, CaptureState::Capturing { .. }), SETTLE)
            .await
            .unwrap();

        let other = Receiver {
            id: "xyz".into(),
            name: None,
        };
        assert_eq!(session.start(other).await, Err(CastError::AlreadyActive));
        assert_eq!(session.state().receiver(), Some(&receiver()));

        session.stop().await.unwrap();
        assert!(platform.resources().is_clear());
    }

    #[tokio::test]
    async fn test_stream_end_finishes_session() {
        let platform = SimulatedPlatform::builder()
            .capture(CaptureBehavior::Frames { limit: Some(3) })
            .build();
        let session = session_for(&platform);

        session.start(receiver()).await.unwrap();
        session
            .wait_for(|s| matches!(s, CaptureState::Capturing { .. }), SETTLE)
            .await
            .unwrap();
        session.wait_for(CaptureState::is_idle, SETTLE).await.unwrap();

        assert_eq!(session.frames_sent(), 3);
        assert_eq!(session.last_error().await, None);
        assert!(platform.resources().is_clear());
    }

    #[tokio::test]
    async fn test_restart_after_failure() {
        let platform = SimulatedPlatform::builder()
            .capture(CaptureBehavior::Frames { limit: Some(1) })
            .build();
        let session = session_for(&platform);

        session.start(receiver()).await.unwrap();
        session
            .wait_for(|s| matches!(s, CaptureState::Capturing { .. }), SETTLE)
            .await
            .unwrap();
        session.wait_for(CaptureState::is_idle, SETTLE).await.unwrap();

        session.start(receiver()).await.unwrap();
        session.stop().await.unwrap();
        assert!(platform.resources().is_clear());
    }

    #[tokio::test]
    async fn test_send_failure_ends_session() {
        let platform = SimulatedPlatform::builder()
            .transport(TransportBehavior::FailOnSend)
            .build();
        let session = session_for(&platform);

        session.start(receiver()).await.unwrap();
        session
            .wait_for(|s| matches!(s, CaptureState::Capturing { .. }), SETTLE)
            .await
            .unwrap();
        session.wait_for(CaptureState::is_idle, SETTLE).await.unwrap();

        assert!(matches!(
            session.last_error().await,
            Some(CastError::TransportError(_))
        ));
        assert_eq!(session.frames_sent(), 0);
        assert!(platform.resources().is_clear());
    }

    #[tokio::test]
    async fn test_state_names() {
        assert_eq!(CaptureState::Idle.name(), "idle");
        assert_eq!(CaptureState::Stopping.name(), "stopping");
        assert_eq!(
            CaptureState::RequestingPermission {
                receiver: receiver()
            }
            .name(),
            "requesting_permission"
        );
    }
}
