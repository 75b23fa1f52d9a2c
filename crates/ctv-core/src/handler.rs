//! Command handlers behind the dispatcher.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::command::StartScreenMirroringRequest;
use crate::errors::CastError;
use crate::session::CaptureSession;

/// One method per command in the closed command set.
#[async_trait]
pub trait CastHandler: Send + Sync {
    async fn start_screen_mirroring(
        &self,
        request: StartScreenMirroringRequest,
    ) -> Result<(), CastError>;

    async fn stop_casting(&self) -> Result<(), CastError>;
}

/// Reports success for every recognized command without touching the
/// platform. This is what the app ships until a real capture backend exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderHandler;

#[async_trait]
impl CastHandler for PlaceholderHandler {
    async fn start_screen_mirroring(
        &self,
        request: StartScreenMirroringRequest,
    ) -> Result<(), CastError> {
        info!(
            "received startScreenMirroring for {} ({})",
            request.device_name.as_deref().unwrap_or("<unnamed>"),
            request.device_id.as_deref().unwrap_or("<no id>")
        );
        Ok(())
    }

    async fn stop_casting(&self) -> Result<(), CastError> {
        info!("received stopCasting");
        Ok(())
    }
}

/// Drives a [`CaptureSession`].
pub struct SessionHandler {
    session: Arc<CaptureSession>,
}

impl SessionHandler {
    pub fn new(session: Arc<CaptureSession>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<CaptureSession> {
        &self.session
    }
}

#[async_trait]
impl CastHandler for SessionHandler {
    async fn start_screen_mirroring(
        &self,
        request: StartScreenMirroringRequest,
    ) -> Result<(), CastError> {
        let receiver = request.to_receiver()?;
        self.session.start(receiver).await
    }

    async fn stop_casting(&self) -> Result<(), CastError> {
        self.session.stop().await
    }
}
