//! Bridge core for Android

use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, warn};

use ctv_core::config::{BridgeConfig, EngineKind};
use ctv_core::harness::SimulatedPlatform;
use ctv_core::{
    CaptureSession, CaptureState, CastHandler, Dispatcher, MethodCall, MethodResult,
    PlaceholderHandler, SessionHandler,
};

use crate::codec;
use crate::error::BridgeError;
use crate::logging;

/// Owns the runtime and dispatcher behind the casting channel.
///
/// Every entry point is synchronous so the JNI side can call it directly
/// from the platform thread that received the method call.
pub struct BridgeCore {
    config: BridgeConfig,
    dispatcher: Dispatcher,
    session: Option<Arc<CaptureSession>>,
    // Declared last so it is dropped after the dispatcher and session.
    runtime: Runtime,
}

impl BridgeCore {
    /// Create a bridge from the JSON config passed by the host app.
    pub fn new(config_json: &str) -> Result<Self, BridgeError> {
        let config = BridgeConfig::from_json(config_json)?;
        Self::from_config(config)
    }

    /// Host init path: parse the config, install logging from it, then build
    /// the bridge so its startup is logged to the configured sink.
    pub fn init(config_json: &str) -> Result<Self, BridgeError> {
        let config = BridgeConfig::from_json(config_json)?;
        logging::init(&config.log_level, config.log_file.as_deref());
        Self::from_config(config)
    }

    pub fn from_config(config: BridgeConfig) -> Result<Self, BridgeError> {
        config.validate()?;

        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("ctv-bridge")
            .enable_all()
            .build()?;

        let (handler, session): (Arc<dyn CastHandler>, Option<Arc<CaptureSession>>) =
            match config.engine {
                EngineKind::Placeholder => (Arc::new(PlaceholderHandler), None),
                EngineKind::Simulated => {
                    let platform = SimulatedPlatform::builder().build();
                    let session = Arc::new(CaptureSession::new(
                        platform.session_platform(),
                        config.capture,
                        config.session,
                    ));
                    (Arc::new(SessionHandler::new(session.clone())), Some(session))
                }
            };

        info!(
            "bridge ready on channel {} ({} engine)",
            config.channel_name, config.engine
        );

        Ok(Self {
            config,
            dispatcher: Dispatcher::new(handler),
            session,
            runtime,
        })
    }

    pub fn channel_name(&self) -> &str {
        &self.config.channel_name
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Answer a decoded call. Blocks until the dispatcher replies.
    pub fn handle_call(&self, call: MethodCall) -> MethodResult {
        debug!("channel call {}", call.method);
        self.runtime.block_on(self.dispatcher.dispatch(call))
    }

    /// Answer an encoded call with an encoded reply envelope.
    pub fn invoke(&self, message: &[u8]) -> Vec<u8> {
        let reply = match codec::decode_method_call(message) {
            Ok(call) => self.handle_call(call),
            Err(e) => {
                warn!("rejecting undecodable call: {}", e);
                MethodResult::from_error(&e.into())
            }
        };
        codec::encode_reply(&reply)
    }

    /// Capture state when the session engine is active.
    pub fn capture_state(&self) -> Option<CaptureState> {
        self.session.as_ref().map(|session| session.state())
    }
}

impl Drop for BridgeCore {
    fn drop(&mut self) {
        if let Some(session) = &self.session {
            if let Err(e) = self.runtime.block_on(session.stop()) {
                warn!("failed to stop session on shutdown: {}", e);
            }
        }
    }
}
