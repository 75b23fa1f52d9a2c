//! Method call dispatch.
//!
//! The dispatcher:
//! 1. Parses the raw call into a typed [`Command`]
//! 2. Routes it to the injected [`CastHandler`]
//! 3. Turns the outcome into exactly one [`MethodResult`]
//! 4. Tracks statistics for observability
//!
//! Calls are answered one at a time in arrival order. Handler work runs on a
//! spawned task, so a panicking handler still produces an error reply.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::command::{Command, MethodCall};
use crate::errors::CastError;
use crate::handler::CastHandler;
use crate::reply::MethodResult;

// ============================================================================
// Dispatch Statistics
// ============================================================================

#[derive(Debug, Default)]
pub struct DispatchStats {
    /// Total calls received
    pub received: AtomicU64,
    /// Calls answered with success
    pub succeeded: AtomicU64,
    /// Calls answered with an error reply
    pub failed: AtomicU64,
    /// Failed calls whose fault lay with the caller's arguments or timing
    pub rejected: AtomicU64,
    /// Calls answered with not-implemented
    pub not_implemented: AtomicU64,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            not_implemented: self.not_implemented.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.received.store(0, Ordering::Relaxed);
        self.succeeded.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
        self.not_implemented.store(0, Ordering::Relaxed);
    }

    fn inc_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_not_implemented(&self) {
        self.not_implemented.fetch_add(1, Ordering::Relaxed);
    }
}

/// Snapshot of dispatch statistics at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStatsSnapshot {
    pub received: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub rejected: u64,
    pub not_implemented: u64,
}

impl DispatchStatsSnapshot {
    /// Every received call has exactly one recorded answer.
    pub fn answered(&self) -> u64 {
        self.succeeded + self.failed + self.not_implemented
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

pub struct Dispatcher {
    handler: Arc<dyn CastHandler>,
    /// Serializes calls so each runs to completion before the next
    turn: Mutex<()>,
    stats: Arc<DispatchStats>,
}

impl Dispatcher {
    pub fn new(handler: Arc<dyn CastHandler>) -> Self {
        Self {
            handler,
            turn: Mutex::new(()),
            stats: Arc::new(DispatchStats::new()),
        }
    }

    pub fn stats(&self) -> &Arc<DispatchStats> {
        &self.stats
    }

    /// Answer one method call.
    pub async fn dispatch(&self, call: MethodCall) -> MethodResult {
        let _turn = self.turn.lock().await;
        self.stats.inc_received();

        let outcome = match Command::parse(&call) {
            Ok(command) => self.run(command).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(value) => {
                self.stats.inc_succeeded();
                debug!("{} succeeded", call.method);
                MethodResult::Success(value)
            }
            Err(CastError::UnknownCommand(method)) => {
                self.stats.inc_not_implemented();
                warn!("method not implemented: {}", method);
                MethodResult::NotImplemented
            }
            Err(e) => {
                self.stats.inc_failed();
                if e.is_caller_error() {
                    self.stats.inc_rejected();
                    debug!("{} rejected: {}", call.method, e);
                } else {
                    warn!("{} failed: {}", call.method, e);
                }
                MethodResult::from_error(&e)
            }
        }
    }

    async fn run(&self, command: Command) -> Result<Value, CastError> {
        debug!("dispatching {}", command.method());
        let handler = self.handler.clone();

        match command {
            Command::StartScreenMirroring(request) => {
                tokio::spawn(async move { handler.start_screen_mirroring(request).await })
                    .await??;
                Ok(Value::Bool(true))
            }
            Command::StopCasting => {
                tokio::spawn(async move { handler.stop_casting().await }).await??;
                Ok(Value::Null)
            }
            Command::Unimplemented(method) => Err(CastError::UnknownCommand(method)),
        }
    }
}
