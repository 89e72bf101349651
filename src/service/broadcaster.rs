//! Outbound broadcaster: fans engine events out to every open connection.
//!
//! The broadcaster registers one handler with the engine. The handler only
//! queues the event; a single task drains the queue and broadcasts each
//! event in emission order. Events are never reordered or coalesced.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::{ConnectionRegistry, EngineEvent, EngineSource, EventHandler, Logger};
use crate::envelope::encode_outbound;
use crate::error::RelayError;

/// Transforms engine events and delivers them to the connection registry.
#[derive(Debug, Clone)]
pub struct OutboundBroadcaster {
    registry: Arc<ConnectionRegistry>,
    logger: Arc<dyn Logger>,
}

impl OutboundBroadcaster {
    /// Creates a broadcaster delivering to `registry`.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>, logger: Arc<dyn Logger>) -> Self {
        Self { registry, logger }
    }

    /// Subscribes to `engine` and spawns the task that broadcasts every
    /// event it emits.
    ///
    /// # Errors
    ///
    /// Returns whatever [`EngineSource::subscribe`] returns.
    pub fn attach(&self, engine: &dyn EngineSource) -> Result<JoinHandle<()>, RelayError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<EngineEvent>();
        let handler: EventHandler = Arc::new(move |event: EngineEvent| {
            let _ = tx.send(event);
        });
        engine.subscribe(handler)?;

        let broadcaster = self.clone();
        Ok(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                broadcaster.broadcast(&event).await;
            }
            tracing::debug!("engine event stream ended");
        }))
    }

    /// Logs `event`, encodes it, and queues it on every open connection.
    ///
    /// Returns the number of connections the frame was queued on. A
    /// recipient that fails is logged and skipped.
    pub async fn broadcast(&self, event: &EngineEvent) -> usize {
        self.log_event(event);

        let Some(envelope) = encode_outbound(event) else {
            return 0;
        };
        let frame = match envelope.to_json() {
            Ok(frame) => frame,
            Err(e) => {
                self.logger
                    .append_line(&format!("Failed to encode outbound envelope: {e}"));
                return 0;
            }
        };

        let mut delivered = 0;
        self.registry
            .for_each_open(|conn| match conn.deliver(&frame) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(conn_id = %conn.id(), error = %e, "broadcast delivery failed");
                    self.logger.append_line(&format!("Delivery failed: {e}"));
                }
            })
            .await;
        delivered
    }

    fn log_event(&self, event: &EngineEvent) {
        self.logger.append_line(&format!(
            "(ID: {}) Received message from engine:",
            event.task_id
        ));
        let raw = serde_json::to_string_pretty(&event.message)
            .unwrap_or_else(|e| format!("<unserializable message: {e}>"));
        self.logger.append_line(&raw);
    }
}
