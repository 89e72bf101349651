//! Inbound handler: decodes client frames and forwards them to the engine.

use std::sync::Arc;

use crate::domain::{EngineSource, Logger};
use crate::envelope::{InboundEnvelope, decode_inbound};
use crate::error::RelayError;

/// Per-frame inbound logic shared by the WebSocket and HTTP transports.
///
/// Stateless apart from its collaborators, so one instance serves every
/// connection.
#[derive(Debug, Clone)]
pub struct InboundHandler {
    engine: Arc<dyn EngineSource>,
    logger: Arc<dyn Logger>,
}

impl InboundHandler {
    /// Creates a handler forwarding to `engine` and logging to `logger`.
    #[must_use]
    pub fn new(engine: Arc<dyn EngineSource>, logger: Arc<dyn Logger>) -> Self {
        Self { engine, logger }
    }

    /// Decodes one frame and hands its message to the engine.
    ///
    /// A failing engine `send` is logged and not retried; the frame still
    /// counts as accepted.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::MalformedEnvelope`] if the frame cannot be
    /// decoded. The engine is not called in that case.
    pub fn handle_frame(&self, raw: &[u8]) -> Result<InboundEnvelope, RelayError> {
        let envelope = decode_inbound(raw).inspect_err(|e| {
            self.logger.append_line(&format!("Error handling message: {e}"));
        })?;

        self.logger.append_line(&format!(
            "Received at {}: {}",
            envelope.time, envelope.message
        ));

        if let Err(e) = self.engine.send(&envelope.message) {
            tracing::warn!(error = %e, "engine rejected inbound message");
            self.logger.append_line(&format!("Failed to send message to engine: {e}"));
        }

        Ok(envelope)
    }
}
