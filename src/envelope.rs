//! Wire envelopes: the inbound message shape and the outbound broadcast shape.
//!
//! Inbound (client → relay):
//! ```json
//! { "message": "hi", "time": "2025-01-01T00:00:00Z" }
//! ```
//!
//! Outbound (relay → every open WebSocket client):
//! ```json
//! { "is_reasoning": false, "message": "hello" }
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::EngineEvent;
use crate::error::RelayError;

/// `say` tag marking an engine message as a reasoning trace.
pub const REASONING_TAG: &str = "reasoning";

/// Envelope sent by a client to inject a message into the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEnvelope {
    /// Message text handed to the engine.
    pub message: String,
    /// Client-supplied timestamp, ISO-8601 or free-form.
    pub time: String,
}

/// Envelope broadcast to clients for one engine event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEnvelope {
    /// `true` only for messages tagged [`REASONING_TAG`].
    pub is_reasoning: bool,
    /// Message text.
    pub message: String,
}

impl OutboundEnvelope {
    /// Serializes the envelope to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] if serialization fails.
    pub fn to_json(&self) -> Result<String, RelayError> {
        serde_json::to_string(self).map_err(|e| RelayError::Internal(e.to_string()))
    }
}

/// Parses one inbound frame.
///
/// # Errors
///
/// Returns [`RelayError::MalformedEnvelope`] if `raw` is not UTF-8 JSON
/// holding string `message` and `time` fields.
pub fn decode_inbound(raw: &[u8]) -> Result<InboundEnvelope, RelayError> {
    serde_json::from_slice(raw).map_err(|e| RelayError::MalformedEnvelope(e.to_string()))
}

/// Maps an engine event to its outbound envelope.
///
/// Returns `None` (skip) when the event has no text or empty text.
#[must_use]
pub fn encode_outbound(event: &EngineEvent) -> Option<OutboundEnvelope> {
    let text = event.message.text.as_deref().filter(|t| !t.is_empty())?;
    Some(OutboundEnvelope {
        is_reasoning: event.message.say.as_deref() == Some(REASONING_TAG),
        message: text.to_string(),
    })
}
