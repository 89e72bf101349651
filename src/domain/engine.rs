//! Engine collaborator contract and the events it emits.
//!
//! The relay never owns the conversational engine. It only needs two
//! capabilities from it, captured by [`EngineSource`]: a push-based event
//! subscription and a fire-and-forget `send`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Callback invoked by the engine for every emitted [`EngineEvent`].
pub type EventHandler = Arc<dyn Fn(EngineEvent) + Send + Sync>;

/// Whether an event announces a new message or an update to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageAction {
    /// A new message was created.
    Created,
    /// An existing message changed (e.g. a streaming update).
    Updated,
}

/// Message payload carried by an [`EngineEvent`].
///
/// Only `text` and `say` are interpreted; every other field is kept so the
/// raw payload can be logged as received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineMessage {
    /// Message text, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Kind tag of a `say` message (e.g. `"text"`, `"reasoning"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub say: Option<String>,
    /// Remaining engine-specific fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Event emitted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Identity of the originating task.
    #[serde(rename = "taskId")]
    pub task_id: String,
    /// Lifecycle action, when the engine reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<MessageAction>,
    /// Message payload.
    pub message: EngineMessage,
}

impl EngineEvent {
    /// Builds a `created` event carrying a `say` message.
    #[must_use]
    pub fn say(
        task_id: impl Into<String>,
        say: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            action: Some(MessageAction::Created),
            message: EngineMessage {
                text: Some(text.into()),
                say: Some(say.into()),
                extra: serde_json::Map::new(),
            },
        }
    }
}

/// Capabilities the relay needs from the host's engine.
pub trait EngineSource: Send + Sync + fmt::Debug {
    /// Returns `true` when the engine can accept subscriptions and messages.
    fn is_ready(&self) -> bool {
        true
    }

    /// Registers a long-lived handler for every future event.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::EngineUnavailable`] if the engine cannot take
    /// the subscription.
    fn subscribe(&self, handler: EventHandler) -> Result<(), RelayError>;

    /// Hands one message to the engine. Fire-and-forget.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::EngineUnavailable`] or [`RelayError::EngineSend`]
    /// if the engine rejects the message.
    fn send(&self, text: &str) -> Result<(), RelayError>;
}
