//! Relay error types with HTTP status code mapping.
//!
//! [`RelayError`] is the central error type for the relay. Only
//! [`RelayError::MalformedEnvelope`] is ever rendered onto the wire, and it
//! renders as the literal token [`INVALID_JSON_REPLY`].

use std::net::SocketAddr;

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::domain::ConnectionId;

/// Literal reply sent to a client whose frame could not be decoded.
pub const INVALID_JSON_REPLY: &str = "Invalid JSON";

/// Relay error enum.
///
/// | Variant             | Scope                 | HTTP Status               |
/// |---------------------|-----------------------|---------------------------|
/// | `MalformedEnvelope` | one inbound frame     | 400 Bad Request           |
/// | `DeliveryFailure`   | one recipient         | 500 Internal Server Error |
/// | `EngineSend`        | one inbound frame     | 502 Bad Gateway           |
/// | `EngineUnavailable` | server construction   | 503 Service Unavailable   |
/// | `BindFailure`       | one start attempt     | 500 Internal Server Error |
/// | `ListenerFault`     | the listener          | 500 Internal Server Error |
/// | `Internal`          | anything else         | 500 Internal Server Error |
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Inbound frame is not a JSON document with string `message` and `time`.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    BindFailure {
        /// Address the bind was attempted on.
        addr: SocketAddr,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// The listener failed after a successful bind.
    #[error("listener fault: {0}")]
    ListenerFault(String),

    /// A broadcast frame could not be queued for one connection.
    #[error("delivery to connection {id} failed: {reason}")]
    DeliveryFailure {
        /// Recipient connection.
        id: ConnectionId,
        /// Why the frame was not queued.
        reason: String,
    },

    /// The engine collaborator is not ready.
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The engine rejected a message handed to it.
    #[error("engine send failed: {0}")]
    EngineSend(String),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedEnvelope(_) => StatusCode::BAD_REQUEST,
            Self::EngineSend(_) => StatusCode::BAD_GATEWAY,
            Self::EngineUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::BindFailure { .. }
            | Self::ListenerFault(_)
            | Self::DeliveryFailure { .. }
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            Self::MalformedEnvelope(_) => (
                status,
                [(header::CONTENT_TYPE, "text/plain")],
                INVALID_JSON_REPLY,
            )
                .into_response(),
            _ => status.into_response(),
        }
    }
}
