//! Shared relay state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::{ConnectionRegistry, Logger};
use crate::service::InboundHandler;

/// Shared state available to all handlers via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct RelayState {
    /// Open connections.
    pub registry: Arc<ConnectionRegistry>,
    /// Inbound frame handler shared by every transport.
    pub inbound: InboundHandler,
    /// Diagnostic line sink.
    pub logger: Arc<dyn Logger>,
    /// Outbound queue depth for each new connection.
    pub outbound_buffer: usize,
}
