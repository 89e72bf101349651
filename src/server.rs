//! Relay server: listener lifecycle and component wiring.
//!
//! ```text
//! Stopped ──start()──▶ Starting ──bind ok──▶ Listening ──stop()──▶ Stopped
//!                         │                      │
//!                         └──bind failed──▶ Stopped ◀──serve loop ended──┘
//! ```
//!
//! Accept faults after the bind are logged by [`RelayListener`] and do not
//! leave `Listening`.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::api::build_router;
use crate::app_state::RelayState;
use crate::config::DEFAULT_OUTBOUND_BUFFER;
use crate::domain::{ConnectionRegistry, EngineSource, Logger};
use crate::error::RelayError;
use crate::listener::RelayListener;
use crate::service::{InboundHandler, OutboundBroadcaster};

/// Lifecycle state of a [`RelayServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// No listener.
    Stopped,
    /// Bind in progress.
    Starting,
    /// Accepting connections.
    Listening,
}

#[derive(Debug, Default)]
struct Lifecycle {
    local_addr: Option<SocketAddr>,
    serve_task: Option<JoinHandle<()>>,
    broadcast_task: Option<JoinHandle<()>>,
}

/// WebSocket/HTTP relay between clients and an [`EngineSource`].
#[derive(Debug)]
pub struct RelayServer {
    engine: Arc<dyn EngineSource>,
    logger: Arc<dyn Logger>,
    registry: Arc<ConnectionRegistry>,
    broadcaster: OutboundBroadcaster,
    outbound_buffer: usize,
    status: Arc<watch::Sender<ServerState>>,
    lifecycle: Mutex<Lifecycle>,
}

impl RelayServer {
    /// Creates a stopped server.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::EngineUnavailable`] if `engine` is not ready;
    /// the server is not constructed and cannot be started.
    pub fn new(engine: Arc<dyn EngineSource>, logger: Arc<dyn Logger>) -> Result<Self, RelayError> {
        if !engine.is_ready() {
            return Err(RelayError::EngineUnavailable(
                "engine is not ready".to_string(),
            ));
        }
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = OutboundBroadcaster::new(Arc::clone(&registry), Arc::clone(&logger));
        let (status, _) = watch::channel(ServerState::Stopped);
        Ok(Self {
            engine,
            logger,
            registry,
            broadcaster,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            status: Arc::new(status),
            lifecycle: Mutex::new(Lifecycle::default()),
        })
    }

    /// Sets the per-connection outbound queue depth.
    #[must_use]
    pub fn with_outbound_buffer(mut self, capacity: usize) -> Self {
        self.outbound_buffer = capacity.max(1);
        self
    }

    /// Binds `host:port` and starts serving. Port `0` picks an ephemeral
    /// port. Returns the bound address.
    ///
    /// Calling `start` while already listening returns the current address.
    /// The engine subscription is made on the first successful start only.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::BindFailure`] if the listener cannot be bound;
    /// the server stays [`ServerState::Stopped`] and nothing is retried.
    /// Returns [`RelayError::EngineUnavailable`] if the engine refuses the
    /// event subscription.
    pub async fn start(&self, port: u16, host: IpAddr) -> Result<SocketAddr, RelayError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if let (ServerState::Listening, Some(addr)) = (self.status(), lifecycle.local_addr) {
            return Ok(addr);
        }

        self.status.send_replace(ServerState::Starting);
        let addr = SocketAddr::new(host, port);

        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                self.status.send_replace(ServerState::Stopped);
                let err = RelayError::BindFailure { addr, source };
                self.logger.append_line(&format!("Relay server error: {err}"));
                return Err(err);
            }
        };
        let local_addr = listener.local_addr().unwrap_or(addr);
        let listener = RelayListener::new(listener, Arc::clone(&self.logger));

        if lifecycle.broadcast_task.is_none() {
            match self.broadcaster.attach(self.engine.as_ref()) {
                Ok(task) => lifecycle.broadcast_task = Some(task),
                Err(e) => {
                    self.status.send_replace(ServerState::Stopped);
                    self.logger.append_line(&format!("Relay server error: {e}"));
                    return Err(e);
                }
            }
        }

        self.registry.reopen();
        let router = build_router(self.state());
        let status = Arc::clone(&self.status);
        lifecycle.serve_task = Some(tokio::spawn(async move {
            let ended = axum::serve(listener, router).await;
            tracing::warn!(?ended, "relay serve loop ended");
            status.send_replace(ServerState::Stopped);
        }));
        lifecycle.local_addr = Some(local_addr);

        self.status.send_replace(ServerState::Listening);
        self.logger
            .append_line(&format!("Relay listening on ws://{local_addr}/"));
        tracing::info!(addr = %local_addr, "relay listening");
        Ok(local_addr)
    }

    /// Closes the listener and every open connection without draining.
    ///
    /// Safe to call repeatedly and on a server that never started.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        let Some(serve_task) = lifecycle.serve_task.take() else {
            return;
        };
        lifecycle.local_addr = None;

        serve_task.abort();
        let _ = serve_task.await;
        let closed = self.registry.close_all().await;

        self.status.send_replace(ServerState::Stopped);
        self.logger
            .append_line(&format!("Relay server stopped ({closed} connections closed)"));
        tracing::info!(closed, "relay stopped");
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn status(&self) -> ServerState {
        *self.status.borrow()
    }

    /// Returns a receiver notified on every lifecycle transition.
    ///
    /// The receiver starts with the current state marked as seen.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ServerState> {
        self.status.subscribe()
    }

    /// Returns the bound address while listening.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.lifecycle.lock().await.local_addr
    }

    /// Returns the number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.registry.len().await
    }

    fn state(&self) -> RelayState {
        RelayState {
            registry: Arc::clone(&self.registry),
            inbound: InboundHandler::new(Arc::clone(&self.engine), Arc::clone(&self.logger)),
            logger: Arc::clone(&self.logger),
            outbound_buffer: self.outbound_buffer,
        }
    }
}

impl Drop for RelayServer {
    fn drop(&mut self) {
        let lifecycle = self.lifecycle.get_mut();
        for task in [lifecycle.serve_task.take(), lifecycle.broadcast_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
        if self.registry.try_close_all().is_none() {
            tracing::debug!("registry busy on drop; connections end with their peers");
        }
    }
}
