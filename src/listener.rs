//! Accept loop for the relay listener.
//!
//! [`RelayListener`] sits between the bound socket and `axum::serve`. Accept
//! errors that only concern one incoming connection are dropped silently;
//! every other accept error is a [`RelayError::ListenerFault`], reported to
//! the injected [`Logger`] as `Relay server error: ...`. The listener keeps
//! accepting after a fault.

use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::serve::Listener;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

use crate::domain::Logger;
use crate::error::RelayError;

/// Pause after a listener fault before accepting again.
pub const FAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Raw socket source a [`RelayListener`] accepts from.
pub trait AcceptSource: Send + 'static {
    /// Stream type of an accepted connection.
    type Io: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Accepts one connection.
    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Io, SocketAddr)>> + Send;

    /// Returns the bound address.
    ///
    /// # Errors
    ///
    /// Returns the socket error if the address cannot be read.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl AcceptSource for TcpListener {
    type Io = TcpStream;

    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}

/// [`Listener`] that reports accept faults to the relay logger.
pub struct RelayListener<S = TcpListener> {
    source: S,
    logger: Arc<dyn Logger>,
    backoff: Duration,
}

impl<S: AcceptSource> RelayListener<S> {
    /// Wraps `source`, reporting faults to `logger`.
    #[must_use]
    pub fn new(source: S, logger: Arc<dyn Logger>) -> Self {
        Self {
            source,
            logger,
            backoff: FAULT_BACKOFF,
        }
    }

    /// Sets the pause taken after each fault.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    fn report_fault(&self, e: &io::Error) {
        let fault = RelayError::ListenerFault(e.to_string());
        tracing::error!(error = %fault, "relay listener fault");
        self.logger.append_line(&format!("Relay server error: {fault}"));
    }
}

impl<S> fmt::Debug for RelayListener<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayListener")
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl<S: AcceptSource> Listener for RelayListener<S> {
    type Io = S::Io;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            match self.source.accept().await {
                Ok(conn) => return conn,
                Err(e) if is_connection_error(&e) => {
                    tracing::debug!(error = %e, "incoming connection dropped before accept");
                }
                Err(e) => {
                    self.report_fault(&e);
                    tokio::time::sleep(self.backoff).await;
                }
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.source.local_addr()
    }
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}
