//! Registry-side handle to one open client connection.
//!
//! The socket itself is owned by the connection task (see [`crate::ws`]).
//! The [`ConnectionHandle`] is what the rest of the relay holds: it carries
//! the connection's identity, its [`ReadyState`], the sending half of its
//! bounded outbound queue and a close signal.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::{Notify, mpsc};

use super::ConnectionId;
use crate::error::RelayError;

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    /// Accepted, not yet able to receive frames.
    Connecting = 0,
    /// Able to receive frames.
    Open = 1,
    /// Close requested; no further frames are queued.
    Closing = 2,
    /// Fully closed.
    Closed = 3,
}

impl ReadyState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Cloneable handle to one client connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    state: Arc<AtomicU8>,
    outbound: mpsc::Sender<String>,
    close_signal: Arc<Notify>,
}

impl ConnectionHandle {
    /// Creates a handle in the [`ReadyState::Connecting`] state together with
    /// the receiving half of its outbound queue.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id: ConnectionId::new(),
            state: Arc::new(AtomicU8::new(ReadyState::Connecting as u8)),
            outbound,
            close_signal: Arc::new(Notify::new()),
        };
        (handle, rx)
    }

    /// Returns the connection identity.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the current ready state.
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Returns `true` while the connection accepts frames.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }

    /// Moves a connecting handle to [`ReadyState::Open`]. A handle that has
    /// already started closing is left untouched.
    pub fn mark_open(&self) {
        let _ = self.state.compare_exchange(
            ReadyState::Connecting as u8,
            ReadyState::Open as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Moves the handle to [`ReadyState::Closing`] unless already closed.
    pub fn mark_closing(&self) {
        let _ = self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < ReadyState::Closing as u8).then_some(ReadyState::Closing as u8)
            });
    }

    /// Moves the handle to [`ReadyState::Closed`].
    pub fn mark_closed(&self) {
        self.state.store(ReadyState::Closed as u8, Ordering::SeqCst);
    }

    /// Queues one text frame for delivery without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::DeliveryFailure`] if the connection is not open,
    /// its queue is full, or its task has gone away.
    pub fn deliver(&self, frame: &str) -> Result<(), RelayError> {
        if !self.is_open() {
            return Err(self.delivery_failure("connection is not open"));
        }
        self.outbound
            .try_send(frame.to_owned())
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => self.delivery_failure("outbound queue full"),
                mpsc::error::TrySendError::Closed(_) => {
                    self.delivery_failure("connection task gone")
                }
            })
    }

    /// Requests an immediate close: the handle stops accepting frames and
    /// the connection task drops its socket without draining the queue.
    pub fn close(&self) {
        self.mark_closing();
        self.close_signal.notify_one();
    }

    /// Resolves once [`ConnectionHandle::close`] has been called.
    pub async fn closed(&self) {
        self.close_signal.notified().await;
    }

    fn delivery_failure(&self, reason: &str) -> RelayError {
        RelayError::DeliveryFailure {
            id: self.id,
            reason: reason.to_string(),
        }
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("ready_state", &self.ready_state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions() {
        let (conn, _rx) = ConnectionHandle::new(4);
        assert_eq!(conn.ready_state(), ReadyState::Connecting);
        conn.mark_open();
        assert!(conn.is_open());
        conn.mark_closing();
        assert_eq!(conn.ready_state(), ReadyState::Closing);
        conn.mark_open();
        assert_eq!(conn.ready_state(), ReadyState::Closing);
        conn.mark_closed();
        conn.mark_closing();
        assert_eq!(conn.ready_state(), ReadyState::Closed);
    }

    #[test]
    fn deliver_requires_open_state() {
        let (conn, _rx) = ConnectionHandle::new(4);
        let result = conn.deliver("hello");
        assert!(matches!(result, Err(RelayError::DeliveryFailure { .. })));
    }

    #[test]
    fn deliver_queues_frame() {
        let (conn, mut rx) = ConnectionHandle::new(4);
        conn.mark_open();
        assert!(conn.deliver("hello").is_ok());
        let Ok(frame) = rx.try_recv() else {
            panic!("expected queued frame");
        };
        assert_eq!(frame, "hello");
    }

    #[test]
    fn full_queue_is_a_delivery_failure() {
        let (conn, _rx) = ConnectionHandle::new(1);
        conn.mark_open();
        assert!(conn.deliver("one").is_ok());
        let Err(RelayError::DeliveryFailure { reason, .. }) = conn.deliver("two") else {
            panic!("expected delivery failure");
        };
        assert_eq!(reason, "outbound queue full");
    }

    #[test]
    fn dropped_receiver_is_a_delivery_failure() {
        let (conn, rx) = ConnectionHandle::new(4);
        conn.mark_open();
        drop(rx);
        assert!(conn.deliver("late").is_err());
    }

    #[tokio::test]
    async fn close_wakes_waiter_even_if_signalled_first() {
        let (conn, _rx) = ConnectionHandle::new(4);
        conn.mark_open();
        conn.close();
        assert!(!conn.is_open());
        tokio::time::timeout(std::time::Duration::from_secs(1), conn.closed())
            .await
            .unwrap_or_else(|_| panic!("close signal was lost"));
    }
}
