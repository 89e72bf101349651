//! Set of currently open client connections.
//!
//! [`ConnectionRegistry`] stores one [`ConnectionHandle`] per open
//! connection behind a [`tokio::sync::RwLock`]. Broadcast iteration holds
//! the read lock for the whole pass and only performs non-blocking queue
//! pushes, so a removal either completes before the pass starts or waits
//! until it ends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use super::{ConnectionHandle, ConnectionId};
use crate::error::RelayError;

/// Registry of open connections.
///
/// # Invariants
///
/// - A handle is marked [`super::ReadyState::Closing`] before it is taken
///   out of the map, so a pass that is already running skips it.
/// - [`ConnectionRegistry::for_each_open`] only visits handles whose state
///   is `Open` at the instant they are visited.
/// - After [`ConnectionRegistry::close_all`] no connection is admitted until
///   [`ConnectionRegistry::reopen`] is called.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
    accepting: AtomicBool,
}

impl ConnectionRegistry {
    /// Creates an empty registry that admits connections.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            accepting: AtomicBool::new(true),
        }
    }

    /// Registers an open connection.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] if the registry has been closed, or
    /// if a connection with the same ID is already registered (should never
    /// happen with UUID v4).
    pub async fn add(&self, conn: ConnectionHandle) -> Result<ConnectionId, RelayError> {
        let id = conn.id();
        let mut map = self.connections.write().await;
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(RelayError::Internal(format!(
                "registry closed; connection {id} rejected"
            )));
        }
        if map.contains_key(&id) {
            return Err(RelayError::Internal(format!(
                "connection {id} already registered"
            )));
        }
        map.insert(id, conn);
        Ok(id)
    }

    /// Unregisters a connection. Returns `true` if it was registered.
    pub async fn remove(&self, conn: &ConnectionHandle) -> bool {
        conn.mark_closing();
        let removed = self.connections.write().await.remove(&conn.id()).is_some();
        conn.mark_closed();
        removed
    }

    /// Calls `f` once per connection that is open at the moment it is
    /// visited. Order is unspecified. Returns the number of visits.
    pub async fn for_each_open<F>(&self, mut f: F) -> usize
    where
        F: FnMut(&ConnectionHandle),
    {
        let map = self.connections.read().await;
        let mut visited = 0;
        for conn in map.values() {
            if conn.is_open() {
                f(conn);
                visited += 1;
            }
        }
        visited
    }

    /// Signals every registered connection to close, empties the registry
    /// and stops admitting new connections. Returns the number closed.
    pub async fn close_all(&self) -> usize {
        let mut map = self.connections.write().await;
        self.shut(&mut map)
    }

    /// Same as [`ConnectionRegistry::close_all`] without waiting for the
    /// lock. Returns `None` if a pass or a registration holds it.
    pub fn try_close_all(&self) -> Option<usize> {
        let mut map = self.connections.try_write().ok()?;
        Some(self.shut(&mut map))
    }

    fn shut(&self, map: &mut HashMap<ConnectionId, ConnectionHandle>) -> usize {
        self.accepting.store(false, Ordering::SeqCst);
        let count = map.len();
        for (_, conn) in map.drain() {
            conn.close();
        }
        count
    }

    /// Admits connections again after [`ConnectionRegistry::close_all`].
    pub fn reopen(&self) {
        self.accepting.store(true, Ordering::SeqCst);
    }

    /// Returns the number of registered connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Returns `true` if no connection is registered.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::ReadyState;

    fn open_conn() -> (ConnectionHandle, tokio::sync::mpsc::Receiver<String>) {
        let (conn, rx) = ConnectionHandle::new(8);
        conn.mark_open();
        (conn, rx)
    }

    #[tokio::test]
    async fn add_and_remove() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = open_conn();

        let result = registry.add(conn.clone()).await;
        assert!(result.is_ok());
        assert_eq!(registry.len().await, 1);

        assert!(registry.remove(&conn).await);
        assert!(registry.is_empty().await);
        assert_eq!(conn.ready_state(), ReadyState::Closed);
    }

    #[tokio::test]
    async fn duplicate_add_is_rejected() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = open_conn();
        let _ = registry.add(conn.clone()).await;
        assert!(registry.add(conn).await.is_err());
    }

    #[tokio::test]
    async fn remove_unknown_returns_false() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = open_conn();
        assert!(!registry.remove(&conn).await);
    }

    #[tokio::test]
    async fn for_each_open_skips_non_open() {
        let registry = ConnectionRegistry::new();
        let (open, _rx1) = open_conn();
        let (closing, _rx2) = open_conn();
        let (connecting, _rx3) = ConnectionHandle::new(8);
        closing.mark_closing();
        for conn in [&open, &closing, &connecting] {
            let _ = registry.add(conn.clone()).await;
        }

        let mut seen = Vec::new();
        let visited = registry.for_each_open(|conn| seen.push(conn.id())).await;
        assert_eq!(visited, 1);
        assert_eq!(seen, vec![open.id()]);
    }

    #[tokio::test]
    async fn closing_mid_iteration_skips_unvisited() {
        let registry = ConnectionRegistry::new();
        let mut conns = Vec::new();
        for _ in 0..3 {
            let (conn, rx) = open_conn();
            let _ = registry.add(conn.clone()).await;
            conns.push((conn, rx));
        }
        let handles: Vec<ConnectionHandle> = conns.iter().map(|(c, _)| c.clone()).collect();

        let mut delivered = 0;
        let visited = registry
            .for_each_open(|conn| {
                if conn.deliver("frame").is_ok() {
                    delivered += 1;
                }
                for other in &handles {
                    if other.id() != conn.id() {
                        other.mark_closing();
                    }
                }
            })
            .await;

        assert_eq!(visited, 1);
        assert_eq!(delivered, 1);
        let received: usize = conns
            .iter_mut()
            .map(|(_, rx)| usize::from(rx.try_recv().is_ok()))
            .sum();
        assert_eq!(received, 1);
    }

    #[tokio::test]
    async fn removed_connection_is_not_visited() {
        let registry = ConnectionRegistry::new();
        let (conn, mut rx) = open_conn();
        let _ = registry.add(conn.clone()).await;

        let visited = registry
            .for_each_open(|c| {
                let _ = c.deliver("before-remove");
            })
            .await;
        assert_eq!(visited, 1);

        assert!(registry.remove(&conn).await);
        let visited = registry
            .for_each_open(|c| {
                let _ = c.deliver("after-remove");
            })
            .await;
        assert_eq!(visited, 0);

        let Ok(frame) = rx.try_recv() else {
            panic!("expected first frame");
        };
        assert_eq!(frame, "before-remove");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_all_signals_and_clears() {
        let registry = ConnectionRegistry::new();
        let (a, _rx1) = open_conn();
        let (b, _rx2) = open_conn();
        let _ = registry.add(a.clone()).await;
        let _ = registry.add(b.clone()).await;

        assert_eq!(registry.close_all().await, 2);
        assert!(registry.is_empty().await);
        assert!(!a.is_open());
        assert!(!b.is_open());
    }

    #[tokio::test]
    async fn try_close_all_backs_off_while_locked() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = open_conn();
        let _ = registry.add(conn.clone()).await;

        let guard = registry.connections.read().await;
        assert_eq!(registry.try_close_all(), None);
        drop(guard);

        assert_eq!(registry.try_close_all(), Some(1));
        assert!(!conn.is_open());
        assert!(registry.add(conn).await.is_err());
    }

    #[tokio::test]
    async fn closed_registry_rejects_until_reopened() {
        let registry = ConnectionRegistry::new();
        registry.close_all().await;

        let (late, _rx) = open_conn();
        assert!(registry.add(late.clone()).await.is_err());

        registry.reopen();
        assert!(registry.add(late).await.is_ok());
    }
}
