//! In-process [`EngineSource`] for hosts without an engine of their own.
//!
//! Messages handed to [`LocalEngine::send`] are published on a
//! [`tokio::sync::broadcast`] inbox; events pushed through
//! [`LocalEngine::emit`] are delivered synchronously to every subscribed
//! handler, in registration order.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::engine::{EngineEvent, EngineSource, EventHandler};
use crate::error::RelayError;

/// Task ID carried by events produced in echo mode.
pub const ECHO_TASK_ID: &str = "echo";

/// Local engine backed by a broadcast inbox and a handler list.
pub struct LocalEngine {
    ready: AtomicBool,
    handlers: Mutex<Vec<EventHandler>>,
    inbox: broadcast::Sender<String>,
}

impl LocalEngine {
    /// Creates a ready engine whose inbox holds up to `capacity` messages
    /// for lagging readers.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (inbox, _) = broadcast::channel(capacity.max(1));
        Self {
            ready: AtomicBool::new(true),
            handlers: Mutex::new(Vec::new()),
            inbox,
        }
    }

    /// Marks the engine ready or unavailable.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Pushes an event to every subscribed handler.
    ///
    /// Returns the number of handlers invoked.
    pub fn emit(&self, event: EngineEvent) -> usize {
        let handlers: Vec<EventHandler> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for handler in &handlers {
            handler(event.clone());
        }
        handlers.len()
    }

    /// Creates a receiver for every message subsequently sent into the engine.
    #[must_use]
    pub fn inbox(&self) -> broadcast::Receiver<String> {
        self.inbox.subscribe()
    }

    /// Returns the number of registered event handlers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Spawns a task that turns every sent message into a `text` event.
    pub fn spawn_echo(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let mut inbox = self.inbox();
        tokio::spawn(async move {
            loop {
                match inbox.recv().await {
                    Ok(text) => {
                        let _ = engine.emit(EngineEvent::say(ECHO_TASK_ID, "text", text));
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "echo task lagged behind engine inbox");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl fmt::Debug for LocalEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalEngine")
            .field("ready", &self.ready.load(Ordering::SeqCst))
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl EngineSource for LocalEngine {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn subscribe(&self, handler: EventHandler) -> Result<(), RelayError> {
        if !self.is_ready() {
            return Err(RelayError::EngineUnavailable(
                "local engine is not ready".to_string(),
            ));
        }
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
        Ok(())
    }

    fn send(&self, text: &str) -> Result<(), RelayError> {
        if !self.is_ready() {
            return Err(RelayError::EngineUnavailable(
                "local engine is not ready".to_string(),
            ));
        }
        // Dropped when nobody reads the inbox.
        let _ = self.inbox.send(text.to_string());
        Ok(())
    }
}
