//! Diagnostic line sink injected into relay components.

use std::fmt;
use std::sync::Mutex;

/// Append-only sink for human-readable diagnostic lines.
///
/// Implementations must not block and must not fail observably.
pub trait Logger: Send + Sync + fmt::Debug {
    /// Appends one line.
    fn append_line(&self, line: &str);
}

/// [`Logger`] that forwards every line to `tracing` at `INFO`.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    channel: String,
}

impl TracingLogger {
    /// Creates a logger tagging its lines with `channel`.
    #[must_use]
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
        }
    }
}

impl Logger for TracingLogger {
    fn append_line(&self, line: &str) {
        tracing::info!(channel = %self.channel, "{line}");
    }
}

/// [`Logger`] that keeps every line in memory.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    lines: Mutex<Vec<String>>,
}

impl MemoryLogger {
    /// Creates an empty logger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every line appended so far.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Returns `true` if any line contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

impl Logger for MemoryLogger {
    fn append_line(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(line.to_string());
    }
}
