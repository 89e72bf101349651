//! Domain layer: connections, the connection registry, and the
//! collaborator contracts for the engine and the diagnostic logger.

pub mod connection;
pub mod connection_id;
pub mod engine;
pub mod local_engine;
pub mod logger;
pub mod registry;

pub use connection::{ConnectionHandle, ReadyState};
pub use connection_id::ConnectionId;
pub use engine::{EngineEvent, EngineMessage, EngineSource, EventHandler, MessageAction};
pub use local_engine::LocalEngine;
pub use logger::{Logger, MemoryLogger, TracingLogger};
pub use registry::ConnectionRegistry;
