//! # engine-relay
//!
//! Bidirectional message relay between external clients and an in-process
//! conversational engine.
//!
//! Clients inject messages with a small JSON envelope, over a WebSocket or
//! a plain HTTP `POST`. The relay subscribes once to the engine's event
//! stream and broadcasts a transformed subset of those events to every open
//! WebSocket connection.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket, HTTP)
//!     │
//!     ├── Router (api/)  ──  WS connection loop (ws/)
//!     │
//!     ├── InboundHandler (service/)  ──▶  EngineSource::send
//!     ├── OutboundBroadcaster (service/)  ◀──  EngineSource::subscribe
//!     │
//!     ├── Envelope codec (envelope)
//!     └── ConnectionRegistry (domain/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod listener;
pub mod server;
pub mod service;
pub mod ws;

pub use error::RelayError;
pub use server::{RelayServer, ServerState};
