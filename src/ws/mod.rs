//! WebSocket transport: upgrade handling and the per-connection loop.
//!
//! `GET /` upgrades to a WebSocket. Every text or binary frame is one
//! inbound envelope; broadcast envelopes are pushed to the client
//! unsolicited.

pub mod connection;
pub mod handler;
