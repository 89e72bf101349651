//! HTTP endpoint handlers.

pub mod message;
pub mod system;
