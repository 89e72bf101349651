//! Service layer: inbound forwarding and outbound broadcast.

pub mod broadcaster;
pub mod inbound;

pub use broadcaster::OutboundBroadcaster;
pub use inbound::InboundHandler;
