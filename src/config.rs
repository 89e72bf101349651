//! Relay configuration loaded from environment variables.
//!
//! All settings come from environment variables (or a `.env` file via
//! `dotenvy`). The bind host is not configurable: the relay only ever
//! listens on loopback.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Port the relay listens on when `RELAY_PORT` is not set.
pub const DEFAULT_PORT: u16 = 9421;

/// Default depth of each connection's outbound queue.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

/// Default channel name attached to relay log lines.
pub const DEFAULT_LOG_CHANNEL: &str = "engine-relay";

/// Top-level relay configuration.
///
/// Loaded once at startup via [`RelayConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// TCP port to listen on. `0` picks an ephemeral port.
    pub port: u16,

    /// Capacity of each connection's outbound frame queue.
    pub outbound_buffer: usize,

    /// Echo every message sent into the local engine back as an event.
    pub echo: bool,

    /// Channel name attached to relay log lines.
    pub log_channel: String,
}

impl RelayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Missing or unparsable values fall back to their defaults.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            port: parse_env("RELAY_PORT", DEFAULT_PORT),
            outbound_buffer: parse_env("RELAY_OUTBOUND_BUFFER", DEFAULT_OUTBOUND_BUFFER).max(1),
            echo: parse_env_bool("RELAY_ECHO", false),
            log_channel: std::env::var("RELAY_LOG_CHANNEL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOG_CHANNEL.to_string()),
        }
    }

    /// Bind host. Always loopback.
    #[must_use]
    pub const fn host(&self) -> IpAddr {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    /// Full socket address the relay binds to.
    #[must_use]
    pub const fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host(), self.port)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            echo: false,
            log_channel: DEFAULT_LOG_CHANNEL.to_string(),
        }
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    parse_bool(std::env::var(key).ok().as_deref(), default)
}

fn parse_bool(value: Option<&str>, default: bool) -> bool {
    match value.map(str::to_ascii_lowercase).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}
