//! engine-relay server entry point.
//!
//! Starts the relay on loopback against an in-process engine. With
//! `RELAY_ECHO=true` every message sent into the engine is broadcast back.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use engine_relay::config::RelayConfig;
use engine_relay::domain::{EngineSource, LocalEngine, Logger, TracingLogger};
use engine_relay::server::{RelayServer, ServerState};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = RelayConfig::from_env();
    tracing::info!(addr = %config.listen_addr(), echo = config.echo, "starting engine-relay");

    let logger: Arc<dyn Logger> = Arc::new(TracingLogger::new(config.log_channel.clone()));
    let engine = Arc::new(LocalEngine::default());
    if config.echo {
        let _ = engine.spawn_echo();
    }

    let server = RelayServer::new(Arc::clone(&engine) as Arc<dyn EngineSource>, logger)?
        .with_outbound_buffer(config.outbound_buffer);

    if let Err(e) = server.start(config.port, config.host()).await {
        tracing::error!(error = %e, "failed to start relay");
        return Err(e.into());
    }

    let mut status = server.watch_status();
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("shutdown signal received");
        }
        _ = status.wait_for(|state| *state == ServerState::Stopped) => {
            tracing::warn!("relay stopped without a shutdown signal");
        }
    }
    server.stop().await;

    Ok(())
}
