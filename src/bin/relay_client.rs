//! Interactive terminal client for engine-relay.
//!
//! Reads lines from stdin and sends each as an inbound envelope; prints
//! every frame the relay pushes back. Reasoning messages are dimmed.

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use engine_relay::config::DEFAULT_PORT;
use engine_relay::envelope::{InboundEnvelope, OutboundEnvelope};

/// engine-relay terminal client.
#[derive(Debug, Parser)]
#[command(name = "relay-client")]
#[command(about = "Send messages to an engine-relay and watch its broadcasts")]
#[command(version)]
struct Cli {
    /// Relay host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Relay port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let url = format!("ws://{}:{}/", cli.host, cli.port);

    let (socket, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("WebSocket dial error: {url}"))?;
    println!("Connected to {url}");
    println!("Enter messages to send. Ctrl+D to exit.");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(text) = line.context("stdin read error")? else { break };
                let frame = envelope_frame(text)?;
                ws_tx.send(Message::text(frame)).await.context("write error")?;
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => println!("{}", render_frame(text.as_str())),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e).context("read error"),
                }
            }
        }
    }

    let _ = ws_tx.close().await;
    println!("Disconnected.");
    Ok(())
}

/// Wraps one line of input in an inbound envelope stamped with the current
/// time.
fn envelope_frame(message: String) -> anyhow::Result<String> {
    let envelope = InboundEnvelope {
        message,
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    };
    serde_json::to_string(&envelope).context("JSON marshal error")
}

/// Renders a frame from the relay for the terminal.
fn render_frame(text: &str) -> String {
    match serde_json::from_str::<OutboundEnvelope>(text) {
        Ok(env) if env.is_reasoning => format!("\x1b[90m{}\x1b[0m", env.message),
        Ok(env) => env.message,
        Err(_) => text.to_string(),
    }
}
