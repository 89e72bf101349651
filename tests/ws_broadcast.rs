//! End-to-end tests for the WebSocket transport and broadcast fan-out.

#![allow(clippy::panic)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use engine_relay::RelayServer;
use engine_relay::domain::{
    EngineEvent, EngineMessage, EngineSource, LocalEngine, Logger, MemoryLogger,
};

const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
const WAIT: Duration = Duration::from_secs(2);

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start() -> (Arc<LocalEngine>, RelayServer, SocketAddr) {
    let engine = Arc::new(LocalEngine::default());
    let logger: Arc<dyn Logger> = Arc::new(MemoryLogger::new());
    let Ok(server) = RelayServer::new(Arc::clone(&engine) as Arc<dyn EngineSource>, logger) else {
        panic!("server construction failed");
    };
    let Ok(addr) = server.start(0, LOOPBACK).await else {
        panic!("server failed to start");
    };
    (engine, server, addr)
}

async fn connect(addr: SocketAddr) -> Client {
    let Ok((client, _)) = connect_async(format!("ws://{addr}/")).await else {
        panic!("websocket handshake failed");
    };
    client
}

/// Waits until the server has registered `count` connections.
async fn wait_for_connections(server: &RelayServer, count: usize) {
    let ready = tokio::time::timeout(WAIT, async {
        while server.connection_count().await != count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    if ready.is_err() {
        panic!("expected {count} registered connections");
    }
}

async fn next_text(client: &mut Client) -> String {
    let Ok(Some(Ok(Message::Text(text)))) = tokio::time::timeout(WAIT, client.next()).await else {
        panic!("expected a text frame");
    };
    text.as_str().to_string()
}

async fn expect_silence(client: &mut Client) {
    let result = tokio::time::timeout(Duration::from_millis(200), client.next()).await;
    assert!(result.is_err(), "unexpected frame: {result:?}");
}

#[tokio::test]
async fn reasoning_event_reaches_both_clients() {
    let (engine, server, addr) = start().await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    wait_for_connections(&server, 2).await;

    engine.emit(EngineEvent::say("1", "reasoning", "thinking..."));

    for client in [&mut a, &mut b] {
        assert_eq!(
            next_text(client).await,
            r#"{"is_reasoning":true,"message":"thinking..."}"#
        );
    }

    server.stop().await;
}

#[tokio::test]
async fn event_without_text_sends_nothing() {
    let (engine, server, addr) = start().await;
    let mut client = connect(addr).await;
    wait_for_connections(&server, 1).await;

    engine.emit(EngineEvent {
        task_id: "1".to_string(),
        action: None,
        message: EngineMessage::default(),
    });
    expect_silence(&mut client).await;

    server.stop().await;
}

#[tokio::test]
async fn inbound_frame_is_forwarded_without_ack() {
    let (engine, server, addr) = start().await;
    let mut inbox = engine.inbox();
    let mut client = connect(addr).await;

    let sent = client
        .send(Message::text(r#"{"message":"hi","time":"t1"}"#))
        .await;
    assert!(sent.is_ok());

    let Ok(Ok(text)) = tokio::time::timeout(WAIT, inbox.recv()).await else {
        panic!("engine did not receive message");
    };
    assert_eq!(text, "hi");
    expect_silence(&mut client).await;

    server.stop().await;
}

#[tokio::test]
async fn malformed_frame_is_answered_only_to_sender() {
    let (engine, server, addr) = start().await;
    let mut inbox = engine.inbox();
    let mut sender = connect(addr).await;
    let mut bystander = connect(addr).await;
    wait_for_connections(&server, 2).await;

    assert!(sender.send(Message::text("not-json")).await.is_ok());
    assert_eq!(next_text(&mut sender).await, "Invalid JSON");
    expect_silence(&mut bystander).await;
    assert!(inbox.try_recv().is_err());

    // The connection stays usable after a bad frame.
    assert!(
        sender
            .send(Message::text(r#"{"message":"again","time":"t2"}"#))
            .await
            .is_ok()
    );
    let Ok(Ok(text)) = tokio::time::timeout(WAIT, inbox.recv()).await else {
        panic!("engine did not receive follow-up message");
    };
    assert_eq!(text, "again");

    server.stop().await;
}

#[tokio::test]
async fn closed_client_is_unregistered_and_others_still_receive() {
    let (engine, server, addr) = start().await;
    let mut leaving = connect(addr).await;
    let mut staying = connect(addr).await;
    wait_for_connections(&server, 2).await;

    assert!(leaving.close(None).await.is_ok());
    wait_for_connections(&server, 1).await;

    engine.emit(EngineEvent::say("1", "text", "still here"));
    assert_eq!(
        next_text(&mut staying).await,
        r#"{"is_reasoning":false,"message":"still here"}"#
    );

    server.stop().await;
}

#[tokio::test]
async fn events_arrive_in_emission_order() {
    let (engine, server, addr) = start().await;
    let mut client = connect(addr).await;
    wait_for_connections(&server, 1).await;

    for text in ["one", "two", "three"] {
        engine.emit(EngineEvent::say("1", "text", text));
    }
    for expected in ["one", "two", "three"] {
        let frame = next_text(&mut client).await;
        assert!(frame.contains(expected), "{frame} before {expected}");
    }

    server.stop().await;
}

#[tokio::test]
async fn stop_closes_open_connections() {
    let (_engine, server, addr) = start().await;
    let mut client = connect(addr).await;
    wait_for_connections(&server, 1).await;

    server.stop().await;
    assert_eq!(server.connection_count().await, 0);

    let ended = tokio::time::timeout(WAIT, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "client socket was not closed");
}
