//! Integration tests for the `/ws` delivery endpoint
//!
//! Runs the router on a real socket and talks to it with a WebSocket client.

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tradesentient::config::Settings;
use tradesentient::core::http::create_router;
use tradesentient::core::runtime::ServiceContext;
use tradesentient::models::PriceTick;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn local_settings() -> Settings {
    Settings {
        short_window: 3,
        long_window: 5,
        coingecko_api_url: "http://127.0.0.1:9".to_string(),
        wikipedia_url: "http://127.0.0.1:9".to_string(),
        ..Settings::default()
    }
}

async fn spawn_server() -> (SocketAddr, Arc<ServiceContext>) {
    spawn_server_with(local_settings()).await
}

async fn spawn_server_with(settings: Settings) -> (SocketAddr, Arc<ServiceContext>) {
    let context = Arc::new(ServiceContext::local(settings).expect("service context"));
    let app = create_router(context.app_state());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, context)
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{}/ws", addr)).await.expect("connect");
    client
}

async fn next_text(client: &mut Client) -> String {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("timed out waiting for message")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = message {
            return text.to_string();
        }
    }
}

async fn send(client: &mut Client, text: &str) {
    client.send(Message::Text(text.into())).await.unwrap();
}

#[tokio::test]
async fn ping_is_answered_with_pong() {
    let (addr, context) = spawn_server().await;
    let mut client = connect(addr).await;

    send(&mut client, "ping").await;
    assert_eq!(next_text(&mut client).await, "pong");
    assert_eq!(context.registry.len(), 1);
}

#[tokio::test]
async fn subscribed_endpoint_only_receives_its_symbols() {
    let (addr, context) = spawn_server().await;
    let mut client = connect(addr).await;

    send(&mut client, r#"{"action":"subscribe","symbols":["BTC"]}"#).await;
    let reply: Value = serde_json::from_str(&next_text(&mut client).await).unwrap();
    assert_eq!(reply["type"], "subscribed");
    assert_eq!(reply["symbols"][0], "BTC");

    context.pipeline.ingest_tick(PriceTick::new("ETH", 250000.0)).await;
    context.pipeline.ingest_tick(PriceTick::new("BTC", 5000000.0)).await;

    let event: Value = serde_json::from_str(&next_text(&mut client).await).unwrap();
    assert_eq!(event["type"], "market");
    assert_eq!(event["symbol"], "BTC");
}

#[tokio::test]
async fn subscribe_all_restores_full_feed() {
    let (addr, context) = spawn_server().await;
    let mut client = connect(addr).await;

    send(&mut client, r#"{"action":"subscribe_add","symbol":"SOL"}"#).await;
    let reply: Value = serde_json::from_str(&next_text(&mut client).await).unwrap();
    assert_eq!(reply["symbol"], "SOL");

    send(&mut client, "not json").await;
    send(&mut client, r#"{"action":"subscribe_all"}"#).await;
    let reply: Value = serde_json::from_str(&next_text(&mut client).await).unwrap();
    assert_eq!(reply["symbols"], "all");

    context.pipeline.ingest_tick(PriceTick::new("ETH", 250000.0)).await;
    let event: Value = serde_json::from_str(&next_text(&mut client).await).unwrap();
    assert_eq!(event["symbol"], "ETH");
}

#[tokio::test]
async fn closed_endpoint_is_unregistered() {
    let (addr, context) = spawn_server().await;
    let mut client = connect(addr).await;

    send(&mut client, "ping").await;
    assert_eq!(next_text(&mut client).await, "pong");
    assert_eq!(context.registry.len(), 1);

    client.close(None).await.unwrap();
    drop(client);

    tokio::time::timeout(Duration::from_secs(2), async {
        while !context.registry.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("endpoint was not unregistered");
}

#[tokio::test]
async fn evicted_endpoint_receives_close_frame() {
    let (addr, context) = spawn_server_with(Settings {
        endpoint_buffer: 1,
        ..local_settings()
    })
    .await;
    let mut client = connect(addr).await;

    send(&mut client, "ping").await;
    assert_eq!(next_text(&mut client).await, "pong");

    // The client stops reading, so socket buffers fill and the queue overflows
    let payload = "x".repeat(1024 * 1024);
    let mut evicted = false;
    for _ in 0..10_000 {
        if !context.registry.deliver(&payload, None).evicted.is_empty() {
            evicted = true;
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(evicted, "endpoint was never evicted");
    assert!(context.registry.is_empty());

    let close = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(message) = client.next().await {
            match message {
                Ok(Message::Close(frame)) => return frame,
                Ok(_) => continue,
                Err(e) => panic!("websocket error before close frame: {}", e),
            }
        }
        panic!("stream ended without a close frame");
    })
    .await
    .expect("no close frame after eviction");

    let frame = close.expect("close frame carries a code");
    assert_eq!(frame.code, CloseCode::Again);
    assert_eq!(frame.reason.as_str(), "endpoint evicted");
}
