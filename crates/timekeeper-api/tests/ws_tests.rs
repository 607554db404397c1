//! `WebSocket` round trips against a served router.
//!
//! Unlike `api_tests.rs` these need a real TCP listener, since the upgrade
//! handshake cannot go through `oneshot`.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use timekeeper_api::router::build_router;
use timekeeper_api::state::AppState;
use timekeeper_core::Timekeeper;
use timekeeper_core::config::TimekeeperConfig;
use timekeeper_core::manual::{ManualClock, ManualScheduler};
use timekeeper_core::sink::{BroadcastSink, EventSink};
use timekeeper_core::timer::Scheduler;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

/// 2024-01-01T00:00:00Z.
const NEW_YEAR_2024: i64 = 1_704_067_200_000;

const DEADLINE: Duration = Duration::from_secs(5);

type Client =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn serve() -> (Arc<AppState>, Client) {
    let mut config = TimekeeperConfig::default();
    config.clock.start_date = "2024-01-01 00:00:00".to_owned();
    config.clock.zip_factor = "x4".to_owned();
    config.clock.timezone_name = "UTC".to_owned();

    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let scheduler = Arc::new(ManualScheduler::new(Arc::clone(&clock)));
    let sink = Arc::new(BroadcastSink::new(64));
    let keeper = Timekeeper::new(
        &config,
        scheduler as Arc<dyn Scheduler>,
        clock,
        Arc::clone(&sink) as Arc<dyn EventSink>,
    );
    keeper.init().unwrap();
    let state = Arc::new(AppState::new(keeper, &sink));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = build_router(Arc::clone(&state));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws/events"))
        .await
        .unwrap();
    (state, client)
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(DEADLINE, client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn control_calls_stream_to_websocket_clients() {
    let (state, mut client) = serve().await;

    state.keeper.start_time().unwrap();

    let tic = next_json(&mut client).await;
    assert_eq!(tic["type"], "tic");
    assert_eq!(tic["command"], "START");
    assert_eq!(tic["status"], "RUNNING");
    assert_eq!(tic["timestamp"], NEW_YEAR_2024);

    let daylight = next_json(&mut client).await;
    assert_eq!(daylight["type"], "daylight");
    assert_eq!(daylight["key"], "isDaytime");
    assert_eq!(daylight["value"], false);

    state.keeper.pause_time().unwrap();
    let pause = next_json(&mut client).await;
    assert_eq!(pause["command"], "PAUSE");
}

#[tokio::test]
async fn ping_is_answered_with_pong() {
    let (_state, mut client) = serve().await;

    client
        .send(Message::Ping(b"hello".to_vec().into()))
        .await
        .unwrap();
    let reply = tokio::time::timeout(DEADLINE, client.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(reply, Message::Pong(b"hello".to_vec().into()));

    client.close(None).await.unwrap();
}
