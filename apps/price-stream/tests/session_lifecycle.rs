//! Session Lifecycle Integration Tests
//!
//! Drives the client against an in-memory transport: initial subscription,
//! runtime reconciliation, heartbeat/reset frames, disconnects, server
//! closes, callback delivery and back-pressure from a slow callback.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use serde_json::json;

use common::{
    FakeTransport, client_with, collecting_callback, next_connection, next_event, test_config,
    wait_for_state,
};
use price_stream::{OutboundFrame, SessionState, normalize_symbols};

const SUBSCRIBE_AAPL_MSFT: &str = r#"{"action":"subscribe","params":{"symbols":"AAPL,MSFT"}}"#;

#[tokio::test]
async fn test_open_subscribes_all_desired_symbols_in_one_frame() {
    let (transport, mut connections) = FakeTransport::new(0);
    let client = client_with(test_config("msft, aapl"), &transport);

    client.connect().await;
    let mut conn = next_connection(&mut connections).await;
    wait_for_state(&client, SessionState::Ready).await;

    assert_eq!(conn.next_text().await, SUBSCRIBE_AAPL_MSFT);
    conn.expect_no_text(Duration::from_millis(100)).await;
    assert_eq!(client.subscribed_symbols(), normalize_symbols(["AAPL", "MSFT"]));
    assert_eq!(
        transport.urls(),
        vec!["wss://ws.twelvedata.com/v1/quotes/price?apikey=test-key"]
    );
}

#[tokio::test]
async fn test_subscribe_while_disconnected_touches_no_transport() {
    let (transport, mut connections) = FakeTransport::new(0);
    let client = client_with(test_config(""), &transport);

    client.subscribe("aapl");
    client.subscribe(vec!["MSFT"]);

    assert!(transport.attempts().is_empty());
    assert_eq!(client.state(), SessionState::Disconnected);
    assert_eq!(client.desired_symbols(), normalize_symbols(["AAPL", "MSFT"]));
    assert!(client.subscribed_symbols().is_empty());

    // Applied on the next open
    client.connect().await;
    let mut conn = next_connection(&mut connections).await;
    assert_eq!(conn.next_text().await, SUBSCRIBE_AAPL_MSFT);
}

#[tokio::test]
async fn test_heartbeat_is_noop_until_ready() {
    let (transport, mut connections) = FakeTransport::new(0);
    let client = client_with(test_config(""), &transport);

    assert!(!client.heartbeat());

    client.connect().await;
    let mut conn = next_connection(&mut connections).await;
    wait_for_state(&client, SessionState::Ready).await;

    assert!(client.heartbeat());
    assert_eq!(conn.next_text().await, r#"{"action":"heartbeat"}"#);
}

#[tokio::test]
async fn test_runtime_changes_send_only_the_difference() {
    let (transport, mut connections) = FakeTransport::new(0);
    let client = client_with(test_config("AAPL"), &transport);

    client.connect().await;
    let mut conn = next_connection(&mut connections).await;
    wait_for_state(&client, SessionState::Ready).await;
    let _ = conn.next_text().await;

    client.subscribe(["aapl", "tsla"]);
    assert_eq!(
        conn.next_text().await,
        r#"{"action":"subscribe","params":{"symbols":"TSLA"}}"#
    );

    client.unsubscribe("AAPL");
    assert_eq!(
        conn.next_text().await,
        r#"{"action":"unsubscribe","params":{"symbols":"AAPL"}}"#
    );

    // Already subscribed, nothing to send
    client.subscribe("TSLA");
    conn.expect_no_text(Duration::from_millis(100)).await;
    assert_eq!(client.subscribed_symbols(), normalize_symbols(["TSLA"]));
}

#[tokio::test]
async fn test_transport_error_rebuilds_subscription_from_desired() {
    let (transport, mut connections) = FakeTransport::new(0);
    let client = client_with(test_config("AAPL,MSFT"), &transport);

    client.connect().await;
    let mut first = next_connection(&mut connections).await;
    assert_eq!(first.next_text().await, SUBSCRIBE_AAPL_MSFT);

    client.subscribe("TSLA");
    let _ = first.next_text().await;

    first.fail();

    let mut second = next_connection(&mut connections).await;
    wait_for_state(&client, SessionState::Ready).await;
    assert_eq!(
        second.next_text().await,
        r#"{"action":"subscribe","params":{"symbols":"AAPL,MSFT,TSLA"}}"#
    );
    assert_eq!(transport.attempts().len(), 2);
    assert_eq!(
        client.subscribed_symbols(),
        normalize_symbols(["AAPL", "MSFT", "TSLA"])
    );
}

#[tokio::test]
async fn test_dropped_stream_triggers_recovery() {
    let (transport, mut connections) = FakeTransport::new(0);
    let client = client_with(test_config("AAPL"), &transport);

    client.connect().await;
    let first = next_connection(&mut connections).await;
    wait_for_state(&client, SessionState::Ready).await;

    drop(first);

    let mut second = next_connection(&mut connections).await;
    assert_eq!(
        second.next_text().await,
        r#"{"action":"subscribe","params":{"symbols":"AAPL"}}"#
    );
}

#[tokio::test]
async fn test_disconnect_closes_without_recovery() {
    let (transport, mut connections) = FakeTransport::new(0);
    let client = client_with(test_config("AAPL"), &transport);

    client.connect().await;
    let mut conn = next_connection(&mut connections).await;
    wait_for_state(&client, SessionState::Ready).await;
    let _ = conn.next_text().await;

    client.disconnect().await;

    assert_eq!(conn.next_frame().await, Some(OutboundFrame::Close));
    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(client.subscribed_symbols().is_empty());
    assert_eq!(client.desired_symbols(), normalize_symbols(["AAPL"]));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(connections.try_recv().is_err());
    assert_eq!(transport.attempts().len(), 1);
}

#[tokio::test]
async fn test_normal_server_close_stops_the_session() {
    let (transport, mut connections) = FakeTransport::new(0);
    let client = client_with(test_config("AAPL"), &transport);

    client.connect().await;
    let conn = next_connection(&mut connections).await;
    wait_for_state(&client, SessionState::Ready).await;

    conn.close(1000);
    wait_for_state(&client, SessionState::Disconnected).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(transport.attempts().len(), 1);
}

#[tokio::test]
async fn test_abnormal_server_close_recovers() {
    let (transport, mut connections) = FakeTransport::new(0);
    let client = client_with(test_config("AAPL"), &transport);

    client.connect().await;
    let first = next_connection(&mut connections).await;
    wait_for_state(&client, SessionState::Ready).await;

    first.close(1001);

    let _second = next_connection(&mut connections).await;
    wait_for_state(&client, SessionState::Ready).await;
    assert_eq!(transport.attempts().len(), 2);
}

#[tokio::test]
async fn test_connect_twice_replaces_previous_connection() {
    let (transport, mut connections) = FakeTransport::new(0);
    let client = client_with(test_config("AAPL"), &transport);

    client.connect().await;
    let mut first = next_connection(&mut connections).await;
    wait_for_state(&client, SessionState::Ready).await;
    let _ = first.next_text().await;

    client.connect().await;

    assert_eq!(first.next_frame().await, Some(OutboundFrame::Close));
    let mut second = next_connection(&mut connections).await;
    assert_eq!(
        second.next_text().await,
        r#"{"action":"subscribe","params":{"symbols":"AAPL"}}"#
    );
    assert_eq!(transport.attempts().len(), 2);
}

#[tokio::test]
async fn test_reset_clears_symbols_without_resubscribing() {
    let (transport, mut connections) = FakeTransport::new(0);
    let client = client_with(test_config("AAPL,MSFT"), &transport);

    client.connect().await;
    let mut conn = next_connection(&mut connections).await;
    wait_for_state(&client, SessionState::Ready).await;
    let _ = conn.next_text().await;

    client.reset();

    assert_eq!(conn.next_text().await, r#"{"action":"reset"}"#);
    conn.expect_no_text(Duration::from_millis(100)).await;
    assert!(client.desired_symbols().is_empty());
    assert!(client.subscribed_symbols().is_empty());

    client.subscribe("NVDA");
    assert_eq!(
        conn.next_text().await,
        r#"{"action":"subscribe","params":{"symbols":"NVDA"}}"#
    );
}

#[tokio::test]
async fn test_events_reach_callback_in_order() {
    let (transport, mut connections) = FakeTransport::new(0);
    let (config, mut events) = collecting_callback(test_config("AAPL"));
    let client = client_with(config, &transport);

    client.connect().await;
    let conn = next_connection(&mut connections).await;
    wait_for_state(&client, SessionState::Ready).await;

    for n in 0..100 {
        conn.push_text(&json!({"event": "price", "symbol": "AAPL", "price": n}).to_string());
    }

    for n in 0..100 {
        let event = next_event(&mut events).await;
        assert_eq!(event["price"], n);
    }
}

#[tokio::test]
async fn test_callback_failures_do_not_stop_delivery() {
    let (transport, mut connections) = FakeTransport::new(0);
    let (tx, mut seen) = tokio::sync::mpsc::unbounded_channel();
    let config = test_config("AAPL").with_on_event(move |event| {
        let n = event["n"].as_i64().unwrap_or_default();
        let _ = tx.send(n);
        match n {
            1 => anyhow::bail!("rejected by callback"),
            2 => panic!("callback bug"),
            _ => Ok(()),
        }
    });
    let client = client_with(config, &transport);

    client.connect().await;
    let conn = next_connection(&mut connections).await;
    wait_for_state(&client, SessionState::Ready).await;

    conn.push_text(r#"{"n":1}"#);
    conn.push_text(r#"{"n":2}"#);
    conn.push_text("not json at all");
    conn.push_text(r#"{"n":3}"#);

    for expected in 1..=3 {
        let n = tokio::time::timeout(common::WAIT, seen.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, expected);
    }
    assert_eq!(client.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_blocked_callback_does_not_stall_the_connection() {
    let (transport, mut connections) = FakeTransport::new(0);
    let gate = Arc::new(Barrier::new(2));
    let hold_first = Arc::new(AtomicBool::new(true));
    let (tx, mut seen) = tokio::sync::mpsc::unbounded_channel();
    let config = test_config("AAPL").with_max_queue_size(2).with_on_event({
        let gate = Arc::clone(&gate);
        move |event| {
            let _ = tx.send(event["n"].as_i64().unwrap_or_default());
            if hold_first.swap(false, Ordering::SeqCst) {
                gate.wait();
            }
            Ok(())
        }
    });
    let client = client_with(config, &transport);

    client.connect().await;
    let mut conn = next_connection(&mut connections).await;
    let _ = conn.next_text().await;
    wait_for_state(&client, SessionState::Ready).await;

    conn.push_text(r#"{"n":0}"#);
    let first = tokio::time::timeout(common::WAIT, seen.recv()).await.unwrap();
    assert_eq!(first, Some(0));

    // Callback is parked on the gate: two fit in the queue, three are dropped
    for n in 1..=5 {
        conn.push_text(&json!({ "n": n }).to_string());
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(client.state(), SessionState::Ready);
    assert!(client.heartbeat());
    assert_eq!(conn.next_text().await, r#"{"action":"heartbeat"}"#);
    client.subscribe("MSFT");
    assert_eq!(
        conn.next_text().await,
        r#"{"action":"subscribe","params":{"symbols":"MSFT"}}"#
    );
    assert!(seen.try_recv().is_err());

    tokio::task::spawn_blocking(move || {
        gate.wait();
    })
    .await
    .unwrap();

    conn.push_text(r#"{"n":6}"#);
    let mut delivered = Vec::new();
    for _ in 0..3 {
        let n = tokio::time::timeout(common::WAIT, seen.recv())
            .await
            .unwrap()
            .unwrap();
        delivered.push(n);
    }
    assert_eq!(delivered, vec![1, 2, 6]);
}
