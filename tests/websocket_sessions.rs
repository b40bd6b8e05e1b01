//! End-to-end tests for WebSocket routing and session lifecycle.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use oo_router::{demo, Dispatcher};

mod common;
use common::{assert_quiet, next_event, Event};

fn with_recorder() -> (Dispatcher, tokio::sync::mpsc::UnboundedReceiver<Event>) {
    let (factory, events) = common::recorder();
    (demo::root().ws_session("record", factory), events)
}

async fn next_text(client: &mut common::Client) -> String {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(1), client.next())
            .await
            .expect("timed out waiting for a message")
            .expect("connection ended")
            .expect("receive failed");
        if let Message::Text(text) = message {
            return text.to_string();
        }
    }
}

#[tokio::test]
async fn test_send_and_receive_messages() {
    let (dispatcher, mut events) = with_recorder();
    let server = common::start_server(dispatcher).await;
    let mut client = server.connect("/record").await;

    let out = match next_event(&mut events).await {
        Event::Started(out) => out,
        other => panic!("expected start, got {:?}", other),
    };

    client.send(Message::text("hello world")).await.unwrap();
    match next_event(&mut events).await {
        Event::Msg(msg) => assert_eq!(msg, "hello world"),
        other => panic!("expected message, got {:?}", other),
    }

    out.send_msg("Hello world!").unwrap();
    assert_eq!(next_text(&mut client).await, "Hello world!");

    client.close(None).await.unwrap();
    assert!(matches!(next_event(&mut events).await, Event::Closed(_, _)));
    assert_quiet(&mut events).await;
}

#[tokio::test]
async fn test_messages_arrive_in_order() {
    let (dispatcher, mut events) = with_recorder();
    let server = common::start_server(dispatcher).await;
    let mut client = server.connect("/record").await;
    assert!(matches!(next_event(&mut events).await, Event::Started(_)));

    for i in 0..20 {
        client.send(Message::text(format!("m{}", i))).await.unwrap();
    }
    for i in 0..20 {
        match next_event(&mut events).await {
            Event::Msg(msg) => assert_eq!(msg, format!("m{}", i)),
            other => panic!("expected message, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_stream_end_without_close_frame() {
    let (dispatcher, mut events) = with_recorder();
    let server = common::start_server(dispatcher).await;
    let client = server.connect("/record").await;
    assert!(matches!(next_event(&mut events).await, Event::Started(_)));

    // Drop the TCP connection without a close handshake.
    drop(client);

    match next_event(&mut events).await {
        Event::Closed(code, reason) => {
            assert_eq!(code, 0);
            assert_eq!(reason, None);
        }
        other => panic!("expected close, got {:?}", other),
    }
    assert_quiet(&mut events).await;
}

#[tokio::test]
async fn test_handler_initiated_close() {
    let (dispatcher, mut events) = with_recorder();
    let server = common::start_server(dispatcher).await;
    let mut client = server.connect("/record").await;

    let out = match next_event(&mut events).await {
        Event::Started(out) => out,
        other => panic!("expected start, got {:?}", other),
    };
    out.close(Some(4000), Some("done")).unwrap();

    let message = client.next().await.unwrap().unwrap();
    match message {
        Message::Close(Some(frame)) => {
            assert_eq!(u16::from(frame.code), 4000);
            assert_eq!(frame.reason.as_str(), "done");
        }
        other => panic!("expected close frame, got {:?}", other),
    }
    // Drain so the close reply is flushed.
    while client.next().await.is_some() {}

    assert!(matches!(next_event(&mut events).await, Event::Closed(_, _)));
    assert_quiet(&mut events).await;
}

#[tokio::test]
async fn test_hop_over_websocket() {
    let server = common::start_server(demo::root()).await;
    let mut client = server.connect("/hop/gato").await;

    assert_eq!(next_text(&mut client).await, "gato");
    client.close(None).await.unwrap();

    while let Some(message) = client.next().await {
        match message {
            Ok(Message::Text(text)) => panic!("unexpected second message {}", text),
            Ok(_) => {}
            Err(_) => break,
        }
    }
}

#[tokio::test]
async fn test_echo_session() {
    let server = common::start_server(demo::root()).await;
    let mut client = server.connect("/listen").await;

    client.send(Message::text("marco")).await.unwrap();
    assert_eq!(next_text(&mut client).await, "marco");
}

#[tokio::test]
async fn test_unrouted_upgrade_closes_with_code() {
    let server = common::start_server(demo::root()).await;

    let mut client = server.connect("/nowhere").await;
    match client.next().await.unwrap().unwrap() {
        Message::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 4404),
        other => panic!("expected close frame, got {:?}", other),
    }

    // A plain-value route cannot serve a websocket.
    let mut client = server.connect("/echo?ping=a&pong=b").await;
    match client.next().await.unwrap().unwrap() {
        Message::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 1011),
        other => panic!("expected close frame, got {:?}", other),
    }

    // The server keeps serving.
    let res = reqwest::get(server.url("/")).await.unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
}
