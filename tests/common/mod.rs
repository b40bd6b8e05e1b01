//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use oo_router::dispatch::HandlerError;
use oo_router::{Dispatcher, HttpServer, MessageHandler, Outbound, ServerConfig, Shutdown};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A server running on an ephemeral port; shut down on drop.
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn connect(&self, path: &str) -> Client {
        let (client, _) = connect_async(format!("ws://{}{}", self.addr, path))
            .await
            .expect("websocket handshake failed");
        client
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Serve `dispatcher` with default configuration.
pub async fn start_server(dispatcher: Dispatcher) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(ServerConfig::default(), dispatcher);
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    TestServer { addr, shutdown }
}

/// Lifecycle events observed by a [`Recorder`].
#[derive(Debug)]
pub enum Event {
    Started(Outbound),
    Msg(String),
    Closed(u16, Option<String>),
}

/// Message handler that reports every lifecycle call.
pub struct Recorder {
    events: mpsc::UnboundedSender<Event>,
}

impl MessageHandler for Recorder {
    fn start(&mut self, out: Outbound) {
        let _ = self.events.send(Event::Started(out));
    }

    fn msg(&mut self, msg: String) -> BoxFuture<'_, Result<(), HandlerError>> {
        Box::pin(async move {
            let _ = self.events.send(Event::Msg(msg));
            Ok(())
        })
    }

    fn closed(&mut self, code: u16, reason: Option<String>) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let _ = self.events.send(Event::Closed(code, reason));
        })
    }
}

/// A per-connection recorder factory and the receiver for its events.
pub fn recorder() -> (
    impl Fn() -> Recorder + Send + Sync + 'static,
    mpsc::UnboundedReceiver<Event>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (move || Recorder { events: tx.clone() }, rx)
}

/// Next event, failing the test after a second.
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for handler event")
        .expect("event channel closed")
}

/// Assert nothing else arrives for a short while.
pub async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<Event>) {
    if let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
        panic!("unexpected handler event: {:?}", event);
    }
}
