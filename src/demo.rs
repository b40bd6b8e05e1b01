//! Sample dispatcher tree served by the `oo-router` binary.
//!
//! ```text
//! GET  /            → "Hello World!"
//! GET  /asd         → "world"
//! GET  /sub         → nested dispatcher, "sub"
//! ANY  /echo        → payload with "1" appended to `pong`
//! ANY  /hop/<name>  → child dispatcher: GET → name, WS → sends name once
//! GET  /ct          → request content type
//! WS   /listen      → echoes every message back
//! ```

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::dispatch::{
    parse_payload, Dispatcher, HandlerError, MessageHandler, Outbound, PublicRequest, Reply,
};

/// Body of the echo route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingPong {
    pub ping: String,
    pub pong: String,
}

/// The root dispatcher.
pub fn root() -> Dispatcher {
    Dispatcher::named("demo")
        .get("", |_, _| async { Reply::json("Hello World!") })
        .get("asd", |_, _| async { Reply::json("world") })
        .get("sub", |_, req| async move { Ok(Reply::delegate(sub(), req)) })
        .any("echo", |payload, _| async move {
            let mut obj: PingPong = parse_payload(payload)?;
            obj.pong.push('1');
            Reply::json(obj)
        })
        .any("hop", |_, mut req: PublicRequest| async move {
            let name = req
                .next_segment()
                .ok_or_else(|| HandlerError::msg("hop requires a name segment"))?;
            Ok(Reply::delegate(hop(name), req))
        })
        .get("ct", |_, req| async move { Reply::json(req.header("content-type")) })
        .ws_session("listen", EchoSession::default)
}

fn sub() -> Dispatcher {
    Dispatcher::named("sub").get("", |_, _| async { Reply::json("sub") })
}

/// Child dispatcher parameterized by the hop segment.
pub fn hop(name: String) -> Dispatcher {
    let ws_name = name.clone();
    Dispatcher::named("hop")
        .get("", move |_, _| {
            let name = name.clone();
            async move { Reply::json(name) }
        })
        .ws("", move |_, _| {
            let name = ws_name.clone();
            async move { Ok(Reply::session(Announce { name })) }
        })
}

/// Sends its name once the connection is live.
struct Announce {
    name: String,
}

impl MessageHandler for Announce {
    fn start(&mut self, out: Outbound) {
        if let Err(e) = out.send_msg(self.name.clone()) {
            tracing::debug!(error = %e, "Hop announcement dropped");
        }
    }
}

/// Sends every received message back to the client.
#[derive(Default)]
pub struct EchoSession {
    out: Option<Outbound>,
}

impl MessageHandler for EchoSession {
    fn start(&mut self, out: Outbound) {
        self.out = Some(out);
    }

    fn msg(&mut self, msg: String) -> BoxFuture<'_, Result<(), HandlerError>> {
        Box::pin(async move {
            let out = self
                .out
                .as_ref()
                .ok_or_else(|| HandlerError::msg("session not started"))?;
            out.send_msg(msg).map_err(|e| HandlerError::msg(e.to_string()))
        })
    }
}
