//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (verb, path, headers, body)
//!     → path.rs (tokenize, root fallback)
//!     → table.rs (lookup {verb}_{segment}, then any_{segment})
//!     → request.rs (payload: body or query)
//!     → engine.rs (invoke, follow delegations)
//!     → Return: value, session handler, or DispatchError
//! ```
//!
//! # Design Decisions
//! - Routes are registered explicitly; no runtime introspection
//! - A route delegates by returning another dispatcher (`Reply::Delegate`)
//! - Each hop consumes one path segment

pub mod engine;
pub mod path;
pub mod request;
pub mod session;
pub mod table;
pub mod types;

pub use engine::{dispatch_http, dispatch_ws, resolve, Resolution};
pub use request::Inbound;
pub use session::{MessageHandler, Outbound, OutboundMessage, SessionClosed};
pub use table::Dispatcher;
pub use types::{
    parse_payload, DispatchError, HandlerError, Payload, PublicRequest, Reply, RouteKey, Verb,
};
