//! The protocol engine (§2): peer lifecycle, master election, event
//! dispatch, and the two listening sockets. Built on a single-threaded
//! cooperative `tokio` runtime — every type here is `Rc`/`RefCell`, not
//! `Arc`/`Mutex`, because nothing in this crate is ever touched from more
//! than one thread.

mod acceptor;
mod app_handler;
pub mod config_map;
mod controller;
mod dispatcher;
mod discovery;
mod error;
mod handlers;
mod peer;
mod registry;
mod resolver;

pub use app_handler::{ApplicationHandler, NoopApplicationHandler, ReplySender};
pub use config_map::{ConfigMap, ConfigMapHandle, ConfigValue};
pub use controller::{Controller, CONTROL_PORT, DEFAULT_ALIVE_TIME_SECS, DISCOVERY_REPLY_PORT, DISCOVERY_REQUEST_PORT};
pub use error::SurrogateError;
pub use peer::{Peer, PeerHandle, PortStatus};
