//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the synchronization core to external systems:
//! - `http` - REST case API client (reqwest)
//! - `websocket` - Push channel protocol and transport (tokio-tungstenite)
//! - `memory` - Scriptable in-memory ports for tests

pub mod http;
pub mod memory;
pub mod websocket;

pub use http::{HttpCaseApi, HttpCaseApiConfig};
pub use memory::{InMemoryCaseApi, InMemoryPushTransport, PushPeer};
pub use websocket::{InboundMessage, TungsteniteTransport};
