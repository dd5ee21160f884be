//! In-memory adapters for tests and offline runs.

mod case_api;
mod push_transport;

pub use case_api::InMemoryCaseApi;
pub use push_transport::{InMemoryPushTransport, PushPeer};
