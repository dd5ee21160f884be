//! Push connection lifecycle and reconnection policy.

mod machine;
mod reconnect;
mod state;

pub use machine::{CloseAction, ConnectAction, ConnectionMachine, ConnectionSnapshot};
pub use reconnect::ReconnectPolicy;
pub use state::ConnectionState;
