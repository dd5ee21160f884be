//! WebSocket adapters for the push channel.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Case server  (/ws)                              │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │
//!                                     │ text frames
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    TungsteniteTransport                              │
//! │   - Opens the socket, splits it into frame stream + sink            │
//! │   - Maps close codes onto clean / unclean                           │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │
//!                                     │ InboundFrame
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │               ConnectionManager → Dispatcher                         │
//! │   InboundMessage::parse → Store / Detail registry                   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`messages`] - WebSocket message protocol types
//! - [`transport`] - tokio-tungstenite `PushTransport` implementation

pub mod messages;
pub mod transport;

pub use messages::{CaseUpdatedMessage, InboundMessage, InitialStateMessage, PING_FRAME};
pub use transport::TungsteniteTransport;
