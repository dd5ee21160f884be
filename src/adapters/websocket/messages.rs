//! WebSocket message types for real-time case updates.
//!
//! Defines the protocol between the case server and this client:
//! - Server → Client: initial state, case updates, heartbeat replies
//! - Client → Server: the plain-text keepalive `ping`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::cases::{CaseSummary, PredictionDetail};

/// Text frame sent by the client as a keepalive. The server answers with
/// a `pong` message.
pub const PING_FRAME: &str = "ping";

// ============================================
// Server → Client Messages
// ============================================

/// All message types the server can push to the client.
///
/// Any `type` tag not listed here decodes as `Unknown` and is dropped by the
/// dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Full case collection, sent once after connecting.
    InitialState(InitialStateMessage),

    /// A single case changed, optionally with its full prediction detail.
    CaseUpdated(CaseUpdatedMessage),

    /// Heartbeat reply.
    Pong,

    #[serde(other)]
    Unknown,
}

/// Payload of `initial_state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialStateMessage {
    pub cases: Vec<CaseSummary>,
}

/// Payload of `case_updated`.
///
/// The detail is kept as raw JSON so that a detail which fails to decode
/// does not prevent the summary from being applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseUpdatedMessage {
    pub case: CaseSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl CaseUpdatedMessage {
    /// Decode the attached detail, if any.
    ///
    /// Returns `None` when no detail was attached (absent or `null`).
    pub fn decode_detail(&self) -> Option<Result<PredictionDetail, serde_json::Error>> {
        self.detail
            .as_ref()
            .map(|raw| PredictionDetail::deserialize(raw))
    }
}

impl InboundMessage {
    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// The wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::InitialState(_) => "initial_state",
            InboundMessage::CaseUpdated(_) => "case_updated",
            InboundMessage::Pong => "pong",
            InboundMessage::Unknown => "unknown",
        }
    }
}
