//! Dispatcher - routes push messages to the store and the detail registry.
//!
//! | Message | Effect |
//! |---------|--------|
//! | `initial_state` | `CaseStore::replace_all(cases)` |
//! | `case_updated` | `CaseStore::upsert(case)`, then publish the detail if one decoded |
//! | `pong` | none |
//! | anything else | dropped |
//!
//! Frames that are not valid JSON, or that do not match their declared
//! type, are dropped without reaching the user. Each drop is logged at
//! `debug` and counted in [`SyncDiagnostics`].

use std::sync::Arc;

use crate::adapters::websocket::InboundMessage;
use crate::domain::cases::UpsertOutcome;
use crate::domain::foundation::CaseId;

use super::{CaseStore, DetailUpdateRegistry, SyncDiagnostics};

/// What a dispatched frame did, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The collection was replaced with `count` cases.
    Replaced { count: usize },
    /// One case was upserted; `notified` detail callbacks ran.
    Upserted {
        case_id: CaseId,
        outcome: UpsertOutcome,
        notified: usize,
    },
    /// Heartbeat reply.
    Heartbeat,
    /// Unknown message type.
    Ignored,
    /// Not valid JSON or not a valid message.
    Malformed,
}

/// Routes decoded push messages.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: Arc<CaseStore>,
    registry: DetailUpdateRegistry,
    diagnostics: Arc<SyncDiagnostics>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<CaseStore>,
        registry: DetailUpdateRegistry,
        diagnostics: Arc<SyncDiagnostics>,
    ) -> Self {
        Self {
            store,
            registry,
            diagnostics,
        }
    }

    /// Parse and route one text frame.
    pub fn dispatch_text(&self, text: &str) -> DispatchOutcome {
        match InboundMessage::parse(text) {
            Ok(message) => self.dispatch(message),
            Err(e) => {
                self.diagnostics.malformed_message();
                tracing::debug!(error = %e, len = text.len(), "dropping malformed push frame");
                DispatchOutcome::Malformed
            }
        }
    }

    /// Route one decoded message.
    pub fn dispatch(&self, message: InboundMessage) -> DispatchOutcome {
        let outcome = match message {
            InboundMessage::InitialState(payload) => {
                let count = payload.cases.len();
                self.store.replace_all(payload.cases);
                DispatchOutcome::Replaced { count }
            }
            InboundMessage::CaseUpdated(payload) => {
                let detail = match payload.decode_detail() {
                    Some(Ok(detail)) => Some(Arc::new(detail)),
                    Some(Err(e)) => {
                        self.diagnostics.detail_decode_failure();
                        tracing::debug!(
                            case_id = %payload.case.case_id,
                            error = %e,
                            "case update carried an unreadable detail"
                        );
                        None
                    }
                    None => None,
                };

                let case_id = payload.case.case_id.clone();
                let outcome = self.store.upsert(payload.case);
                let notified = detail
                    .map(|d| self.registry.publish(&case_id, &d))
                    .unwrap_or(0);

                DispatchOutcome::Upserted {
                    case_id,
                    outcome,
                    notified,
                }
            }
            InboundMessage::Pong => DispatchOutcome::Heartbeat,
            InboundMessage::Unknown => {
                self.diagnostics.unknown_message();
                tracing::debug!("dropping push message of unknown type");
                return DispatchOutcome::Ignored;
            }
        };

        self.diagnostics.message_dispatched();
        outcome
    }
}
