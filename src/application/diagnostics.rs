//! Internal counters for suppressed failures.
//!
//! Malformed frames, unknown message types and transport errors are hidden
//! from the user on purpose. These counters make that suppression
//! observable to operators and tests without adding user-facing noise.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free sync counters.
#[derive(Debug, Default)]
pub struct SyncDiagnostics {
    frames_received: AtomicU64,
    messages_dispatched: AtomicU64,
    malformed_messages: AtomicU64,
    unknown_messages: AtomicU64,
    detail_decode_failures: AtomicU64,
    transport_errors: AtomicU64,
    reconnects_scheduled: AtomicU64,
    stale_results_discarded: AtomicU64,
    fetch_failures: AtomicU64,
}

/// Point-in-time copy of [`SyncDiagnostics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticsSnapshot {
    pub frames_received: u64,
    pub messages_dispatched: u64,
    pub malformed_messages: u64,
    pub unknown_messages: u64,
    pub detail_decode_failures: u64,
    pub transport_errors: u64,
    pub reconnects_scheduled: u64,
    pub stale_results_discarded: u64,
    pub fetch_failures: u64,
}

impl SyncDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_received(&self) {
        bump(&self.frames_received);
    }

    pub fn message_dispatched(&self) {
        bump(&self.messages_dispatched);
    }

    pub fn malformed_message(&self) {
        bump(&self.malformed_messages);
    }

    pub fn unknown_message(&self) {
        bump(&self.unknown_messages);
    }

    pub fn detail_decode_failure(&self) {
        bump(&self.detail_decode_failures);
    }

    pub fn transport_error(&self) {
        bump(&self.transport_errors);
    }

    pub fn reconnect_scheduled(&self) {
        bump(&self.reconnects_scheduled);
    }

    pub fn stale_result_discarded(&self) {
        bump(&self.stale_results_discarded);
    }

    pub fn fetch_failure(&self) {
        bump(&self.fetch_failures);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            frames_received: load(&self.frames_received),
            messages_dispatched: load(&self.messages_dispatched),
            malformed_messages: load(&self.malformed_messages),
            unknown_messages: load(&self.unknown_messages),
            detail_decode_failures: load(&self.detail_decode_failures),
            transport_errors: load(&self.transport_errors),
            reconnects_scheduled: load(&self.reconnects_scheduled),
            stale_results_discarded: load(&self.stale_results_discarded),
            fetch_failures: load(&self.fetch_failures),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

fn load(counter: &AtomicU64) -> u64 {
    counter.load(Ordering::Relaxed)
}
