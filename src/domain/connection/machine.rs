//! Reconnection state machine for the push channel.
//!
//! The machine is pure: every input returns the action the caller must take
//! (open a socket, arm a timer, give up) and no timer or socket is touched
//! here. Each connection attempt carries an epoch so that events from a
//! superseded attempt are ignored.
//!
//! ## Transitions
//!
//! ```text
//! connect()          Disconnected -> Connecting            (no-op if active or disabled)
//! opened(epoch)      Connecting   -> Open, attempts = 0
//! closed(epoch, ok)  *            -> Disconnected
//!                    unclean && attempts < max  -> ScheduleReconnect(delay_for(attempts)), attempts += 1
//!                    unclean && attempts >= max -> GiveUp (live updates unavailable)
//! disconnect()       *            -> Disconnected, pending timer void, epoch bumped
//! ```

use serde::Serialize;
use std::time::Duration;

use super::{ConnectionState, ReconnectPolicy};
use crate::domain::foundation::StateMachine;

/// Result of asking the machine to connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectAction {
    /// Open a new transport connection tagged with this epoch.
    Open { epoch: u64 },
    /// A connection is already connecting or open.
    AlreadyActive,
    /// The push channel is administratively disabled.
    Disabled,
    /// A scheduled reconnect fired after it was superseded.
    Stale,
}

/// Result of reporting a connection close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
    /// Arm a timer; when it fires call `scheduled_connect(epoch)`.
    ScheduleReconnect {
        delay: Duration,
        attempt: u32,
        epoch: u64,
    },
    /// Attempts exhausted; surface the fallback advisory.
    GiveUp,
    /// Clean close or an event from a superseded attempt.
    Nothing,
}

/// Observable view of the connection, published to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    pub attempts: u32,
    pub reconnect_scheduled: bool,
    /// Set once automatic reconnection has given up.
    pub live_updates_unavailable: bool,
    /// Last transport error, recorded only in diagnostic mode.
    pub connection_error: Option<String>,
    pub push_enabled: bool,
}

impl ConnectionSnapshot {
    /// Persistent advisory to show while live updates are unavailable.
    pub fn advisory(&self) -> Option<&'static str> {
        if self.live_updates_unavailable {
            Some("Live updates unavailable. Falling back to periodic refresh.")
        } else {
            None
        }
    }
}

/// Pure reconnection state machine.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    policy: ReconnectPolicy,
    enabled: bool,
    diagnostic_mode: bool,
    state: ConnectionState,
    attempts: u32,
    epoch: u64,
    reconnect_pending: bool,
    exhausted: bool,
    connection_error: Option<String>,
}

impl ConnectionMachine {
    pub fn new(policy: ReconnectPolicy, enabled: bool, diagnostic_mode: bool) -> Self {
        Self {
            policy,
            enabled,
            diagnostic_mode,
            state: ConnectionState::Disconnected,
            attempts: 0,
            epoch: 0,
            reconnect_pending: false,
            exhausted: false,
            connection_error: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Explicit connect request from a consumer.
    ///
    /// Restarts the reconnection flow after exhaustion.
    pub fn connect(&mut self) -> ConnectAction {
        if !self.enabled {
            return ConnectAction::Disabled;
        }
        if self.state.is_active() {
            return ConnectAction::AlreadyActive;
        }
        if self.exhausted {
            self.exhausted = false;
            self.attempts = 0;
        }
        self.begin_connect()
    }

    /// Connect request from a reconnect timer armed under `epoch`.
    pub fn scheduled_connect(&mut self, epoch: u64) -> ConnectAction {
        if epoch != self.epoch || !self.reconnect_pending {
            return ConnectAction::Stale;
        }
        if !self.enabled {
            return ConnectAction::Disabled;
        }
        if self.state.is_active() {
            return ConnectAction::AlreadyActive;
        }
        self.begin_connect()
    }

    fn begin_connect(&mut self) -> ConnectAction {
        self.reconnect_pending = false;
        self.epoch += 1;
        self.move_to(ConnectionState::Connecting);
        ConnectAction::Open { epoch: self.epoch }
    }

    /// The transport finished opening. Returns false for a superseded attempt.
    pub fn opened(&mut self, epoch: u64) -> bool {
        if epoch != self.epoch || self.state != ConnectionState::Connecting {
            return false;
        }
        self.move_to(ConnectionState::Open);
        self.attempts = 0;
        self.exhausted = false;
        self.connection_error = None;
        true
    }

    /// A transport-level error was observed. Never schedules reconnection.
    ///
    /// Returns true when the error was recorded in the snapshot.
    pub fn transport_error(&mut self, epoch: u64, message: impl Into<String>) -> bool {
        if epoch != self.epoch || !self.diagnostic_mode {
            return false;
        }
        self.connection_error = Some(message.into());
        true
    }

    /// The connection closed. `clean` marks an intentional or normal close.
    pub fn closed(&mut self, epoch: u64, clean: bool) -> CloseAction {
        if epoch != self.epoch || !self.state.is_active() {
            return CloseAction::Nothing;
        }
        self.move_to(ConnectionState::Disconnected);

        if clean {
            return CloseAction::Nothing;
        }

        if self.policy.allows_attempt(self.attempts) {
            let delay = self.policy.delay_for(self.attempts);
            self.attempts += 1;
            self.reconnect_pending = true;
            CloseAction::ScheduleReconnect {
                delay,
                attempt: self.attempts,
                epoch: self.epoch,
            }
        } else {
            self.exhausted = true;
            CloseAction::GiveUp
        }
    }

    /// Intentional teardown. Voids any pending reconnect and live attempt.
    ///
    /// Returns the state the machine was in.
    pub fn disconnect(&mut self) -> ConnectionState {
        let previous = self.state;
        self.epoch += 1;
        self.reconnect_pending = false;
        if self.state.is_active() {
            self.move_to(ConnectionState::Disconnected);
        }
        previous
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            state: self.state,
            attempts: self.attempts,
            reconnect_scheduled: self.reconnect_pending,
            live_updates_unavailable: self.exhausted,
            connection_error: self.connection_error.clone(),
            push_enabled: self.enabled,
        }
    }

    fn move_to(&mut self, target: ConnectionState) {
        debug_assert!(
            self.state.can_transition_to(&target),
            "illegal connection transition {:?} -> {:?}",
            self.state,
            target
        );
        self.state = target;
    }
}
