//! ConnectionManager - owns the push channel lifecycle.
//!
//! Drives the pure [`ConnectionMachine`] with real sockets and timers:
//!
//! 1. `connect()` asks the machine for an epoch and spawns a connection task
//! 2. The task opens a [`PushChannel`] and pumps frames into the dispatcher
//! 3. When the channel ends, the machine decides whether to arm a reconnect
//!    timer, give up, or do nothing
//! 4. `disconnect()` bumps the epoch, signals the live task to close cleanly
//!    and aborts any pending reconnect timer
//!
//! ## Locking
//!
//! Lock order is machine → live connection. No lock is held across an
//! `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::adapters::websocket::PING_FRAME;
use crate::domain::connection::{
    CloseAction, ConnectAction, ConnectionMachine, ConnectionSnapshot, ConnectionState,
    ReconnectPolicy,
};
use crate::ports::{FrameSink, InboundFrame, PushChannel, PushTransport};

use super::{Dispatcher, SyncDiagnostics};

/// Settings for the push channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    /// WebSocket endpoint, e.g. `ws://localhost:8000/ws`.
    pub url: String,
    /// When false, `connect()` is a no-op and the app relies on polling.
    pub enabled: bool,
    pub policy: ReconnectPolicy,
    /// Interval for the client keepalive `ping`, if any.
    pub heartbeat: Option<Duration>,
    /// Record transport errors in the published snapshot.
    pub diagnostic_mode: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8000/ws".to_string(),
            enabled: true,
            policy: ReconnectPolicy::default(),
            heartbeat: None,
            diagnostic_mode: false,
        }
    }
}

struct LiveConnection {
    epoch: u64,
    outbound: mpsc::UnboundedSender<String>,
    shutdown: oneshot::Sender<()>,
}

/// Push channel owner.
///
/// # Panics
///
/// `connect()` spawns Tokio tasks and panics when called outside a Tokio
/// runtime.
pub struct ConnectionManager {
    settings: ConnectionSettings,
    transport: Arc<dyn PushTransport>,
    dispatcher: Dispatcher,
    diagnostics: Arc<SyncDiagnostics>,
    machine: Mutex<ConnectionMachine>,
    live: Mutex<Option<LiveConnection>>,
    reconnect_timer: Mutex<Option<JoinHandle<()>>>,
    status: watch::Sender<ConnectionSnapshot>,
}

impl ConnectionManager {
    pub fn new(
        settings: ConnectionSettings,
        transport: Arc<dyn PushTransport>,
        dispatcher: Dispatcher,
        diagnostics: Arc<SyncDiagnostics>,
    ) -> Arc<Self> {
        let machine =
            ConnectionMachine::new(settings.policy, settings.enabled, settings.diagnostic_mode);
        let (status, _) = watch::channel(machine.snapshot());

        Arc::new(Self {
            settings,
            transport,
            dispatcher,
            diagnostics,
            machine: Mutex::new(machine),
            live: Mutex::new(None),
            reconnect_timer: Mutex::new(None),
            status,
        })
    }

    /// Open the push channel.
    ///
    /// No-op while connecting or open, or when the channel is disabled.
    /// After automatic reconnection has given up, this restarts it with a
    /// fresh attempt budget.
    pub fn connect(self: &Arc<Self>) -> ConnectAction {
        let action = {
            let mut machine = self.lock_machine();
            let action = machine.connect();
            self.publish(&machine);
            action
        };

        match action {
            ConnectAction::Open { epoch } => {
                self.cancel_reconnect_timer();
                self.spawn_attempt(epoch);
            }
            ConnectAction::Disabled => {
                tracing::debug!("push channel disabled; relying on periodic refresh");
            }
            ConnectAction::AlreadyActive | ConnectAction::Stale => {}
        }
        action
    }

    /// Close the push channel intentionally.
    ///
    /// Cancels any pending reconnect; no reconnection follows.
    pub fn disconnect(&self) {
        let (previous, live) = {
            let mut machine = self.lock_machine();
            let previous = machine.disconnect();
            let live = self.lock_live().take();
            self.publish(&machine);
            (previous, live)
        };

        self.cancel_reconnect_timer();

        if let Some(live) = live {
            let _ = live.shutdown.send(());
        }
        tracing::info!(previous = %previous, "push channel disconnected");
    }

    /// Queue a text frame on the open channel.
    ///
    /// Returns false, dropping the frame, unless the channel is open.
    pub fn send(&self, text: impl Into<String>) -> bool {
        let machine = self.lock_machine();
        if !machine.state().is_open() {
            tracing::debug!(state = %machine.state(), "dropping outbound frame; channel not open");
            return false;
        }

        let live = self.lock_live();
        match live.as_ref() {
            Some(live) if live.epoch == machine.epoch() => live.outbound.send(text.into()).is_ok(),
            _ => false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.status.borrow().clone()
    }

    /// Receiver notified on every connection status change.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.status.subscribe()
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    // === Connection task ===

    fn spawn_attempt(self: &Arc<Self>, epoch: u64) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.run_connection(epoch).await;
        });
    }

    async fn run_connection(self: Arc<Self>, epoch: u64) {
        tracing::debug!(url = %self.settings.url, epoch, "opening push channel");

        let PushChannel { frames, mut sink } = match self.transport.connect(&self.settings.url).await
        {
            Ok(channel) => channel,
            Err(e) => {
                self.report_transport_error(epoch, &e.to_string());
                self.handle_close(epoch, false);
                return;
            }
        };

        let Some((outbound, shutdown)) = self.register_open(epoch) else {
            tracing::debug!(epoch, "push channel opened after being superseded; closing");
            if let Err(e) = sink.close().await {
                tracing::debug!(error = %e, "closing superseded push channel failed");
            }
            return;
        };
        tracing::info!(url = %self.settings.url, "push channel open");

        if let Some(clean) = self.pump(epoch, frames, sink, outbound, shutdown).await {
            self.clear_live(epoch);
            self.handle_close(epoch, clean);
        }
    }

    /// Runs the live channel. Returns `None` after a local disconnect,
    /// otherwise whether the channel ended cleanly.
    async fn pump(
        &self,
        epoch: u64,
        mut frames: BoxStream<'static, InboundFrame>,
        mut sink: Box<dyn FrameSink>,
        mut outbound: mpsc::UnboundedReceiver<String>,
        mut shutdown: oneshot::Receiver<()>,
    ) -> Option<bool> {
        let mut heartbeat = self.settings.heartbeat.map(|period| {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    if let Err(e) = sink.close().await {
                        tracing::debug!(error = %e, "push channel close failed");
                    }
                    return None;
                }

                Some(text) = outbound.recv() => {
                    if let Err(e) = sink.send_text(text).await {
                        self.report_transport_error(epoch, &e.to_string());
                        return Some(false);
                    }
                }

                _ = next_heartbeat(&mut heartbeat) => {
                    if let Err(e) = sink.send_text(PING_FRAME.to_string()).await {
                        self.report_transport_error(epoch, &e.to_string());
                        return Some(false);
                    }
                }

                frame = frames.next() => match frame {
                    Some(InboundFrame::Text(text)) => {
                        self.diagnostics.frame_received();
                        self.dispatcher.dispatch_text(&text);
                    }
                    Some(InboundFrame::Other) => {}
                    Some(InboundFrame::Closed { clean }) => {
                        tracing::info!(clean, "push channel closed by server");
                        return Some(clean);
                    }
                    Some(InboundFrame::Error(message)) => {
                        self.report_transport_error(epoch, &message);
                        return Some(false);
                    }
                    None => {
                        tracing::info!("push channel dropped");
                        return Some(false);
                    }
                },
            }
        }
    }

    fn register_open(
        &self,
        epoch: u64,
    ) -> Option<(mpsc::UnboundedReceiver<String>, oneshot::Receiver<()>)> {
        let mut machine = self.lock_machine();
        if !machine.opened(epoch) {
            return None;
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        *self.lock_live() = Some(LiveConnection {
            epoch,
            outbound: outbound_tx,
            shutdown: shutdown_tx,
        });
        self.publish(&machine);
        Some((outbound_rx, shutdown_rx))
    }

    fn clear_live(&self, epoch: u64) {
        let mut live = self.lock_live();
        if live.as_ref().map_or(false, |l| l.epoch == epoch) {
            *live = None;
        }
    }

    // === Reconnection ===

    fn handle_close(self: &Arc<Self>, epoch: u64, clean: bool) {
        let (action, attempts) = {
            let mut machine = self.lock_machine();
            let action = machine.closed(epoch, clean);
            self.publish(&machine);
            (action, machine.attempts())
        };

        match action {
            CloseAction::ScheduleReconnect {
                delay,
                attempt,
                epoch,
            } => {
                self.diagnostics.reconnect_scheduled();
                tracing::info!(
                    attempt,
                    max_attempts = self.settings.policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "push channel lost; reconnect scheduled"
                );
                self.arm_reconnect(delay, epoch);
            }
            CloseAction::GiveUp => {
                tracing::warn!(
                    attempts,
                    "live updates unavailable; falling back to periodic refresh"
                );
            }
            CloseAction::Nothing => {}
        }
    }

    fn arm_reconnect(self: &Arc<Self>, delay: Duration, epoch: u64) {
        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move {
            time::sleep(delay).await;
            manager.fire_reconnect(epoch);
        });

        if let Some(previous) = self.lock_timer().replace(handle) {
            previous.abort();
        }
    }

    fn fire_reconnect(self: &Arc<Self>, epoch: u64) {
        let action = {
            let mut machine = self.lock_machine();
            let action = machine.scheduled_connect(epoch);
            self.publish(&machine);
            action
        };

        match action {
            ConnectAction::Open { epoch } => self.spawn_attempt(epoch),
            ConnectAction::Stale => tracing::debug!(epoch, "ignoring superseded reconnect timer"),
            ConnectAction::AlreadyActive | ConnectAction::Disabled => {}
        }
    }

    fn cancel_reconnect_timer(&self) {
        if let Some(handle) = self.lock_timer().take() {
            handle.abort();
        }
    }

    // === Helpers ===

    fn report_transport_error(&self, epoch: u64, message: &str) {
        self.diagnostics.transport_error();
        tracing::debug!(epoch, error = message, "push transport error");

        let mut machine = self.lock_machine();
        if machine.transport_error(epoch, message) {
            self.publish(&machine);
        }
    }

    fn publish(&self, machine: &ConnectionMachine) {
        self.status.send_replace(machine.snapshot());
    }

    fn lock_machine(&self) -> MutexGuard<'_, ConnectionMachine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_live(&self) -> MutexGuard<'_, Option<LiveConnection>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.reconnect_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.settings.url)
            .field("status", &*self.status.borrow())
            .finish()
    }
}

async fn next_heartbeat(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryPushTransport;
    use crate::application::{CaseStore, DetailUpdateRegistry};
    use serde_json::json;

    struct Harness {
        manager: Arc<ConnectionManager>,
        transport: Arc<InMemoryPushTransport>,
        store: Arc<CaseStore>,
        diagnostics: Arc<SyncDiagnostics>,
    }

    fn harness(settings: ConnectionSettings) -> Harness {
        let transport = Arc::new(InMemoryPushTransport::new());
        let store = Arc::new(CaseStore::new());
        let diagnostics = Arc::new(SyncDiagnostics::new());
        let dispatcher = Dispatcher::new(
            Arc::clone(&store),
            DetailUpdateRegistry::new(),
            Arc::clone(&diagnostics),
        );
        let manager = ConnectionManager::new(
            settings,
            transport.clone(),
            dispatcher,
            Arc::clone(&diagnostics),
        );
        Harness {
            manager,
            transport,
            store,
            diagnostics,
        }
    }

    fn settings() -> ConnectionSettings {
        ConnectionSettings {
            url: "ws://test/ws".to_string(),
            diagnostic_mode: true,
            ..ConnectionSettings::default()
        }
    }

    /// Lets spawned tasks run until they are all idle.
    async fn settle() {
        time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn connect_opens_channel_and_dispatches_frames() {
        let h = harness(settings());
        let peer = h.transport.accept_next();

        assert!(matches!(h.manager.connect(), ConnectAction::Open { .. }));
        assert_eq!(h.manager.state(), ConnectionState::Connecting);
        settle().await;
        assert_eq!(h.manager.state(), ConnectionState::Open);
        assert_eq!(h.transport.connected_urls(), vec!["ws://test/ws".to_string()]);

        peer.send_json(&json!({
            "type": "initial_state",
            "cases": [{
                "caseId": "c1", "patientId": "PT-1", "displayName": "Patient 1",
                "riskCategory": "LOW", "strokeProbability": 0.1, "lvoProbability": 0.0,
                "isActive": true
            }]
        }));
        settle().await;

        assert_eq!(h.store.len(), 1);
        assert_eq!(h.diagnostics.snapshot().frames_received, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_while_active_is_noop() {
        let h = harness(settings());
        let _peer = h.transport.accept_next();

        h.manager.connect();
        assert_eq!(h.manager.connect(), ConnectAction::AlreadyActive);
        settle().await;
        assert_eq!(h.manager.connect(), ConnectAction::AlreadyActive);
        assert_eq!(h.transport.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_channel_never_connects() {
        let h = harness(ConnectionSettings {
            enabled: false,
            ..settings()
        });

        assert_eq!(h.manager.connect(), ConnectAction::Disabled);
        settle().await;
        assert_eq!(h.transport.connect_count(), 0);
        assert!(!h.manager.snapshot().push_enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_channel_reconnects_after_base_delay() {
        let h = harness(settings());
        let peer = h.transport.accept_next();
        let _second = h.transport.accept_next();

        h.manager.connect();
        settle().await;
        peer.drop_connection();
        settle().await;

        let snapshot = h.manager.snapshot();
        assert_eq!(snapshot.state, ConnectionState::Disconnected);
        assert!(snapshot.reconnect_scheduled);
        assert_eq!(snapshot.attempts, 1);

        time::sleep(Duration::from_millis(990)).await;
        assert_eq!(h.transport.connect_count(), 1);

        time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.transport.connect_count(), 2);
        assert_eq!(h.manager.state(), ConnectionState::Open);
        assert_eq!(h.manager.snapshot().attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn refused_connections_exhaust_after_max_attempts() {
        let h = harness(settings());

        h.manager.connect();
        // 1 + 2 + 4 + 8 + 10 * 6 seconds of backoff, plus slack.
        time::sleep(Duration::from_secs(80)).await;

        let snapshot = h.manager.snapshot();
        assert!(snapshot.live_updates_unavailable);
        assert!(snapshot.advisory().is_some());
        assert!(!snapshot.reconnect_scheduled);
        assert_eq!(h.transport.connect_count(), 11);
        assert_eq!(h.diagnostics.snapshot().reconnects_scheduled, 10);

        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(h.transport.connect_count(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_connect_after_exhaustion_restarts() {
        let h = harness(ConnectionSettings {
            policy: ReconnectPolicy {
                max_attempts: 1,
                ..ReconnectPolicy::default()
            },
            ..settings()
        });

        h.manager.connect();
        time::sleep(Duration::from_secs(5)).await;
        assert!(h.manager.snapshot().live_updates_unavailable);
        assert_eq!(h.transport.connect_count(), 2);

        let _peer = h.transport.accept_next();
        assert!(matches!(h.manager.connect(), ConnectAction::Open { .. }));
        settle().await;

        let snapshot = h.manager.snapshot();
        assert_eq!(snapshot.state, ConnectionState::Open);
        assert!(!snapshot.live_updates_unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_pending_reconnect() {
        let h = harness(settings());

        h.manager.connect();
        settle().await;
        assert!(h.manager.snapshot().reconnect_scheduled);

        h.manager.disconnect();
        time::sleep(Duration::from_secs(30)).await;

        assert_eq!(h.transport.connect_count(), 1);
        assert_eq!(h.manager.state(), ConnectionState::Disconnected);
        assert!(!h.manager.snapshot().reconnect_scheduled);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_closes_live_channel_without_reconnecting() {
        let h = harness(settings());
        let peer = h.transport.accept_next();

        h.manager.connect();
        settle().await;
        h.manager.disconnect();
        settle().await;

        assert!(peer.client_closed());
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.transport.connect_count(), 1);
        assert_eq!(h.manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_while_connecting_discards_late_channel() {
        let h = harness(settings());
        h.transport.set_connect_delay(Duration::from_millis(500));
        let peer = h.transport.accept_next();

        h.manager.connect();
        settle().await;
        h.manager.disconnect();
        time::sleep(Duration::from_secs(1)).await;

        assert!(peer.is_accepted());
        assert!(peer.client_closed());
        assert_eq!(h.manager.state(), ConnectionState::Disconnected);
        assert!(!h.manager.snapshot().reconnect_scheduled);
    }

    #[tokio::test(start_paused = true)]
    async fn normal_close_from_server_does_not_reconnect() {
        let h = harness(settings());
        let peer = h.transport.accept_next();

        h.manager.connect();
        settle().await;
        peer.close(true);
        time::sleep(Duration::from_secs(30)).await;

        assert_eq!(h.transport.connect_count(), 1);
        assert!(!h.manager.snapshot().reconnect_scheduled);
    }

    #[tokio::test(start_paused = true)]
    async fn abnormal_close_from_server_reconnects() {
        let h = harness(settings());
        let peer = h.transport.accept_next();

        h.manager.connect();
        settle().await;
        peer.close(false);
        settle().await;

        assert!(h.manager.snapshot().reconnect_scheduled);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_is_recorded_in_diagnostic_mode() {
        let h = harness(settings());
        let peer = h.transport.accept_next();

        h.manager.connect();
        settle().await;
        peer.send_frame(InboundFrame::Error("connection reset".to_string()));
        settle().await;

        let snapshot = h.manager.snapshot();
        assert_eq!(snapshot.connection_error.as_deref(), Some("connection reset"));
        assert!(snapshot.reconnect_scheduled);
        assert_eq!(h.diagnostics.snapshot().transport_errors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_is_hidden_outside_diagnostic_mode() {
        let h = harness(ConnectionSettings {
            diagnostic_mode: false,
            ..settings()
        });

        h.manager.connect();
        settle().await;

        assert!(h.manager.snapshot().connection_error.is_none());
        assert_eq!(h.diagnostics.snapshot().transport_errors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn send_only_delivers_while_open() {
        let h = harness(settings());
        assert!(!h.manager.send("early"));

        let peer = h.transport.accept_next();
        h.manager.connect();
        settle().await;

        assert!(h.manager.send("hello"));
        settle().await;
        assert_eq!(peer.received(), vec!["hello".to_string()]);

        h.manager.disconnect();
        assert!(!h.manager.send("late"));
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_sends_ping_on_interval() {
        let h = harness(ConnectionSettings {
            heartbeat: Some(Duration::from_secs(15)),
            ..settings()
        });
        let peer = h.transport.accept_next();

        h.manager.connect();
        settle().await;
        assert!(peer.received().is_empty());

        time::sleep(Duration::from_secs(31)).await;
        assert_eq!(peer.received(), vec!["ping".to_string(), "ping".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn status_watchers_see_transitions() {
        let h = harness(settings());
        let _peer = h.transport.accept_next();
        let mut rx = h.manager.watch_status();

        h.manager.connect();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().state, ConnectionState::Connecting);

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().state, ConnectionState::Open);
    }
}
