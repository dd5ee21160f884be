//! SyncSession - wires the synchronization components for one dashboard.
//!
//! ```text
//!  PushTransport ──► ConnectionManager ──► Dispatcher ──┬──► CaseStore
//!                                                       └──► DetailUpdateRegistry ──► CaseDetailView
//!  CaseApi ──► RefreshScheduler ──► CaseStore                                          ▲
//!  CaseApi ──────────────────────────────────────────────── detail poll ───────────────┘
//! ```
//!
//! The session owns every long-lived task. `shutdown()` (or dropping the
//! session) disconnects the push channel cleanly, stops polling and closes
//! every open detail view.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use crate::domain::connection::{ConnectAction, ConnectionSnapshot};
use crate::domain::foundation::CaseId;
use crate::ports::{CaseApi, CaseApiError, HealthReport, PushTransport, StreamingMetrics};

use super::polling::{CancellationFlag, RefreshHandle};
use super::{
    CaseDetailView, CaseStore, ConnectionManager, ConnectionSettings, DetailUpdateRegistry,
    DiagnosticsSnapshot, Dispatcher, RefreshOutcome, RefreshScheduler, StatusBoard,
    SyncDiagnostics,
};

/// Settings for a sync session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub connection: ConnectionSettings,
    /// Full-collection refresh interval.
    pub cases_interval: Duration,
    /// Detail refresh interval for open detail views.
    pub detail_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connection: ConnectionSettings::default(),
            cases_interval: Duration::from_secs(30),
            detail_interval: Duration::from_secs(5),
        }
    }
}

/// A running synchronization session.
pub struct SyncSession {
    api: Arc<dyn CaseApi>,
    store: Arc<CaseStore>,
    registry: DetailUpdateRegistry,
    status: Arc<StatusBoard>,
    diagnostics: Arc<SyncDiagnostics>,
    connection: Arc<ConnectionManager>,
    scheduler: Arc<RefreshScheduler>,
    refresh: Mutex<Option<RefreshHandle>>,
    detail_views: Mutex<Vec<Weak<CaseDetailView>>>,
    detail_interval: Duration,
    cancelled: CancellationFlag,
    stopped: AtomicBool,
}

impl SyncSession {
    /// Build every component, connect the push channel (unless disabled)
    /// and start the collection refresh.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(
        settings: SessionSettings,
        api: Arc<dyn CaseApi>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        let store = Arc::new(CaseStore::new());
        let registry = DetailUpdateRegistry::new();
        let status = Arc::new(StatusBoard::new());
        let diagnostics = Arc::new(SyncDiagnostics::new());

        let dispatcher = Dispatcher::new(
            Arc::clone(&store),
            registry.clone(),
            Arc::clone(&diagnostics),
        );
        let connection = ConnectionManager::new(
            settings.connection,
            transport,
            dispatcher,
            Arc::clone(&diagnostics),
        );
        let scheduler = Arc::new(RefreshScheduler::new(
            Arc::clone(&api),
            Arc::clone(&store),
            Arc::clone(&status),
            Arc::clone(&diagnostics),
            settings.cases_interval,
        ));

        connection.connect();
        let refresh = Arc::clone(&scheduler).start();

        tracing::info!(
            push_enabled = connection.is_enabled(),
            cases_interval_secs = settings.cases_interval.as_secs(),
            "sync session started"
        );

        Self {
            api,
            store,
            registry,
            status,
            diagnostics,
            connection,
            scheduler,
            refresh: Mutex::new(Some(refresh)),
            detail_views: Mutex::new(Vec::new()),
            detail_interval: settings.detail_interval,
            cancelled: CancellationFlag::new(),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &Arc<CaseStore> {
        &self.store
    }

    pub fn registry(&self) -> &DetailUpdateRegistry {
        &self.registry
    }

    pub fn status(&self) -> &Arc<StatusBoard> {
        &self.status
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn connection_status(&self) -> ConnectionSnapshot {
        self.connection.snapshot()
    }

    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Change the selected case.
    pub fn select(&self, case_id: CaseId) {
        self.store.select(case_id);
    }

    /// Open a live detail view for `case_id`.
    ///
    /// The view stays live until it is closed, dropped, or the session
    /// shuts down.
    pub fn open_detail(&self, case_id: CaseId) -> Arc<CaseDetailView> {
        let view = Arc::new(CaseDetailView::open(
            case_id,
            Arc::clone(&self.api),
            &self.registry,
            Arc::clone(&self.diagnostics),
            self.detail_interval,
        ));

        let mut views = self.lock_views();
        views.retain(|v| v.strong_count() > 0);
        views.push(Arc::downgrade(&view));
        view
    }

    /// Fetch the collection now, outside the regular schedule.
    ///
    /// A result that arrives after `shutdown()` is discarded.
    pub async fn refresh_now(&self) -> RefreshOutcome {
        self.scheduler.refresh(&self.cancelled).await
    }

    /// Explicit reconnect request. Restarts automatic reconnection after it
    /// has given up.
    pub fn reconnect(&self) -> ConnectAction {
        self.connection.connect()
    }

    pub async fn health(&self) -> Result<HealthReport, CaseApiError> {
        self.api.health().await
    }

    pub async fn streaming_metrics(&self) -> Result<StreamingMetrics, CaseApiError> {
        self.api.streaming_metrics().await
    }

    /// Tear everything down. Idempotent.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        self.cancelled.cancel();
        self.connection.disconnect();

        if let Some(refresh) = self
            .refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            refresh.stop();
        }

        let views: Vec<_> = self.lock_views().drain(..).collect();
        for view in views.iter().filter_map(Weak::upgrade) {
            view.close();
        }

        tracing::info!("sync session stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn lock_views(&self) -> MutexGuard<'_, Vec<Weak<CaseDetailView>>> {
        self.detail_views
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession")
            .field("store", &self.store)
            .field("connection", &self.connection)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
