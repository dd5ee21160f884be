//! RefreshScheduler - periodic full-collection refresh.
//!
//! Polls `GET /api/cases` and replaces the store contents. The first tick
//! runs immediately and serves as the initial load; later ticks keep the
//! collection fresh when the push channel is down or disabled.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `interval` | 30s | Time between collection fetches |
//!
//! ## Failure handling
//!
//! A failed fetch leaves the store untouched and raises an alert on the
//! [`StatusBoard`]. A result that arrives after `stop()` is discarded.

use std::sync::Arc;
use std::time::Duration;

use crate::ports::{CaseApi, CaseApiError};

use super::polling::{spawn_poll, CancellationFlag, RefreshHandle};
use super::{CaseStore, StatusBoard, SyncDiagnostics};

/// Result of one refresh tick.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The store now holds `count` cases.
    Applied { count: usize },
    /// The fetch failed; cached data was kept.
    Failed(CaseApiError),
    /// The poll was stopped while the request was in flight.
    Discarded,
}

/// Periodic collection refresher.
pub struct RefreshScheduler {
    api: Arc<dyn CaseApi>,
    store: Arc<CaseStore>,
    status: Arc<StatusBoard>,
    diagnostics: Arc<SyncDiagnostics>,
    interval: Duration,
}

impl RefreshScheduler {
    pub fn new(
        api: Arc<dyn CaseApi>,
        store: Arc<CaseStore>,
        status: Arc<StatusBoard>,
        diagnostics: Arc<SyncDiagnostics>,
        interval: Duration,
    ) -> Self {
        Self {
            api,
            store,
            status,
            diagnostics,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the poll loop. The first fetch happens immediately.
    pub fn start(self: Arc<Self>) -> RefreshHandle {
        let period = self.interval;
        spawn_poll("cases", period, move |flag| {
            let scheduler = Arc::clone(&self);
            async move {
                scheduler.refresh(&flag).await;
            }
        })
    }

    /// Run one refresh. Exposed for tests and for on-demand refresh.
    pub async fn refresh(&self, flag: &CancellationFlag) -> RefreshOutcome {
        let result = self.api.list_cases().await;

        if flag.is_cancelled() {
            self.diagnostics.stale_result_discarded();
            tracing::debug!("discarding case list that arrived after stop");
            return RefreshOutcome::Discarded;
        }

        match result {
            Ok(cases) => {
                let count = cases.len();
                self.store.replace_all(cases);
                self.status.fetch_succeeded();
                RefreshOutcome::Applied { count }
            }
            Err(e) => {
                self.diagnostics.fetch_failure();
                self.status.fetch_failed(&e);
                tracing::warn!(error = %e, "case list refresh failed; keeping cached cases");
                RefreshOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryCaseApi;
    use crate::domain::cases::CaseSummary;
    use crate::domain::foundation::{CaseId, PatientId, Probability, RiskCategory};

    fn summary(id: &str) -> CaseSummary {
        CaseSummary {
            case_id: CaseId::new(id),
            patient_id: PatientId::new("PT-1"),
            display_name: "Patient PT-1".to_string(),
            risk_category: RiskCategory::Moderate,
            stroke_probability: Probability::new(0.4),
            lvo_probability: Probability::new(0.1),
            minutes_since_onset: Some(5),
            is_active: true,
        }
    }

    struct Fixture {
        api: Arc<InMemoryCaseApi>,
        store: Arc<CaseStore>,
        status: Arc<StatusBoard>,
        diagnostics: Arc<SyncDiagnostics>,
        scheduler: Arc<RefreshScheduler>,
    }

    fn fixture(interval: Duration) -> Fixture {
        let api = Arc::new(InMemoryCaseApi::new());
        let store = Arc::new(CaseStore::new());
        let status = Arc::new(StatusBoard::new());
        let diagnostics = Arc::new(SyncDiagnostics::new());
        let scheduler = Arc::new(RefreshScheduler::new(
            api.clone(),
            Arc::clone(&store),
            Arc::clone(&status),
            Arc::clone(&diagnostics),
            interval,
        ));
        Fixture {
            api,
            store,
            status,
            diagnostics,
            scheduler,
        }
    }

    #[tokio::test]
    async fn refresh_replaces_store_and_selects_first_case() {
        let f = fixture(Duration::from_secs(30));
        f.api.set_cases(vec![summary("c1")]);

        let outcome = f.scheduler.refresh(&CancellationFlag::new()).await;

        assert_eq!(outcome, RefreshOutcome::Applied { count: 1 });
        assert_eq!(f.store.len(), 1);
        assert_eq!(f.store.selected(), Some(CaseId::new("c1")));
        assert!(f.status.current().last_synced_at.is_some());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_cached_cases_and_raises_alert() {
        let f = fixture(Duration::from_secs(30));
        f.store.replace_all(vec![summary("c1"), summary("c2")]);
        f.api.fail_next(CaseApiError::Timeout { timeout_secs: 10 });

        let outcome = f.scheduler.refresh(&CancellationFlag::new()).await;

        assert!(matches!(outcome, RefreshOutcome::Failed(CaseApiError::Timeout { .. })));
        assert_eq!(f.store.len(), 2);
        assert!(f.status.alert().is_some());
        assert_eq!(f.diagnostics.snapshot().fetch_failures, 1);

        f.scheduler.refresh(&CancellationFlag::new()).await;
        assert!(f.status.alert().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn start_fetches_immediately_then_on_interval() {
        let f = fixture(Duration::from_secs(30));
        f.api.set_cases(vec![summary("c1")]);

        let handle = Arc::clone(&f.scheduler).start();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(f.api.list_calls(), 1);
        assert_eq!(f.store.len(), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(f.api.list_calls(), 2);

        handle.stop();
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(f.api.list_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn result_arriving_after_stop_is_discarded() {
        let f = fixture(Duration::from_secs(30));
        f.api.set_cases(vec![summary("c1")]);
        f.api.set_latency(Duration::from_secs(3));

        let handle = Arc::clone(&f.scheduler).start();
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.join().await;

        assert_eq!(f.api.list_calls(), 1);
        assert!(f.store.is_empty());
        assert_eq!(f.store.revision(), 0);
        assert_eq!(f.diagnostics.snapshot().stale_results_discarded, 1);
    }
}
