//! CaseDetailView - live prediction detail for the selected case.
//!
//! Two sources write the same `latest` slot:
//! - push: a detail update registry subscription for the case
//! - pull: a detail poll (`GET /api/cases/{id}`, default every 5s)
//!
//! Whichever write lands last wins. There is no version check between the
//! two sources, so a slow poll response can replace a newer pushed detail
//! until the next update arrives.
//!
//! Closing the view (explicitly or by dropping it) stops the poll and
//! releases the subscription. Results that land after close are ignored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::watch;

use crate::domain::cases::PredictionDetail;
use crate::domain::foundation::CaseId;
use crate::ports::CaseApi;

use super::polling::{spawn_poll, CancellationFlag, RefreshHandle};
use super::{DetailUpdateRegistry, Subscription, SyncAlert, SyncDiagnostics};

/// Slot shared by the push callback and the poll task.
struct DetailSlot {
    latest: watch::Sender<Option<Arc<PredictionDetail>>>,
    alert: RwLock<Option<SyncAlert>>,
    closed: AtomicBool,
}

impl DetailSlot {
    fn new() -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            latest,
            alert: RwLock::new(None),
            closed: AtomicBool::new(false),
        }
    }

    fn accept(&self, detail: Arc<PredictionDetail>) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        self.latest.send_replace(Some(detail));
        *self.alert.write().unwrap_or_else(PoisonError::into_inner) = None;
        true
    }

    fn raise(&self, alert: SyncAlert) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        *self.alert.write().unwrap_or_else(PoisonError::into_inner) = Some(alert);
    }
}

/// Owner of one case's live detail.
pub struct CaseDetailView {
    case_id: CaseId,
    slot: Arc<DetailSlot>,
    subscription: Mutex<Option<Subscription>>,
    poll: RefreshHandle,
}

impl CaseDetailView {
    /// Subscribe to pushed details for `case_id` and start polling it.
    ///
    /// The first poll is issued immediately.
    pub fn open(
        case_id: CaseId,
        api: Arc<dyn CaseApi>,
        registry: &DetailUpdateRegistry,
        diagnostics: Arc<SyncDiagnostics>,
        interval: Duration,
    ) -> Self {
        let slot = Arc::new(DetailSlot::new());

        let push_slot = Arc::clone(&slot);
        let subscription = registry.subscribe(case_id.clone(), move |detail| {
            push_slot.accept(Arc::clone(detail));
        });

        let poll_slot = Arc::clone(&slot);
        let poll_case = case_id.clone();
        let poll = spawn_poll("detail", interval, move |flag| {
            poll_detail(
                Arc::clone(&api),
                poll_case.clone(),
                Arc::clone(&poll_slot),
                Arc::clone(&diagnostics),
                flag,
            )
        });

        tracing::debug!(case_id = %case_id, "detail view opened");

        Self {
            case_id,
            slot,
            subscription: Mutex::new(Some(subscription)),
            poll,
        }
    }

    pub fn case_id(&self) -> &CaseId {
        &self.case_id
    }

    /// Most recent detail from either source.
    pub fn latest(&self) -> Option<Arc<PredictionDetail>> {
        self.slot.latest.borrow().clone()
    }

    /// Receiver notified whenever a new detail is accepted.
    pub fn watch(&self) -> watch::Receiver<Option<Arc<PredictionDetail>>> {
        self.slot.latest.subscribe()
    }

    /// Alert from the last failed detail poll, cleared by the next detail.
    pub fn alert(&self) -> Option<SyncAlert> {
        self.slot
            .alert
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stop polling and unsubscribe. Idempotent.
    pub fn close(&self) {
        if self.slot.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.poll.stop();
        if let Some(subscription) = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            subscription.unsubscribe();
        }
        tracing::debug!(case_id = %self.case_id, "detail view closed");
    }

    pub fn is_closed(&self) -> bool {
        self.slot.closed.load(Ordering::SeqCst)
    }
}

impl Drop for CaseDetailView {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for CaseDetailView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaseDetailView")
            .field("case_id", &self.case_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn poll_detail(
    api: Arc<dyn CaseApi>,
    case_id: CaseId,
    slot: Arc<DetailSlot>,
    diagnostics: Arc<SyncDiagnostics>,
    flag: CancellationFlag,
) {
    let result = api.get_case(&case_id).await;

    if flag.is_cancelled() {
        diagnostics.stale_result_discarded();
        tracing::debug!(case_id = %case_id, "discarding detail that arrived after close");
        return;
    }

    match result {
        Ok(detail) => {
            slot.accept(Arc::new(detail));
        }
        Err(e) => {
            diagnostics.fetch_failure();
            tracing::warn!(case_id = %case_id, error = %e, "detail refresh failed; keeping last detail");
            slot.raise(SyncAlert::from_error(&e));
        }
    }
}
