//! Case store - shared owner of the case collection.
//!
//! Wraps [`CaseCollection`] for concurrent access by the dispatcher, the
//! refresh scheduler and readers. Every mutation runs in one write-lock
//! critical section, so readers observe either the state before or after a
//! mutation and never a partial one. After each mutation the revision
//! counter is bumped on a `watch` channel so consumers can re-render.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::watch;

use crate::domain::cases::{CaseCollection, CaseSummary, UpsertOutcome};
use crate::domain::foundation::CaseId;

/// Shared, observable case collection.
pub struct CaseStore {
    collection: RwLock<CaseCollection>,
    revision: watch::Sender<u64>,
}

impl CaseStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            collection: RwLock::new(CaseCollection::new()),
            revision,
        }
    }

    /// Replace the collection with a full server listing.
    pub fn replace_all(&self, summaries: Vec<CaseSummary>) {
        let count = summaries.len();
        self.mutate(|c| c.replace_all(summaries));
        tracing::debug!(count, "case collection replaced");
    }

    /// Update or insert one case.
    pub fn upsert(&self, summary: CaseSummary) -> UpsertOutcome {
        let case_id = summary.case_id.clone();
        let outcome = self.mutate(|c| c.upsert(summary));
        tracing::debug!(case_id = %case_id, ?outcome, "case upserted");
        outcome
    }

    /// Select a case for the detail view.
    pub fn select(&self, case_id: CaseId) {
        self.mutate(|c| c.select(case_id));
    }

    /// Drop every case and the selection.
    pub fn clear(&self) {
        self.mutate(CaseCollection::clear);
    }

    /// Cloned view of the whole collection.
    pub fn snapshot(&self) -> CaseCollection {
        self.read().clone()
    }

    pub fn cases(&self) -> Vec<CaseSummary> {
        self.read().cases().to_vec()
    }

    pub fn selected(&self) -> Option<CaseId> {
        self.read().selected().cloned()
    }

    pub fn selected_case(&self) -> Option<CaseSummary> {
        self.read().selected_case().cloned()
    }

    pub fn get(&self, case_id: &CaseId) -> Option<CaseSummary> {
        self.read().get(case_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Current revision. Starts at 0 and increases by one per mutation.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Receiver notified after every mutation.
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut CaseCollection) -> R) -> R {
        let result = {
            let mut collection = self.write();
            f(&mut collection)
        };
        self.revision.send_modify(|r| *r += 1);
        result
    }

    fn read(&self) -> RwLockReadGuard<'_, CaseCollection> {
        self.collection.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CaseCollection> {
        self.collection.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CaseStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaseStore")
            .field("cases", &self.len())
            .field("revision", &self.revision())
            .finish()
    }
}
