//! Detail update registry - per-case fan-out of prediction details.
//!
//! Detail views subscribe to the case they display. When the dispatcher
//! receives a `case_updated` message carrying a detail, it publishes that
//! detail to every subscriber of the case.
//!
//! # Architecture
//!
//! ```text
//! Case: c1             Case: c2
//! ├── subscription-a   └── subscription-d
//! └── subscription-b
//! ```
//!
//! A detail for c1 reaches a and b only. A case key is removed as soon as
//! its last subscription is released, so the registry never accumulates
//! keys for cases nobody is viewing.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use crate::domain::cases::PredictionDetail;
use crate::domain::foundation::{CaseId, SubscriptionId};

/// Callback invoked with each published detail.
pub type DetailCallback = Arc<dyn Fn(&Arc<PredictionDetail>) + Send + Sync>;

struct Registration {
    id: SubscriptionId,
    callback: DetailCallback,
}

#[derive(Default)]
struct RegistryInner {
    /// Map of case_id → registrations in subscription order.
    entries: RwLock<HashMap<CaseId, Vec<Registration>>>,
}

impl RegistryInner {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<CaseId, Vec<Registration>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<CaseId, Vec<Registration>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, case_id: &CaseId, id: SubscriptionId) -> bool {
        let mut entries = self.write();
        let Some(registrations) = entries.get_mut(case_id) else {
            return false;
        };

        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        let removed = registrations.len() != before;

        if registrations.is_empty() {
            entries.remove(case_id);
        }
        removed
    }
}

/// Keyed callback table for prediction detail updates.
///
/// Cloning is cheap and every clone shares the same table, so one registry
/// instance can be handed to the dispatcher and to every detail view.
///
/// # Thread Safety
///
/// Uses a std `RwLock` that is never held while callbacks run: `publish`
/// snapshots the callbacks first, so a callback may subscribe or
/// unsubscribe without deadlocking.
#[derive(Clone, Default)]
pub struct DetailUpdateRegistry {
    inner: Arc<RegistryInner>,
}

impl DetailUpdateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for details of `case_id`.
    ///
    /// Every call is a separate registration, even for the same callback.
    /// The registration lives until the returned [`Subscription`] is
    /// unsubscribed or dropped.
    pub fn subscribe<F>(&self, case_id: CaseId, callback: F) -> Subscription
    where
        F: Fn(&Arc<PredictionDetail>) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.inner
            .write()
            .entry(case_id.clone())
            .or_default()
            .push(Registration {
                id,
                callback: Arc::new(callback),
            });

        tracing::debug!(case_id = %case_id, subscription = %id, "detail subscription added");

        Subscription {
            case_id,
            id,
            registry: Arc::downgrade(&self.inner),
            released: false,
        }
    }

    /// Deliver `detail` to every subscriber of `case_id`.
    ///
    /// Returns the number of callbacks invoked. A case with no subscribers
    /// is a no-op.
    pub fn publish(&self, case_id: &CaseId, detail: &Arc<PredictionDetail>) -> usize {
        let callbacks: Vec<DetailCallback> = match self.inner.read().get(case_id) {
            Some(registrations) => registrations
                .iter()
                .map(|r| Arc::clone(&r.callback))
                .collect(),
            None => return 0,
        };

        for callback in &callbacks {
            callback(detail);
        }
        callbacks.len()
    }

    pub fn has_subscribers(&self, case_id: &CaseId) -> bool {
        self.inner.read().contains_key(case_id)
    }

    /// Number of live registrations for `case_id`.
    pub fn subscriber_count(&self, case_id: &CaseId) -> usize {
        self.inner.read().get(case_id).map_or(0, Vec::len)
    }

    /// Number of cases with at least one registration.
    pub fn tracked_case_count(&self) -> usize {
        self.inner.read().len()
    }
}

impl std::fmt::Debug for DetailUpdateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetailUpdateRegistry")
            .field("tracked_cases", &self.tracked_case_count())
            .finish()
    }
}

/// Handle for one registry registration.
///
/// Dropping the handle unsubscribes. Unsubscribing twice is impossible by
/// construction; unsubscribing after the registry itself is gone is a no-op.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    case_id: CaseId,
    id: SubscriptionId,
    registry: Weak<RegistryInner>,
    released: bool,
}

impl Subscription {
    pub fn case_id(&self) -> &CaseId {
        &self.case_id
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove exactly this registration.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Some(inner) = self.registry.upgrade() {
            if inner.remove(&self.case_id, self.id) {
                tracing::debug!(case_id = %self.case_id, subscription = %self.id, "detail subscription removed");
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("case_id", &self.case_id)
            .field("id", &self.id)
            .finish()
    }
}
