//! User-visible sync status: fetch alerts and last successful refresh.
//!
//! Poll failures never clear cached data; they raise an alert here
//! instead. A later successful fetch clears the alert.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::ports::CaseApiError;

/// Category of a fetch alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// The server did not answer in time.
    ServerNotResponding,
    /// The requested case does not exist.
    CaseNotFound,
    /// Any other failure (network, status code, bad payload).
    FetchFailed,
}

impl From<&CaseApiError> for AlertKind {
    fn from(error: &CaseApiError) -> Self {
        match error {
            CaseApiError::Timeout { .. } => AlertKind::ServerNotResponding,
            CaseApiError::NotFound(_) => AlertKind::CaseNotFound,
            _ => AlertKind::FetchFailed,
        }
    }
}

/// A human-readable alert for the status line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAlert {
    pub kind: AlertKind,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl SyncAlert {
    pub fn from_error(error: &CaseApiError) -> Self {
        Self {
            kind: AlertKind::from(error),
            message: error.user_message(),
            raised_at: Utc::now(),
        }
    }
}

/// Snapshot of the collection refresh status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshStatus {
    pub alert: Option<SyncAlert>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

/// Observable holder of [`RefreshStatus`].
#[derive(Debug)]
pub struct StatusBoard {
    status: watch::Sender<RefreshStatus>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let (status, _) = watch::channel(RefreshStatus::default());
        Self { status }
    }

    /// Record a successful fetch and clear any alert.
    pub fn fetch_succeeded(&self) {
        self.status.send_modify(|s| {
            s.alert = None;
            s.last_synced_at = Some(Utc::now());
            s.consecutive_failures = 0;
        });
    }

    /// Record a failed fetch. Cached data is left untouched.
    pub fn fetch_failed(&self, error: &CaseApiError) {
        let alert = SyncAlert::from_error(error);
        self.status.send_modify(|s| {
            s.alert = Some(alert);
            s.consecutive_failures = s.consecutive_failures.saturating_add(1);
        });
    }

    pub fn current(&self) -> RefreshStatus {
        self.status.borrow().clone()
    }

    pub fn alert(&self) -> Option<SyncAlert> {
        self.status.borrow().alert.clone()
    }

    pub fn watch(&self) -> watch::Receiver<RefreshStatus> {
        self.status.subscribe()
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}
