//! CaseApi port - Interface for the pull side of case synchronization.
//!
//! The refresh scheduler and initial load read cases through this port.
//! The production adapter talks to the REST API; tests use the in-memory
//! adapter.
//!
//! ## Endpoints
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | `list_cases` | `GET /api/cases` |
//! | `get_case` | `GET /api/cases/{caseId}` |
//! | `health` | `GET /api/health` |
//! | `streaming_metrics` | `GET /api/streaming/metrics` |

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::cases::{CaseSummary, PredictionDetail};
use crate::domain::foundation::CaseId;

/// Errors returned by case API operations.
///
/// Timeouts and not-found are distinct from generic network failures so the
/// UI can show a specific message for each.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaseApiError {
    /// The server did not answer within the request timeout.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The requested case does not exist on the server.
    #[error("Case not found: {0}")]
    NotFound(CaseId),

    /// The server could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with an unexpected status code.
    #[error("Server returned status {status}")]
    Status { status: u16 },

    /// The response body did not match the expected shape.
    #[error("Invalid response payload: {0}")]
    Decode(String),
}

impl CaseApiError {
    pub fn network(message: impl Into<String>) -> Self {
        CaseApiError::Network(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        CaseApiError::Decode(message.into())
    }

    /// Human-readable message for the status line.
    pub fn user_message(&self) -> String {
        match self {
            CaseApiError::Timeout { .. } => {
                "Server not responding. Please check that the API server is running.".to_string()
            }
            CaseApiError::NotFound(case_id) => format!("Case {} not found.", case_id),
            CaseApiError::Network(_) => {
                "Unable to reach the case server. Showing last known data.".to_string()
            }
            CaseApiError::Status { status } => {
                format!("Case server returned an error ({}). Showing last known data.", status)
            }
            CaseApiError::Decode(_) => {
                "Received an unreadable response from the case server.".to_string()
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CaseApiError::Timeout { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CaseApiError::NotFound(_))
    }
}

/// Health report returned by `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    /// Health of the server's push-side consumer ("running" / "stopped").
    #[serde(default)]
    pub kafka_consumer: Option<String>,
    #[serde(default)]
    pub cases_count: u64,
    /// Server-side breakers guarding its AI services, keyed by service.
    #[serde(default)]
    pub circuit_breakers: Option<BTreeMap<String, CircuitBreakerState>>,
}

/// One circuit breaker as reported inside `HealthReport`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    #[serde(default)]
    pub name: Option<String>,
    /// "closed", "open" or "half_open".
    pub state: String,
    #[serde(default)]
    pub failure_count: u32,
    #[serde(default)]
    pub success_count: u32,
    /// Unix timestamp in seconds.
    #[serde(default)]
    pub last_failure_time: Option<f64>,
}

impl CircuitBreakerState {
    pub fn is_open(&self) -> bool {
        self.state.eq_ignore_ascii_case("open")
    }
}

impl HealthReport {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }

    /// Returns true when the server reports its push consumer as running.
    pub fn push_consumer_running(&self) -> bool {
        self.kafka_consumer.as_deref() == Some("running")
    }

    /// Names of the breakers currently rejecting requests.
    pub fn open_circuit_breakers(&self) -> Vec<&str> {
        self.circuit_breakers
            .iter()
            .flatten()
            .filter(|(_, breaker)| breaker.is_open())
            .map(|(key, _)| key.as_str())
            .collect()
    }
}

/// Streaming pipeline metrics returned by `GET /api/streaming/metrics`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamingMetrics {
    #[serde(default)]
    pub kafka_connected: bool,
    #[serde(default)]
    pub messages_received: u64,
    #[serde(default)]
    pub messages_per_second: f64,
    #[serde(default)]
    pub last_message_time: Option<String>,
    #[serde(default)]
    pub uptime_seconds: f64,
    #[serde(default)]
    pub consumer_thread_alive: bool,
}

/// Port for reading cases from the server.
///
/// # Example
///
/// ```ignore
/// let cases = api.list_cases().await?;
/// store.replace_all(cases);
///
/// match api.get_case(&case_id).await {
///     Ok(detail) => view.accept(detail),
///     Err(CaseApiError::NotFound(_)) => status.case_not_found(&case_id),
///     Err(e) => status.fetch_failed(e),
/// }
/// ```
#[async_trait]
pub trait CaseApi: Send + Sync {
    /// Fetch the full case collection.
    async fn list_cases(&self) -> Result<Vec<CaseSummary>, CaseApiError>;

    /// Fetch the prediction detail for one case.
    async fn get_case(&self, case_id: &CaseId) -> Result<PredictionDetail, CaseApiError>;

    /// Fetch server health.
    async fn health(&self) -> Result<HealthReport, CaseApiError>;

    /// Fetch streaming pipeline metrics.
    async fn streaming_metrics(&self) -> Result<StreamingMetrics, CaseApiError>;
}
