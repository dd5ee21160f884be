//! In-memory case API for testing and offline demos.
//!
//! Serves a scripted case list and detail map, and can inject failures and
//! latency so polling behavior can be exercised without a server.
//!
//! # Example
//!
//! ```ignore
//! let api = Arc::new(InMemoryCaseApi::with_cases(vec![summary("c1")]));
//! api.fail_next(CaseApiError::Timeout { timeout_secs: 10 });
//!
//! assert!(api.list_cases().await.is_err());
//! assert_eq!(api.list_cases().await?.len(), 1);
//! ```

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;

use crate::domain::cases::{CaseSummary, PredictionDetail};
use crate::domain::foundation::CaseId;
use crate::ports::{CaseApi, CaseApiError, HealthReport, StreamingMetrics};

/// Scriptable in-memory `CaseApi`.
pub struct InMemoryCaseApi {
    cases: RwLock<Vec<CaseSummary>>,
    details: RwLock<HashMap<CaseId, PredictionDetail>>,
    queued_failures: Mutex<VecDeque<CaseApiError>>,
    failure: RwLock<Option<CaseApiError>>,
    latency: RwLock<Duration>,
    health: RwLock<HealthReport>,
    metrics: RwLock<StreamingMetrics>,
    list_calls: AtomicUsize,
    detail_calls: AtomicUsize,
}

impl InMemoryCaseApi {
    /// Creates an API serving no cases.
    pub fn new() -> Self {
        Self {
            cases: RwLock::new(Vec::new()),
            details: RwLock::new(HashMap::new()),
            queued_failures: Mutex::new(VecDeque::new()),
            failure: RwLock::new(None),
            latency: RwLock::new(Duration::ZERO),
            health: RwLock::new(HealthReport {
                status: "ok".to_string(),
                kafka_consumer: Some("running".to_string()),
                cases_count: 0,
                circuit_breakers: None,
            }),
            metrics: RwLock::new(StreamingMetrics::default()),
            list_calls: AtomicUsize::new(0),
            detail_calls: AtomicUsize::new(0),
        }
    }

    /// Creates an API serving the given case list.
    pub fn with_cases(cases: Vec<CaseSummary>) -> Self {
        let api = Self::new();
        api.set_cases(cases);
        api
    }

    // === Scripting ===

    pub fn set_cases(&self, cases: Vec<CaseSummary>) {
        *self.cases.write().unwrap_or_else(PoisonError::into_inner) = cases;
    }

    /// Serves `detail` for its case id, replacing any previous detail.
    pub fn set_detail(&self, detail: PredictionDetail) {
        self.details
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(detail.case_id.clone(), detail);
    }

    pub fn remove_detail(&self, case_id: &CaseId) {
        self.details
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(case_id);
    }

    /// The next request (of any kind) fails with `error`.
    pub fn fail_next(&self, error: CaseApiError) {
        self.queued_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(error);
    }

    /// Every request fails with `error` until cleared.
    pub fn set_failure(&self, error: Option<CaseApiError>) {
        *self.failure.write().unwrap_or_else(PoisonError::into_inner) = error;
    }

    /// Delay applied to every request before it resolves.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.write().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    pub fn set_health(&self, report: HealthReport) {
        *self.health.write().unwrap_or_else(PoisonError::into_inner) = report;
    }

    pub fn set_metrics(&self, metrics: StreamingMetrics) {
        *self.metrics.write().unwrap_or_else(PoisonError::into_inner) = metrics;
    }

    // === Test Helpers ===

    /// Number of `list_cases` calls made so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_case` calls made so far.
    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    async fn simulate_request(&self) -> Result<(), CaseApiError> {
        let latency = *self.latency.read().unwrap_or_else(PoisonError::into_inner);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if let Some(error) = self
            .queued_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
        {
            return Err(error);
        }

        match &*self.failure.read().unwrap_or_else(PoisonError::into_inner) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryCaseApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaseApi for InMemoryCaseApi {
    async fn list_cases(&self) -> Result<Vec<CaseSummary>, CaseApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_request().await?;
        Ok(self.cases.read().unwrap_or_else(PoisonError::into_inner).clone())
    }

    async fn get_case(&self, case_id: &CaseId) -> Result<PredictionDetail, CaseApiError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_request().await?;
        self.details
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(case_id)
            .cloned()
            .ok_or_else(|| CaseApiError::NotFound(case_id.clone()))
    }

    async fn health(&self) -> Result<HealthReport, CaseApiError> {
        self.simulate_request().await?;
        let mut report = self.health.read().unwrap_or_else(PoisonError::into_inner).clone();
        report.cases_count = self.cases.read().unwrap_or_else(PoisonError::into_inner).len() as u64;
        Ok(report)
    }

    async fn streaming_metrics(&self) -> Result<StreamingMetrics, CaseApiError> {
        self.simulate_request().await?;
        Ok(self.metrics.read().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{PatientId, Probability, RiskCategory};

    fn summary(id: &str) -> CaseSummary {
        CaseSummary {
            case_id: CaseId::new(id),
            patient_id: PatientId::new("PT-1"),
            display_name: "Patient PT-1".to_string(),
            risk_category: RiskCategory::Low,
            stroke_probability: Probability::new(0.1),
            lvo_probability: Probability::new(0.05),
            minutes_since_onset: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn serves_scripted_cases() {
        let api = InMemoryCaseApi::with_cases(vec![summary("c1"), summary("c2")]);
        let cases = api.list_cases().await.unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(api.list_calls(), 1);
    }

    #[tokio::test]
    async fn missing_detail_is_not_found() {
        let api = InMemoryCaseApi::new();
        let result = api.get_case(&CaseId::new("c9")).await;
        assert_eq!(result.unwrap_err(), CaseApiError::NotFound(CaseId::new("c9")));
        assert_eq!(api.detail_calls(), 1);
    }

    #[tokio::test]
    async fn queued_failure_applies_once() {
        let api = InMemoryCaseApi::with_cases(vec![summary("c1")]);
        api.fail_next(CaseApiError::Timeout { timeout_secs: 10 });

        assert!(api.list_cases().await.unwrap_err().is_timeout());
        assert_eq!(api.list_cases().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn persistent_failure_applies_until_cleared() {
        let api = InMemoryCaseApi::new();
        api.set_failure(Some(CaseApiError::network("down")));

        assert!(api.list_cases().await.is_err());
        assert!(api.health().await.is_err());

        api.set_failure(None);
        assert!(api.list_cases().await.is_ok());
    }

    #[tokio::test]
    async fn health_reports_case_count() {
        let api = InMemoryCaseApi::with_cases(vec![summary("c1"), summary("c2")]);
        let report = api.health().await.unwrap();
        assert!(report.is_ok());
        assert_eq!(report.cases_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn latency_delays_response() {
        let api = InMemoryCaseApi::new();
        api.set_latency(Duration::from_secs(3));

        let started = tokio::time::Instant::now();
        api.list_cases().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(3));
    }
}
