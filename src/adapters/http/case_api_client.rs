//! HTTP case API client - Implementation of `CaseApi` over the REST API.
//!
//! # Configuration
//!
//! ```ignore
//! let config = HttpCaseApiConfig::new("http://localhost:8000")
//!     .with_timeout(Duration::from_secs(10));
//!
//! let api = HttpCaseApi::new(config)?;
//! let cases = api.list_cases().await?;
//! ```
//!
//! Every request carries the configured timeout. A timeout surfaces as
//! `CaseApiError::Timeout` so the caller can show "server not responding"
//! instead of a generic failure.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::domain::cases::{CaseSummary, PredictionDetail};
use crate::domain::foundation::CaseId;
use crate::ports::{CaseApi, CaseApiError, HealthReport, StreamingMetrics};

/// Configuration for the HTTP case API client.
#[derive(Debug, Clone)]
pub struct HttpCaseApiConfig {
    /// Server base URL, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl HttpCaseApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// REST implementation of the case API.
#[derive(Debug, Clone)]
pub struct HttpCaseApi {
    base_url: Url,
    timeout: Duration,
    client: Client,
}

impl HttpCaseApi {
    /// Creates a client for the given configuration.
    ///
    /// Fails when the base URL cannot be parsed or the HTTP client cannot be
    /// built.
    pub fn new(config: HttpCaseApiConfig) -> Result<Self, CaseApiError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| CaseApiError::network(format!("Invalid base URL: {}", e)))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CaseApiError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            timeout: config.timeout,
            client,
        })
    }

    /// Builds an endpoint URL from path segments, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, CaseApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CaseApiError::network("Base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn map_request_error(&self, error: reqwest::Error) -> CaseApiError {
        if error.is_timeout() {
            CaseApiError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else if error.is_decode() {
            CaseApiError::decode(error.to_string())
        } else if error.is_connect() {
            CaseApiError::network(format!("Connection failed: {}", error))
        } else {
            CaseApiError::network(error.to_string())
        }
    }

    async fn send(&self, url: Url) -> Result<Response, CaseApiError> {
        tracing::debug!(url = %url, "GET");
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))
    }

    async fn read_json<T: DeserializeOwned>(&self, response: Response) -> Result<T, CaseApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(CaseApiError::Status {
                status: status.as_u16(),
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| self.map_request_error(e))
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, CaseApiError> {
        let response = self.send(self.endpoint(segments)?).await?;
        self.read_json(response).await
    }
}

#[async_trait]
impl CaseApi for HttpCaseApi {
    async fn list_cases(&self) -> Result<Vec<CaseSummary>, CaseApiError> {
        self.get_json(&["api", "cases"]).await
    }

    async fn get_case(&self, case_id: &CaseId) -> Result<PredictionDetail, CaseApiError> {
        let url = self.endpoint(&["api", "cases", case_id.as_str()])?;
        let response = self.send(url).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(CaseApiError::NotFound(case_id.clone()));
        }
        self.read_json(response).await
    }

    async fn health(&self) -> Result<HealthReport, CaseApiError> {
        self.get_json(&["api", "health"]).await
    }

    async fn streaming_metrics(&self) -> Result<StreamingMetrics, CaseApiError> {
        self.get_json(&["api", "streaming", "metrics"]).await
    }
}
