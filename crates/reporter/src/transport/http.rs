//! HttpTransport - POSTs sealed report bodies as JSON
//!
//! 2xx is success. 408, 429, 5xx, timeouts and connection failures are
//! retryable; any other status is a rejection that retrying will not fix.

use contracts::{ContractError, ReportTransport, ReporterConfig, SealedReport};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use crate::error::ReporterError;

const USER_AGENT: &str = concat!("edge-agent/", env!("CARGO_PKG_VERSION"));

pub struct HttpTransport {
    endpoint: String,
    client: Client,
}

impl HttpTransport {
    /// Build the client: timeout, JSON content type and optional bearer key.
    pub fn new(config: &ReporterConfig) -> Result<Self, ReporterError> {
        let endpoint = config.endpoint.clone();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| ReporterError::transport_creation(&endpoint, e.to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| ReporterError::transport_creation(&endpoint, e.to_string()))?;

        Ok(Self { endpoint, client })
    }

    fn classify(&self, err: reqwest::Error) -> ContractError {
        let retryable = !err.is_builder();
        let message = if err.is_timeout() {
            format!("request timed out: {err}")
        } else if err.is_connect() {
            format!("connection failed: {err}")
        } else {
            err.to_string()
        };
        ContractError::delivery(&self.endpoint, message, retryable)
    }
}

/// Whether a non-success status may succeed on a later attempt
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

impl ReportTransport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[instrument(
        name = "http_transport_send",
        skip(self, report),
        fields(endpoint = %self.endpoint, batch_id = %report.batch_id())
    )]
    async fn send(&mut self, report: &SealedReport) -> Result<(), ContractError> {
        let response = self
            .client
            .post(&self.endpoint)
            .body(report.body().clone())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), "Report accepted");
            return Ok(());
        }

        Err(ContractError::delivery(
            &self.endpoint,
            format!("HTTP {status}"),
            is_retryable_status(status),
        ))
    }
}
