//! Report transports

mod http;
mod log;

pub use http::{is_retryable_status, HttpTransport};
pub use log::LogTransport;

use contracts::{ContractError, ReportTransport, ReporterConfig, SealedReport};
use tracing::info;

use crate::error::ReporterError;

const LOG_SCHEME: &str = "log://";

/// Transport selected by the endpoint scheme
pub enum AnyTransport {
    Http(HttpTransport),
    Log(LogTransport),
}

impl AnyTransport {
    /// `log://...` selects the logging transport, anything else HTTP
    pub fn from_config(config: &ReporterConfig) -> Result<Self, ReporterError> {
        let transport = if config.endpoint.starts_with(LOG_SCHEME) {
            Self::Log(LogTransport::new(&config.endpoint))
        } else {
            Self::Http(HttpTransport::new(config)?)
        };
        info!(
            transport = transport.name(),
            endpoint = %transport.endpoint(),
            timeout_secs = config.timeout_secs,
            "Report transport ready"
        );
        Ok(transport)
    }
}

impl ReportTransport for AnyTransport {
    fn name(&self) -> &str {
        match self {
            Self::Http(t) => t.name(),
            Self::Log(t) => t.name(),
        }
    }

    fn endpoint(&self) -> &str {
        match self {
            Self::Http(t) => t.endpoint(),
            Self::Log(t) => t.endpoint(),
        }
    }

    async fn send(&mut self, report: &SealedReport) -> Result<(), ContractError> {
        match self {
            Self::Http(t) => t.send(report).await,
            Self::Log(t) => t.send(report).await,
        }
    }
}
