//! LogTransport - logs report summaries via tracing
//!
//! Selected by a `log://<name>` endpoint. Every send succeeds, which makes it
//! the dry-run transport.

use contracts::{ContractError, ReportTransport, SealedReport};
use tracing::{info, instrument};

pub struct LogTransport {
    endpoint: String,
    sent: u64,
}

impl LogTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            sent: 0,
        }
    }

    /// Reports logged so far
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl ReportTransport for LogTransport {
    fn name(&self) -> &str {
        "log"
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[instrument(
        name = "log_transport_send",
        skip(self, report),
        fields(endpoint = %self.endpoint, batch_id = %report.batch_id())
    )]
    async fn send(&mut self, report: &SealedReport) -> Result<(), ContractError> {
        self.sent += 1;
        info!(
            device_id = %report.device_id(),
            results = report.result_count(),
            bytes = report.body().len(),
            created_at = %report.created_at(),
            "Report batch"
        );
        Ok(())
    }
}
