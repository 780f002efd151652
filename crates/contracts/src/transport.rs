//! ReportTransport trait - reporter output interface

use crate::{ContractError, SealedReport};

/// Outbound delivery of one sealed batch.
///
/// One call is one request. Retries, backoff and caching live in the
/// reporter, not in the transport.
#[trait_variant::make(ReportTransport: Send)]
pub trait LocalReportTransport {
    /// Transport name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Destination shown in logs and errors
    fn endpoint(&self) -> &str;

    /// Send the report body.
    ///
    /// # Errors
    /// `Delivery`, flagged retryable or not.
    async fn send(&mut self, report: &SealedReport) -> Result<(), ContractError>;
}
