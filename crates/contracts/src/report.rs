//! ReportPayload - reporter output
//!
//! A batch is assembled as a [`ReportPayload`] and sealed into a
//! [`SealedReport`]: the serialized body is produced exactly once and every
//! later delivery attempt, cache write and drain resend uses those bytes.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ContractError, InferenceResult};

/// Wire form of one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub device_id: String,
    pub batch_id: String,
    pub created_at: DateTime<Utc>,
    pub results: Vec<InferenceResult>,
}

impl ReportPayload {
    /// Serialize and freeze the batch.
    ///
    /// # Errors
    /// Returns `Serialization` if the payload cannot be encoded as JSON.
    pub fn seal(self) -> Result<SealedReport, ContractError> {
        let body = serde_json::to_vec(&self)?;
        Ok(SealedReport {
            batch_id: self.batch_id,
            device_id: self.device_id,
            created_at: self.created_at,
            result_count: self.results.len(),
            body: Bytes::from(body),
        })
    }
}

/// An immutable, already-serialized batch.
///
/// Fields are private; there is no way to change a sealed report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedReport {
    batch_id: String,
    device_id: String,
    created_at: DateTime<Utc>,
    result_count: usize,
    body: Bytes,
}

impl SealedReport {
    /// Rebuild a sealed report from persisted parts (cache restore).
    pub fn from_parts(
        batch_id: impl Into<String>,
        device_id: impl Into<String>,
        created_at: DateTime<Utc>,
        result_count: usize,
        body: impl Into<Bytes>,
    ) -> Self {
        Self {
            batch_id: batch_id.into(),
            device_id: device_id.into(),
            created_at,
            result_count,
            body: body.into(),
        }
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn result_count(&self) -> usize {
        self.result_count
    }

    /// Exact bytes sent on the wire
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Parse the body back into a payload
    pub fn decode(&self) -> Result<ReportPayload, ContractError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}
