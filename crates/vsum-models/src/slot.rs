//! Admission slot records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::JobId;

/// A capacity token held by one running job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionSlot {
    /// Job holding the slot
    pub job_id: JobId,
    /// When the slot was acquired
    pub acquired_at: DateTime<Utc>,
    /// Client address, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
}

impl AdmissionSlot {
    pub fn new(job_id: JobId, client_ip: Option<String>) -> Self {
        Self {
            job_id,
            acquired_at: Utc::now(),
            client_ip,
        }
    }

    /// Seconds the slot has been held.
    pub fn held_secs(&self) -> i64 {
        (Utc::now() - self.acquired_at).num_seconds().max(0)
    }
}
