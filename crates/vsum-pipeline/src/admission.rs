//! Capacity-bounded job admission.
//!
//! The controller is the only state shared between jobs. It is built once at
//! startup and handed to call sites behind an `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};
use vsum_models::{AdmissionSlot, JobId};

use crate::error::{PipelineError, PipelineResult};
use crate::metrics;

/// Tracks live admission slots against a fixed capacity.
#[derive(Debug)]
pub struct AdmissionController {
    capacity: usize,
    slots: Mutex<HashMap<JobId, AdmissionSlot>>,
}

impl AdmissionController {
    /// Create a controller admitting at most `capacity` jobs (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            slots: Mutex::new(HashMap::new()),
        }
    }

    // A poisoned lock only means another holder panicked mid-update; the map
    // itself is always consistent after each insert/remove.
    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, AdmissionSlot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a slot for `job_id` if one is free.
    ///
    /// The check and the insert happen under one lock, so concurrent callers
    /// can never admit past capacity. Returns `false` without side effects
    /// when full or when `job_id` already holds a slot.
    pub fn try_admit(&self, job_id: &JobId, client_ip: Option<String>) -> bool {
        let mut slots = self.lock();
        if slots.len() >= self.capacity || slots.contains_key(job_id) {
            drop(slots);
            metrics::record_job_rejected();
            debug!(job_id = %job_id, capacity = self.capacity, "Admission rejected");
            return false;
        }

        slots.insert(job_id.clone(), AdmissionSlot::new(job_id.clone(), client_ip));
        let in_flight = slots.len();
        drop(slots);

        metrics::record_job_admitted(in_flight);
        info!(job_id = %job_id, in_flight, capacity = self.capacity, "Job admitted");
        true
    }

    /// Admit `job_id` and return a guard that releases the slot on drop.
    pub fn admit(
        self: &Arc<Self>,
        job_id: &JobId,
        client_ip: Option<String>,
    ) -> PipelineResult<AdmissionGuard> {
        if self.try_admit(job_id, client_ip) {
            Ok(AdmissionGuard {
                controller: Arc::clone(self),
                job_id: job_id.clone(),
            })
        } else {
            Err(PipelineError::AdmissionRejected)
        }
    }

    /// Remove the slot held by `job_id`.
    ///
    /// Idempotent: returns `true` only for the call that actually removed
    /// the slot. Unknown identifiers are a no-op.
    pub fn release(&self, job_id: &JobId) -> bool {
        let mut slots = self.lock();
        let removed = slots.remove(job_id).is_some();
        let in_flight = slots.len();
        drop(slots);

        if removed {
            metrics::record_slot_released(in_flight);
            debug!(job_id = %job_id, in_flight, "Admission slot released");
        }
        removed
    }

    /// Snapshot of the live slot count. Not for admission decisions.
    pub fn in_flight_count(&self) -> usize {
        self.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether a slot is free right now. Advisory only: admission itself
    /// goes through [`Self::try_admit`].
    pub fn has_capacity(&self) -> bool {
        self.lock().len() < self.capacity
    }

    /// Live slots, oldest first.
    pub fn snapshot(&self) -> Vec<AdmissionSlot> {
        let mut slots: Vec<AdmissionSlot> = self.lock().values().cloned().collect();
        slots.sort_by_key(|s| s.acquired_at);
        slots
    }
}

/// Holds one admission slot; releases it when dropped.
#[derive(Debug)]
pub struct AdmissionGuard {
    controller: Arc<AdmissionController>,
    job_id: JobId,
}

impl AdmissionGuard {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        self.controller.release(&self.job_id);
    }
}
