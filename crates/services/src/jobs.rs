//! Manual rebalance job enqueue.
//!
//! One enqueue runs inside one job transaction: duplicate check, publish,
//! insert, commit. Any failure rolls the transaction back, so a job row
//! exists only if its message was accepted by the queue.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use refdata_core::{RefDataError, Result};
use refdata_data::{JobRepository, JobSource, JobStatus, JobTransaction, RebalanceJobRecord};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::queue::{QueueMessage, QueueProducer, RebalanceRequested};
use crate::{system_clock, Clock};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnqueueRequest {
    /// `None` requests the next scheduled rebalance.
    pub effective_date: Option<NaiveDate>,
    pub source: JobSource,
    /// Skips the duplicate check.
    pub force: bool,
    pub requested_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResult {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub requested_at: DateTime<Utc>,
    pub effective_date: Option<NaiveDate>,
    pub queue_event_id: Uuid,
}

impl From<&RebalanceJobRecord> for EnqueueResult {
    fn from(job: &RebalanceJobRecord) -> Self {
        Self {
            job_id: job.job_id,
            status: job.status,
            requested_at: job.requested_at,
            effective_date: job.effective_date,
            queue_event_id: job.queue_event_id,
        }
    }
}

#[derive(Clone)]
pub struct JobService {
    jobs: Arc<dyn JobRepository>,
    queue: Arc<dyn QueueProducer>,
    clock: Clock,
}

impl JobService {
    #[must_use]
    pub fn new(jobs: Arc<dyn JobRepository>, queue: Arc<dyn QueueProducer>) -> Self {
        Self {
            jobs,
            queue,
            clock: system_clock(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Enqueues a rebalance for `tenant_id`.
    ///
    /// # Errors
    /// - [`RefDataError::DuplicateJob`] if a queued or running job shares the
    ///   tenant and effective date and `force` is not set
    /// - [`RefDataError::Queue`] if the message was not accepted
    /// - [`RefDataError::Storage`] if the transaction fails
    pub async fn enqueue_manual_job(
        &self,
        tenant_id: Uuid,
        request: &EnqueueRequest,
    ) -> Result<EnqueueResult> {
        let mut tx = self.jobs.begin().await?;

        let job = match self.enqueue_in(tx.as_mut(), tenant_id, request).await {
            Ok(job) => job,
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    error!(
                        tenant_id = %tenant_id,
                        error = %rollback_err,
                        cause = %err,
                        "Rebalance job rollback failed"
                    );
                }
                return Err(err);
            }
        };

        tx.commit().await?;
        info!(
            tenant_id = %tenant_id,
            job_id = %job.job_id,
            queue_event_id = %job.queue_event_id,
            effective_date = ?job.effective_date,
            force = request.force,
            "Rebalance job queued"
        );
        Ok(EnqueueResult::from(&job))
    }

    async fn enqueue_in(
        &self,
        tx: &mut dyn JobTransaction,
        tenant_id: Uuid,
        request: &EnqueueRequest,
    ) -> Result<RebalanceJobRecord> {
        if !request.force {
            if let Some(existing) = tx.find_active(tenant_id, request.effective_date).await? {
                warn!(
                    tenant_id = %tenant_id,
                    existing_job_id = %existing.job_id,
                    effective_date = ?request.effective_date,
                    "Duplicate rebalance job rejected"
                );
                return Err(RefDataError::DuplicateJob);
            }
        }

        let job = RebalanceJobRecord {
            job_id: Uuid::new_v4(),
            tenant_id,
            triggered_by: request
                .requested_by
                .clone()
                .unwrap_or_else(|| tenant_id.to_string()),
            // Stored at microsecond precision.
            requested_at: (self.clock)().trunc_subsecs(6),
            effective_date: request.effective_date,
            status: JobStatus::Queued,
            error_code: None,
            error_message: None,
            source: request.source,
            queue_event_id: Uuid::new_v4(),
        };

        let message = QueueMessage::RebalanceRequested(RebalanceRequested::for_job(&job, request.force));
        self.queue.send(&message).await?;
        tx.insert(&job).await?;
        Ok(job)
    }

    /// Looks up one of the tenant's jobs.
    ///
    /// # Errors
    /// Returns [`RefDataError::JobNotFound`] when the tenant has no such job.
    pub async fn find_job(&self, tenant_id: Uuid, job_id: Uuid) -> Result<RebalanceJobRecord> {
        self.jobs
            .find(tenant_id, job_id)
            .await?
            .ok_or(RefDataError::JobNotFound)
    }
}
