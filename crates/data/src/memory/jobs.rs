use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use refdata_core::{RefDataError, Result};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::models::{JobStatus, RebalanceJobRecord};
use crate::repositories::{JobRepository, JobTransaction};

/// Rebalance jobs held in process memory.
///
/// One transaction at a time holds the gate, which gives the same
/// check-then-insert isolation the Postgres advisory lock provides.
#[derive(Debug, Default)]
pub struct MemoryJobRepository {
    jobs: Arc<RwLock<Vec<RebalanceJobRecord>>>,
    gate: Arc<Mutex<()>>,
}

impl MemoryJobRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed jobs for `tenant_id`, in insertion order.
    pub async fn jobs(&self, tenant_id: Uuid) -> Vec<RebalanceJobRecord> {
        self.jobs
            .read()
            .await
            .iter()
            .filter(|j| j.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    /// Moves a job to a new status, as the queue worker would.
    pub async fn set_status(&self, job_id: Uuid, status: JobStatus) -> bool {
        let mut jobs = self.jobs.write().await;
        match jobs.iter_mut().find(|j| j.job_id == job_id) {
            Some(job) => {
                job.status = status;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl JobRepository for MemoryJobRepository {
    async fn begin(&self) -> Result<Box<dyn JobTransaction>> {
        let guard = Arc::clone(&self.gate).lock_owned().await;
        Ok(Box::new(MemoryJobTransaction {
            _guard: guard,
            jobs: Arc::clone(&self.jobs),
            pending: Vec::new(),
        }))
    }

    async fn find(&self, tenant_id: Uuid, job_id: Uuid) -> Result<Option<RebalanceJobRecord>> {
        Ok(self
            .jobs
            .read()
            .await
            .iter()
            .find(|j| j.tenant_id == tenant_id && j.job_id == job_id)
            .cloned())
    }
}

/// Buffers inserts until commit; dropping it discards them.
pub struct MemoryJobTransaction {
    _guard: OwnedMutexGuard<()>,
    jobs: Arc<RwLock<Vec<RebalanceJobRecord>>>,
    pending: Vec<RebalanceJobRecord>,
}

#[async_trait]
impl JobTransaction for MemoryJobTransaction {
    async fn find_active(
        &mut self,
        tenant_id: Uuid,
        effective_date: Option<NaiveDate>,
    ) -> Result<Option<RebalanceJobRecord>> {
        let committed = self.jobs.read().await;
        Ok(committed
            .iter()
            .chain(self.pending.iter())
            .filter(|j| {
                j.tenant_id == tenant_id
                    && j.effective_date == effective_date
                    && j.status.is_active()
            })
            .max_by_key(|j| j.requested_at)
            .cloned())
    }

    async fn insert(&mut self, job: &RebalanceJobRecord) -> Result<()> {
        let committed = self.jobs.read().await;
        let clash = committed
            .iter()
            .chain(self.pending.iter())
            .any(|j| j.job_id == job.job_id || j.queue_event_id == job.queue_event_id);
        drop(committed);
        if clash {
            return Err(RefDataError::CorruptRow {
                table: "rebalance_jobs",
                message: format!("job {} or its queue event already exists", job.job_id),
            });
        }
        self.pending.push(job.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        jobs.extend(self.pending.iter().cloned());
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
