//! Postgres rebalance job repository.
//!
//! The duplicate check takes a transaction-scoped advisory lock keyed on the
//! tenant and effective date. Concurrent enqueues for one key queue up on
//! that lock; different keys never contend.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use refdata_core::{RefDataError, Result};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{JobRepository, JobTransaction};
use crate::models::{JobSource, JobStatus, RebalanceJobRecord};

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    job_id: Uuid,
    tenant_id: Uuid,
    triggered_by: String,
    requested_at: DateTime<Utc>,
    effective_date: Option<NaiveDate>,
    status: String,
    error_code: Option<String>,
    error_message: Option<String>,
    source: String,
    queue_event_id: Uuid,
}

impl TryFrom<JobRow> for RebalanceJobRecord {
    type Error = RefDataError;

    fn try_from(row: JobRow) -> Result<Self> {
        let status = JobStatus::parse(&row.status).ok_or_else(|| RefDataError::CorruptRow {
            table: "rebalance_jobs",
            message: format!("unknown status {}", row.status),
        })?;
        let source = JobSource::parse(&row.source).ok_or_else(|| RefDataError::CorruptRow {
            table: "rebalance_jobs",
            message: format!("unknown source {}", row.source),
        })?;
        Ok(Self {
            job_id: row.job_id,
            tenant_id: row.tenant_id,
            triggered_by: row.triggered_by,
            requested_at: row.requested_at,
            effective_date: row.effective_date,
            status,
            error_code: row.error_code,
            error_message: row.error_message,
            source,
            queue_event_id: row.queue_event_id,
        })
    }
}

/// Advisory lock key for one dedup key. A null date is its own key.
pub(crate) fn dedup_lock_key(tenant_id: Uuid, effective_date: Option<NaiveDate>) -> String {
    match effective_date {
        Some(date) => format!("rebalance:{tenant_id}:{date}"),
        None => format!("rebalance:{tenant_id}:next"),
    }
}

#[derive(Debug, Clone)]
pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn begin(&self) -> Result<Box<dyn JobTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgJobTransaction { tx }))
    }

    async fn find(&self, tenant_id: Uuid, job_id: Uuid) -> Result<Option<RebalanceJobRecord>> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT job_id, tenant_id, triggered_by, requested_at, effective_date, status,
                   error_code, error_message, source, queue_event_id
            FROM rebalance_jobs
            WHERE tenant_id = $1 AND job_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }
}

/// An open enqueue transaction on one pooled connection.
pub struct PgJobTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl JobTransaction for PgJobTransaction {
    async fn find_active(
        &mut self,
        tenant_id: Uuid,
        effective_date: Option<NaiveDate>,
    ) -> Result<Option<RebalanceJobRecord>> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(dedup_lock_key(tenant_id, effective_date))
            .execute(&mut *self.tx)
            .await?;

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT job_id, tenant_id, triggered_by, requested_at, effective_date, status,
                   error_code, error_message, source, queue_event_id
            FROM rebalance_jobs
            WHERE tenant_id = $1
              AND effective_date IS NOT DISTINCT FROM $2
              AND status IN ('queued', 'running')
            ORDER BY requested_at DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(effective_date)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn insert(&mut self, job: &RebalanceJobRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO rebalance_jobs
                (job_id, tenant_id, triggered_by, requested_at, effective_date, status,
                 error_code, error_message, source, queue_event_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(job.job_id)
        .bind(job.tenant_id)
        .bind(&job.triggered_by)
        .bind(job.requested_at)
        .bind(job.effective_date)
        .bind(job.status.as_str())
        .bind(&job.error_code)
        .bind(&job.error_message)
        .bind(job.source.as_str())
        .bind(job.queue_event_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
