//! Rebalance job data model.
//!
//! Jobs are created `queued` in the same transaction that publishes their
//! queue message. Later transitions belong to the worker consuming the queue.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceJobRecord {
    pub job_id: Uuid,
    pub tenant_id: Uuid,
    /// User id of the requester, or the tenant id when none was supplied.
    pub triggered_by: String,
    pub requested_at: DateTime<Utc>,
    /// `None` means "next scheduled rebalance"; it is a dedup key of its own.
    pub effective_date: Option<NaiveDate>,
    pub status: JobStatus,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub source: JobSource,
    /// Correlates the row with the published queue message.
    pub queue_event_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub const ALL: [Self; 4] = [Self::Queued, Self::Running, Self::Succeeded, Self::Failed];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }

    /// Queued and running jobs block a new job for the same dedup key.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }
}

/// Why a rebalance was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobSource {
    ManualOverride,
    ProviderReplay,
}

impl JobSource {
    pub const ALL: [Self; 2] = [Self::ManualOverride, Self::ProviderReplay];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ManualOverride => "manual_override",
            Self::ProviderReplay => "provider_replay",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

impl Default for JobSource {
    fn default() -> Self {
        Self::ManualOverride
    }
}

impl std::str::FromStr for JobSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown job source: {s}"))
    }
}
