//! Queue messages and the producers that deliver them.
//!
//! A producer returning `Ok` is the only delivery signal the services rely
//! on. Messages are JSON objects discriminated by their `type` field.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use refdata_core::{QueueBackend, QueueConfig, RefDataError, Result};
use refdata_data::{JobSource, PriceVendor, RebalanceJobRecord, UniverseSource};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QueueMessage {
    #[serde(rename = "universe.rebalance.requested")]
    RebalanceRequested(RebalanceRequested),
    #[serde(rename = "universe.ingested")]
    UniverseIngested(UniverseIngested),
    #[serde(rename = "marketdata.ingested")]
    MarketDataIngested(MarketDataIngested),
}

impl QueueMessage {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RebalanceRequested(_) => "universe.rebalance.requested",
            Self::UniverseIngested(_) => "universe.ingested",
            Self::MarketDataIngested(_) => "marketdata.ingested",
        }
    }

    #[must_use]
    pub const fn tenant_id(&self) -> Uuid {
        match self {
            Self::RebalanceRequested(m) => m.tenant_id,
            Self::UniverseIngested(m) => m.tenant_id,
            Self::MarketDataIngested(m) => m.tenant_id,
        }
    }
}

/// Asks the rebalance worker to recompute a tenant's universe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceRequested {
    pub job_id: Uuid,
    pub tenant_id: Uuid,
    pub effective_date: Option<NaiveDate>,
    pub source: JobSource,
    pub force: bool,
    pub requested_at: DateTime<Utc>,
    pub queue_event_id: Uuid,
}

impl RebalanceRequested {
    #[must_use]
    pub fn for_job(job: &RebalanceJobRecord, force: bool) -> Self {
        Self {
            job_id: job.job_id,
            tenant_id: job.tenant_id,
            effective_date: job.effective_date,
            source: job.source,
            force,
            requested_at: job.requested_at,
            queue_event_id: job.queue_event_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniverseIngested {
    pub tenant_id: Uuid,
    pub snapshot_id: Uuid,
    pub as_of_date: NaiveDate,
    pub source: UniverseSource,
    pub published_at: DateTime<Utc>,
    pub hash: String,
    pub emitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketDataIngested {
    pub tenant_id: Uuid,
    pub snapshot_id: Uuid,
    pub as_of_date: NaiveDate,
    pub vendor: PriceVendor,
    pub published_at: DateTime<Utc>,
    pub hash: String,
    pub emitted_at: DateTime<Utc>,
}

/// Send-only message sink.
#[async_trait]
pub trait QueueProducer: Send + Sync {
    /// # Errors
    /// Returns [`RefDataError::Queue`] when the message was not accepted.
    async fn send(&self, message: &QueueMessage) -> Result<()>;
}

/// Keeps sent messages in process.
///
/// Backs the `memory` queue profile and tests. A failing queue rejects every
/// send, which lets tests observe rollback after a publish error.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    messages: Mutex<Vec<QueueMessage>>,
    failing: AtomicBool,
}

impl MemoryQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing() -> Self {
        let queue = Self::default();
        queue.set_failing(true);
        queue
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Messages accepted so far, oldest first.
    pub async fn messages(&self) -> Vec<QueueMessage> {
        self.messages.lock().await.clone()
    }
}

#[async_trait]
impl QueueProducer for MemoryQueue {
    async fn send(&self, message: &QueueMessage) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RefDataError::queue("memory queue is rejecting sends"));
        }
        debug!(kind = message.kind(), tenant_id = %message.tenant_id(), "Queued message in memory");
        self.messages.lock().await.push(message.clone());
        Ok(())
    }
}

/// POSTs each message as JSON to a queue gateway endpoint.
#[derive(Debug, Clone)]
pub struct HttpQueueProducer {
    http: Client,
    endpoint: String,
}

impl HttpQueueProducer {
    /// # Errors
    /// Returns [`RefDataError::Queue`] if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RefDataError::queue)?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl QueueProducer for HttpQueueProducer {
    async fn send(&self, message: &QueueMessage) -> Result<()> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(message)
            .send()
            .await
            .map_err(|e| {
                error!(kind = message.kind(), error = %e, "Queue endpoint unreachable");
                RefDataError::queue(e)
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(kind = message.kind(), status, "Queue endpoint rejected message");
            return Err(RefDataError::queue(format!(
                "queue endpoint returned {status}: {body}"
            )));
        }

        debug!(kind = message.kind(), tenant_id = %message.tenant_id(), "Published message");
        Ok(())
    }
}

/// Producer selected by `queue.backend`.
///
/// # Errors
/// Returns [`RefDataError::Config`] when the HTTP backend has no endpoint.
pub fn build_producer(config: &QueueConfig) -> Result<Arc<dyn QueueProducer>> {
    match config.backend {
        QueueBackend::Memory => Ok(Arc::new(MemoryQueue::new())),
        QueueBackend::Http => {
            let endpoint = config
                .endpoint
                .as_deref()
                .filter(|e| !e.trim().is_empty())
                .ok_or_else(|| {
                    RefDataError::Config("queue.endpoint is required for the http backend".into())
                })?;
            let producer =
                HttpQueueProducer::new(endpoint, Duration::from_millis(config.timeout_ms))?;
            Ok(Arc::new(producer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rebalance() -> QueueMessage {
        QueueMessage::RebalanceRequested(RebalanceRequested {
            job_id: Uuid::nil(),
            tenant_id: Uuid::nil(),
            effective_date: NaiveDate::from_ymd_opt(2024, 6, 21),
            source: JobSource::ManualOverride,
            force: false,
            requested_at: DateTime::parse_from_rfc3339("2024-06-20T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            queue_event_id: Uuid::nil(),
        })
    }

    #[test]
    fn rebalance_message_is_tagged_and_camel_cased() {
        let json = serde_json::to_value(rebalance()).unwrap();
        assert_eq!(json["type"], "universe.rebalance.requested");
        assert_eq!(json["effectiveDate"], "2024-06-21");
        assert_eq!(json["source"], "manual_override");
        assert_eq!(json["force"], false);
        assert!(json.get("queueEventId").is_some());
    }

    #[test]
    fn null_effective_date_is_explicit() {
        let mut message = rebalance();
        if let QueueMessage::RebalanceRequested(ref mut m) = message {
            m.effective_date = None;
        }
        let json = serde_json::to_value(&message).unwrap();
        assert!(json["effectiveDate"].is_null());
    }

    #[tokio::test]
    async fn memory_queue_records_until_failing() {
        let queue = MemoryQueue::new();
        queue.send(&rebalance()).await.unwrap();
        queue.set_failing(true);
        let err = queue.send(&rebalance()).await.unwrap_err();
        assert!(matches!(err, RefDataError::Queue(_)));
        assert_eq!(queue.messages().await.len(), 1);
    }

    #[test]
    fn http_backend_requires_endpoint() {
        let config = QueueConfig {
            backend: QueueBackend::Http,
            endpoint: None,
            timeout_ms: 1_000,
        };
        assert!(matches!(build_producer(&config), Err(RefDataError::Config(_))));
    }
}
