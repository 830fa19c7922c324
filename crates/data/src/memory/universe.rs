use async_trait::async_trait;
use chrono::NaiveDate;
use refdata_core::{RefDataError, Result};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{SnapshotStatus, UniverseSnapshotAggregate};
use crate::repositories::{preflight, CursorKey, HistoryQuery, SnapshotPage, UniverseRepository};

fn sort_key(agg: &UniverseSnapshotAggregate) -> CursorKey {
    CursorKey {
        as_of_date: agg.snapshot.as_of_date,
        effective_at: agg.snapshot.effective_at,
        snapshot_id: agg.snapshot.snapshot_id,
    }
}

/// Universe snapshots held in process memory.
#[derive(Debug, Default)]
pub struct MemoryUniverseRepository {
    snapshots: RwLock<Vec<UniverseSnapshotAggregate>>,
}

impl MemoryUniverseRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots for `tenant_id`.
    pub async fn count(&self, tenant_id: Uuid) -> usize {
        self.snapshots
            .read()
            .await
            .iter()
            .filter(|a| a.snapshot.tenant_id == tenant_id)
            .count()
    }

    /// Tenant's snapshots, newest first by `(as_of_date, effective_at, snapshot_id)`.
    async fn tenant_snapshots(&self, tenant_id: Uuid) -> Vec<UniverseSnapshotAggregate> {
        let mut rows: Vec<UniverseSnapshotAggregate> = self
            .snapshots
            .read()
            .await
            .iter()
            .filter(|a| a.snapshot.tenant_id == tenant_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| sort_key(b).cmp(&sort_key(a)));
        rows
    }
}

#[async_trait]
impl UniverseRepository for MemoryUniverseRepository {
    async fn save(&self, aggregate: &UniverseSnapshotAggregate) -> Result<()> {
        preflight::check_universe(aggregate)?;

        let mut snapshots = self.snapshots.write().await;
        if snapshots
            .iter()
            .any(|a| a.snapshot.snapshot_id == aggregate.snapshot.snapshot_id)
        {
            return Err(RefDataError::DuplicateConstituent {
                field: "snapshot_id",
                value: aggregate.snapshot.snapshot_id.to_string(),
            });
        }

        let mut stored = aggregate.clone();
        stored.constituents.sort_by_key(|c| c.position);
        snapshots.push(stored);

        info!(
            tenant_id = %aggregate.snapshot.tenant_id,
            snapshot_id = %aggregate.snapshot.snapshot_id,
            "Saved universe snapshot in memory"
        );
        Ok(())
    }

    async fn get_latest(
        &self,
        tenant_id: Uuid,
        as_of: Option<NaiveDate>,
    ) -> Result<Option<UniverseSnapshotAggregate>> {
        Ok(self
            .tenant_snapshots(tenant_id)
            .await
            .into_iter()
            .find(|a| as_of.map_or(true, |cutoff| a.snapshot.as_of_date <= cutoff)))
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        query: &HistoryQuery,
    ) -> Result<SnapshotPage<UniverseSnapshotAggregate>> {
        let all = self.tenant_snapshots(tenant_id).await;

        let cursor = query.cursor.and_then(|id| {
            let key = all
                .iter()
                .find(|a| a.snapshot.snapshot_id == id)
                .map(sort_key);
            if key.is_none() {
                warn!(%tenant_id, cursor = %id, "Ignoring unknown history cursor");
            }
            key
        });

        let matching: Vec<UniverseSnapshotAggregate> = all
            .into_iter()
            .filter(|a| query.contains(a.snapshot.as_of_date))
            .collect();
        let total_count = i64::try_from(matching.len()).unwrap_or(i64::MAX);

        let items: Vec<UniverseSnapshotAggregate> = matching
            .into_iter()
            .filter(|a| cursor.map_or(true, |key| sort_key(a) < key))
            .take(query.limit.as_usize())
            .collect();

        let next_cursor = if items.len() == query.limit.as_usize() {
            items.last().map(|a| a.snapshot.snapshot_id)
        } else {
            None
        };

        Ok(SnapshotPage {
            items,
            next_cursor,
            total_count,
        })
    }

    async fn mark_superseded(&self, tenant_id: Uuid, snapshot_id: Uuid) -> Result<bool> {
        let mut snapshots = self.snapshots.write().await;
        let target = snapshots.iter_mut().find(|a| {
            a.snapshot.tenant_id == tenant_id
                && a.snapshot.snapshot_id == snapshot_id
                && a.snapshot.status == SnapshotStatus::Active
        });
        match target {
            Some(agg) => {
                agg.snapshot.status = SnapshotStatus::Superseded;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
