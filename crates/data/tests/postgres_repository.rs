//! Round trips against a real Postgres.
//!
//! Skipped unless `REFDATA_TEST_DATABASE_URL` points at a disposable database.

use std::time::Duration;

use chrono::NaiveDate;
use refdata_core::{DatabaseConfig, RefDataError};
use refdata_data::snapshot::ConstituentInput;
use refdata_data::{
    build_universe_snapshot, Database, HistoryQuery, JobRepository, JobSource, JobStatus,
    JobTransaction, PageLimit, RebalanceJobRecord, UniverseRepository, UniverseSnapshotInput,
};
use rust_decimal::Decimal;
use uuid::Uuid;

async fn database() -> Option<Database> {
    let url = std::env::var("REFDATA_TEST_DATABASE_URL").ok()?;
    let config = DatabaseConfig {
        url,
        max_connections: 5,
        acquire_timeout_secs: 5,
    };
    let db = Database::connect(&config).await.expect("connect to test database");
    db.migrate().await.expect("apply migrations");
    Some(db)
}

fn input(as_of: &str) -> UniverseSnapshotInput {
    UniverseSnapshotInput {
        as_of_date: as_of.to_string(),
        effective_at: format!("{as_of}T21:00:00Z"),
        published_at: format!("{as_of}T21:30:00Z"),
        source: "spdj".to_string(),
        constituents: (0..10)
            .map(|i| ConstituentInput {
                ticker: format!("PG{}", char::from(b'A' + i as u8)),
                free_float_market_cap: Decimal::from(5_000 - i * 100),
                sector: Some("Financials".to_string()),
                cusip: None,
                isin: None,
                currency: None,
            })
            .collect(),
    }
}

fn job_record(tenant: Uuid, effective_date: Option<NaiveDate>) -> RebalanceJobRecord {
    RebalanceJobRecord {
        job_id: Uuid::new_v4(),
        tenant_id: tenant,
        triggered_by: tenant.to_string(),
        requested_at: chrono::Utc::now(),
        effective_date,
        status: JobStatus::Queued,
        error_code: None,
        error_message: None,
        source: JobSource::ManualOverride,
        queue_event_id: Uuid::new_v4(),
    }
}

#[tokio::test]
async fn save_then_get_latest_matches_built_aggregate() {
    let Some(db) = database().await else {
        return;
    };
    let repos = db.repositories();
    let tenant = Uuid::new_v4();

    let built = build_universe_snapshot(tenant, &input("2024-03-29")).unwrap();
    repos.universe.save(&built).await.unwrap();

    let latest = repos.universe.get_latest(tenant, None).await.unwrap().unwrap();
    assert_eq!(latest.snapshot.as_of_date, built.snapshot.as_of_date);
    assert_eq!(latest.snapshot.hash, built.snapshot.hash);
    assert_eq!(latest.constituents.len(), 10);
    for (stored, original) in latest.constituents.iter().zip(&built.constituents) {
        assert_eq!(stored.ticker, original.ticker);
        assert_eq!(stored.position, original.position);
        assert_eq!(stored.weight, original.weight);
    }
}

#[tokio::test]
async fn failed_child_insert_leaves_no_snapshot() {
    let Some(db) = database().await else {
        return;
    };
    let tenant = Uuid::new_v4();
    let mut built = build_universe_snapshot(tenant, &input("2024-04-30")).unwrap();
    // Passes the pre-flight check but violates the weight CHECK constraint.
    built.constituents[9].weight = Decimal::from(2);

    let err = db.repositories().universe.save(&built).await.unwrap_err();
    assert!(matches!(err, RefDataError::Storage(_)));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM universe_snapshots WHERE tenant_id = $1")
        .bind(tenant)
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn history_walks_backward_with_all_filters() {
    let Some(db) = database().await else {
        return;
    };
    let repo = db.repositories().universe;
    let tenant = Uuid::new_v4();
    for day in ["2024-01-31", "2024-02-29", "2024-03-29", "2024-04-30"] {
        repo.save(&build_universe_snapshot(tenant, &input(day)).unwrap())
            .await
            .unwrap();
    }

    let mut query = HistoryQuery {
        start_date: NaiveDate::from_ymd_opt(2024, 2, 1),
        end_date: NaiveDate::from_ymd_opt(2024, 4, 30),
        cursor: None,
        limit: PageLimit::new(1).unwrap(),
    };
    let mut dates = Vec::new();
    loop {
        let page = repo.list(tenant, &query).await.unwrap();
        assert_eq!(page.total_count, 3);
        dates.extend(page.items.iter().map(|a| a.snapshot.as_of_date));
        match page.next_cursor {
            Some(cursor) => query.cursor = Some(cursor),
            None => break,
        }
    }
    assert_eq!(
        dates,
        vec![
            NaiveDate::from_ymd_opt(2024, 4, 30).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 29).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
        ]
    );
}

#[tokio::test]
async fn job_transaction_rollback_discards_insert() {
    let Some(db) = database().await else {
        return;
    };
    let jobs = db.repositories().jobs;
    let tenant = Uuid::new_v4();
    let record = job_record(tenant, None);

    let mut tx = jobs.begin().await.unwrap();
    assert!(tx.find_active(tenant, None).await.unwrap().is_none());
    tx.insert(&record).await.unwrap();
    tx.rollback().await.unwrap();
    assert!(jobs.find(tenant, record.job_id).await.unwrap().is_none());

    let mut tx = jobs.begin().await.unwrap();
    tx.insert(&record).await.unwrap();
    tx.commit().await.unwrap();
    let stored = jobs.find(tenant, record.job_id).await.unwrap().unwrap();
    assert_eq!(stored.queue_event_id, record.queue_event_id);
    assert_eq!(stored.status, JobStatus::Queued);
    assert!(stored.effective_date.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn same_dedup_key_waits_for_open_transaction() {
    let Some(db) = database().await else {
        return;
    };
    let jobs = db.repositories().jobs;
    let tenant = Uuid::new_v4();
    let day = NaiveDate::from_ymd_opt(2024, 6, 21);
    let first = job_record(tenant, day);

    let mut tx_a = jobs.begin().await.unwrap();
    assert!(tx_a.find_active(tenant, day).await.unwrap().is_none());
    tx_a.insert(&first).await.unwrap();

    let contender = {
        let jobs = jobs.clone();
        tokio::spawn(async move {
            let mut tx_b = jobs.begin().await.unwrap();
            let seen = tx_b.find_active(tenant, day).await.unwrap();
            tx_b.rollback().await.unwrap();
            seen
        })
    };

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!contender.is_finished(), "second check ran while the first transaction was open");

    tx_a.commit().await.unwrap();
    let seen = tokio::time::timeout(Duration::from_secs(5), contender)
        .await
        .expect("second check still blocked after commit")
        .unwrap()
        .expect("second check should see the committed job");
    assert_eq!(seen.job_id, first.job_id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn different_dedup_keys_do_not_block() {
    let Some(db) = database().await else {
        return;
    };
    let jobs = db.repositories().jobs;
    let tenant = Uuid::new_v4();
    let june = NaiveDate::from_ymd_opt(2024, 6, 21);
    let july = NaiveDate::from_ymd_opt(2024, 7, 19);

    let mut tx_a = jobs.begin().await.unwrap();
    assert!(tx_a.find_active(tenant, june).await.unwrap().is_none());
    tx_a.insert(&job_record(tenant, june)).await.unwrap();

    let mut tx_b = jobs.begin().await.unwrap();
    let other_date = tokio::time::timeout(Duration::from_secs(2), tx_b.find_active(tenant, july))
        .await
        .expect("other date blocked by an unrelated transaction")
        .unwrap();
    assert!(other_date.is_none());

    let mut tx_c = jobs.begin().await.unwrap();
    let other_tenant =
        tokio::time::timeout(Duration::from_secs(2), tx_c.find_active(Uuid::new_v4(), june))
            .await
            .expect("other tenant blocked by an unrelated transaction")
            .unwrap();
    assert!(other_tenant.is_none());

    tx_c.rollback().await.unwrap();
    tx_b.rollback().await.unwrap();
    tx_a.rollback().await.unwrap();
}
