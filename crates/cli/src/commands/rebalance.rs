use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use refdata_core::AppConfig;
use refdata_data::{Database, JobSource};
use refdata_services::{build_producer, EnqueueRequest, JobService};
use uuid::Uuid;

#[derive(Args, Debug, Clone)]
pub struct RebalanceArgs {
    /// Tenant to rebalance
    #[arg(long)]
    pub tenant: Uuid,

    /// Effective date (YYYY-MM-DD); omitted means "next scheduled"
    #[arg(long)]
    pub effective_date: Option<NaiveDate>,

    /// manual_override or provider_replay
    #[arg(long, default_value = "manual_override", value_parser = parse_source)]
    pub source: JobSource,

    /// Queue even if a job for the same date is already active
    #[arg(long)]
    pub force: bool,

    /// Recorded as the job's requester
    #[arg(long, env = "USER")]
    pub requested_by: Option<String>,
}

fn parse_source(raw: &str) -> Result<JobSource, String> {
    JobSource::parse(raw).ok_or_else(|| format!("unknown source '{raw}'"))
}

/// # Errors
/// Returns an error if an active job already exists (unless forced), or if
/// storage or the queue fails.
pub async fn run_enqueue_rebalance(config: AppConfig, args: RebalanceArgs) -> Result<()> {
    let db = Database::connect(&config.database).await?;
    let queue = build_producer(&config.queue)?;
    let service = JobService::new(db.repositories().jobs, queue);

    let request = EnqueueRequest {
        effective_date: args.effective_date,
        source: args.source,
        force: args.force,
        requested_by: args.requested_by,
    };
    let result = service.enqueue_manual_job(args.tenant, &request).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
