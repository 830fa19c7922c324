use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use refdata_core::AppConfig;
use refdata_data::{Database, Repositories, UniverseSnapshotBuilder};
use refdata_services::build_producer;
use refdata_web_api::{ApiServer, AppState, GatewayHeaderAuth};

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Listen address, overriding `server.host`/`server.port`
    #[arg(short, long)]
    pub addr: Option<String>,

    /// Keep all state in process instead of Postgres (local development)
    #[arg(long)]
    pub in_memory: bool,

    /// Apply migrations before serving
    #[arg(long)]
    pub migrate: bool,
}

/// Wires repositories, queue and auth from `config` and serves the API.
///
/// # Errors
/// Returns an error if the database, queue or listener cannot be set up.
pub async fn run_serve(config: AppConfig, args: ServeArgs) -> Result<()> {
    let repos = if args.in_memory {
        tracing::warn!("Serving from in-memory repositories; data is lost on exit");
        Repositories::in_memory()
    } else {
        let db = Database::connect(&config.database).await?;
        if args.migrate {
            db.migrate().await?;
        }
        db.repositories()
    };

    let queue = build_producer(&config.queue)?;
    let auth = Arc::new(GatewayHeaderAuth::new(config.auth.gateway_token.clone()));
    let builder = UniverseSnapshotBuilder::new(config.universe.constituent_count);
    let state = AppState::new(&repos, queue, auth, builder);

    let addr = args.addr.unwrap_or_else(|| config.server.bind_addr());
    tracing::info!(addr = %addr, queue = ?config.queue.backend, "Starting reference data API");
    ApiServer::new(state).serve(&addr).await
}
