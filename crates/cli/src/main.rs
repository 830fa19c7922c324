use clap::{Parser, Subcommand};

mod commands;

use commands::{IngestArgs, MigrateArgs, RebalanceArgs, ServeArgs};

#[derive(Parser)]
#[command(name = "refdata")]
#[command(about = "Tenant-scoped reference data service", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, default_value = "config/Config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve(ServeArgs),
    /// Apply database migrations
    Migrate(MigrateArgs),
    /// Build, store and announce a universe snapshot from a JSON file
    IngestUniverse(IngestArgs),
    /// Build, store and announce a price snapshot from a JSON file
    IngestPrices(IngestArgs),
    /// Queue a manual universe rebalance for a tenant
    EnqueueRebalance(RebalanceArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = refdata_core::ConfigLoader::load_from(&cli.config)?;

    match cli.command {
        Commands::Serve(args) => commands::run_serve(config, args).await?,
        Commands::Migrate(args) => commands::run_migrate(config, args).await?,
        Commands::IngestUniverse(args) => commands::run_ingest_universe(config, args).await?,
        Commands::IngestPrices(args) => commands::run_ingest_prices(config, args).await?,
        Commands::EnqueueRebalance(args) => commands::run_enqueue_rebalance(config, args).await?,
    }

    Ok(())
}
