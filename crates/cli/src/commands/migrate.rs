use anyhow::Result;
use clap::Args;
use refdata_core::AppConfig;
use refdata_data::Database;

#[derive(Args, Debug, Clone)]
pub struct MigrateArgs {
    /// Database connection URL, overriding `database.url`
    #[arg(long, env = "DATABASE_URL")]
    pub db_url: Option<String>,
}

/// Applies the embedded schema migrations.
///
/// # Errors
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run_migrate(mut config: AppConfig, args: MigrateArgs) -> Result<()> {
    if let Some(url) = args.db_url {
        config.database.url = url;
    }
    let db = Database::connect(&config.database).await?;
    db.migrate().await?;
    println!("Migrations applied");
    Ok(())
}
