//! Subcommands of the `refdata` binary.

pub mod ingest;
pub mod migrate;
pub mod rebalance;
pub mod serve;

pub use ingest::{run_ingest_prices, run_ingest_universe, IngestArgs};
pub use migrate::{run_migrate, MigrateArgs};
pub use rebalance::{run_enqueue_rebalance, RebalanceArgs};
pub use serve::{run_serve, ServeArgs};
