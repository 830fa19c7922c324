//! HTTP surface for universe snapshots, market data and rebalance jobs.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod params;
pub mod server;
pub mod state;

pub use auth::{AuthError, AuthService, GatewayHeaderAuth};
pub use error::{ApiError, ApiResult};
pub use server::ApiServer;
pub use state::AppState;
