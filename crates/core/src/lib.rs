//! Shared building blocks for the reference data service.
//!
//! - Application configuration and its figment loader
//! - The `RefDataError` taxonomy used by every crate
//! - The resolved caller identity (`AuthContext`)

pub mod auth;
pub mod config;
pub mod config_loader;
pub mod error;

pub use auth::{AuthContext, ROLE_ADMIN, ROLE_VIEWER};
pub use config::{
    AppConfig, AuthConfig, DatabaseConfig, QueueBackend, QueueConfig, ServerConfig,
    UniverseConfig,
};
pub use config_loader::ConfigLoader;
pub use error::{FieldViolation, QueueSendError, RefDataError, ValidationErrors};

/// Result alias used across the workspace.
pub type Result<T, E = RefDataError> = std::result::Result<T, E>;
