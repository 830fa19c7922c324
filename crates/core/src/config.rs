use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    #[serde(default)]
    pub universe: UniverseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// Returns the `host:port` pair the listener binds to.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

const fn default_acquire_timeout_secs() -> u64 {
    5
}

/// Where queue messages are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueBackend {
    /// Messages are kept in process. Local development only.
    Memory,
    /// Messages are POSTed as JSON to `QueueConfig::endpoint`.
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub backend: QueueBackend,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_queue_timeout_ms")]
    pub timeout_ms: u64,
}

const fn default_queue_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseConfig {
    /// Exact number of constituents every universe snapshot must carry.
    pub constituent_count: usize,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            constituent_count: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared secret the upstream gateway sends in `x-gateway-token`.
    /// When unset, identity headers are trusted as-is.
    #[serde(default)]
    pub gateway_token: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/refdata".to_string(),
                max_connections: 10,
                acquire_timeout_secs: default_acquire_timeout_secs(),
            },
            queue: QueueConfig {
                backend: QueueBackend::Memory,
                endpoint: None,
                timeout_ms: default_queue_timeout_ms(),
            },
            universe: UniverseConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}
