use crate::config::AppConfig;
use crate::error::RefDataError;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads application configuration by layering defaults, `config/Config.toml`
    /// and `REFDATA_`-prefixed environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load() -> Result<AppConfig, RefDataError> {
        Self::load_from("config/Config.toml")
    }

    /// Loads configuration from an explicit TOML path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed, or if the
    /// merged configuration does not match [`AppConfig`].
    pub fn load_from(path: &str) -> Result<AppConfig, RefDataError> {
        Self::base(path)
            .extract()
            .map_err(|e| RefDataError::Config(e.to_string()))
    }

    /// Loads application configuration with a specific profile.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_with_profile(profile: &str) -> Result<AppConfig, RefDataError> {
        Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file("config/Config.toml"))
            .merge(Toml::file(format!("config/Config.{profile}.toml")))
            .merge(Env::prefixed("REFDATA_").split("__"))
            .extract()
            .map_err(|e| RefDataError::Config(e.to_string()))
    }

    fn base(path: &str) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("REFDATA_").split("__"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueBackend;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = ConfigLoader::load_from("does/not/exist.toml").unwrap();
            assert_eq!(config.server.port, 8080);
            assert_eq!(config.universe.constituent_count, 10);
            assert_eq!(config.queue.backend, QueueBackend::Memory);
            Ok(())
        });
    }

    #[test]
    fn toml_and_env_layers_override_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "Config.toml",
                r#"
                [server]
                host = "127.0.0.1"
                port = 9000

                [queue]
                backend = "http"
                endpoint = "http://queue.local/publish"
                "#,
            )?;
            jail.set_env("REFDATA_DATABASE__MAX_CONNECTIONS", "3");
            jail.set_env("REFDATA_UNIVERSE__CONSTITUENT_COUNT", "25");

            let config = ConfigLoader::load_from("Config.toml").unwrap();
            assert_eq!(config.server.bind_addr(), "127.0.0.1:9000");
            assert_eq!(config.queue.backend, QueueBackend::Http);
            assert_eq!(
                config.queue.endpoint.as_deref(),
                Some("http://queue.local/publish")
            );
            assert_eq!(config.database.max_connections, 3);
            assert_eq!(config.universe.constituent_count, 25);
            Ok(())
        });
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("Config.toml", "[server]\nport = \"not a port\"\n")?;
            let err = ConfigLoader::load_from("Config.toml").unwrap_err();
            assert!(matches!(err, RefDataError::Config(_)));
            Ok(())
        });
    }
}
