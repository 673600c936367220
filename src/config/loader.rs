//! Configuration Loader
//!
//! Environment-aware loading built on the `config` crate:
//! 0. Built-in defaults from `CatalogConfig::default()`
//! 1. Optional TOML file at `CATALOG_CONFIG_PATH` (default `config/catalog.toml`)
//! 2. `CATALOG__SECTION__KEY` environment overrides
//! 3. `DATABASE_URL` / `REDIS_URL` / `RABBITMQ_URL` when set
//! 4. Validation

use super::error::{ConfigResult, ConfigurationError};
use super::{redact_url, CatalogConfig};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_CONFIG_PATH: &str = "config/catalog.toml";

/// Loaded configuration plus where it came from
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: CatalogConfig,
    environment: String,
    source_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        let path = env::var("CATALOG_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from_path(&path)
    }

    /// Load configuration from a specific TOML file; a missing file is not an error
    pub fn load_from_path(path: &Path) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();

        debug!(
            environment = %environment,
            path = %path.display(),
            "Loading catalog configuration"
        );

        let defaults = config::Config::try_from(&CatalogConfig::default())
            .map_err(|e| ConfigurationError::load_error("defaults", e))?;

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("CATALOG")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.url", env::var("DATABASE_URL").ok())
            .and_then(|b| b.set_override_option("cache.redis.url", env::var("REDIS_URL").ok()))
            .and_then(|b| {
                b.set_override_option("queue.rabbitmq.url", env::var("RABBITMQ_URL").ok())
            })
            .map_err(|e| ConfigurationError::load_error("environment", e))?
            .build()
            .map_err(|e| ConfigurationError::load_error(path.display().to_string(), e))?;

        let config: CatalogConfig = settings
            .try_deserialize()
            .map_err(|e| ConfigurationError::DeserializationError {
                error: e.to_string(),
            })?;

        let source_path = path.exists().then(|| path.to_path_buf());
        Self::from_config_with_env(config, &environment, source_path)
    }

    /// Wrap an already-built configuration (tests, embedding)
    pub fn from_config(config: CatalogConfig) -> ConfigResult<Arc<ConfigManager>> {
        Self::from_config_with_env(config, &Self::detect_environment(), None)
    }

    fn from_config_with_env(
        config: CatalogConfig,
        environment: &str,
        source_path: Option<PathBuf>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;

        info!(
            environment = %environment,
            database_url = %redact_url(&config.database.url),
            cache_backend = ?config.cache.backend,
            queue_backend = ?config.queue.backend,
            queue_name = %config.queue.queue_name,
            "✅ Configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            source_path,
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// The TOML file that contributed to this configuration, if any
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Current environment from `CATALOG_ENV`, then `APP_ENV`
    pub fn detect_environment() -> String {
        env::var("CATALOG_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }
}
