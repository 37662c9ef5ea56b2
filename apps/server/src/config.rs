//! Configuration (SS 6 "Configuration env"): environment-variable driven,
//! validated once at startup before the listener binds. A bad config is exit
//! code 1 (SS 6 "Exit codes").

use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_request_body_size: usize,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_request_body_size: 10 * 1024 * 1024,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `LOG_LEVEL` (SS 6).
    pub level: String,
    /// `NODE_ENV`/`APP_ENV` (SS 6): enables verbose logs and SSE test messages
    /// outside of `"production"`.
    pub deployment_environment: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            deployment_environment: "development".to_string(),
            json: false,
        }
    }
}

impl LoggingConfig {
    pub fn is_production(&self) -> bool {
        self.deployment_environment.eq_ignore_ascii_case("production")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// `DATABASE_URL` (SS 6). Unset selects the in-memory store (a
    /// zero-configuration profile for local runs and tests).
    pub database_url: Option<String>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self { database_url: None }
    }
}

/// Operational knobs this expansion adds beyond spec.md's own configuration
/// env list (SPEC_FULL.md "AMBIENT STACK / Configuration").
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// SS 9 Open Question: the 50,000-resource-per-type skip threshold,
    /// exposed as configuration rather than hardcoded policy.
    pub bulk_type_skip_threshold: u64,
    pub bulk_valid_score_threshold: u8,
    pub bulk_batch_size: u32,
    pub max_concurrent_validations: usize,
    pub queue_max_size: usize,
    pub queue_default_max_attempts: u32,
    pub dashboard_cache_ttl_seconds: u64,
    /// `TERMINOLOGY_DEFAULT_BASE` (SS 6): override for the default terminology
    /// endpoint the router falls back to.
    pub terminology_default_base: String,
    pub terminology_request_timeout_ms: u64,
    pub terminology_health_timeout_ms: u64,
    pub terminology_cache_max_entries: usize,
    pub terminology_cache_ttl_seconds: u64,
    /// `FHIR_SERVER_URL`: the server the bulk orchestrator and dashboard walk
    /// via `GET /metadata` and paged search (SS 4.9, 4.13). Out of scope per
    /// spec.md SS 1: this crate never hosts that server itself.
    pub fhir_server_base_url: String,
    pub fhir_server_timeout_ms: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            bulk_type_skip_threshold: 50_000,
            bulk_valid_score_threshold: 95,
            bulk_batch_size: 50,
            max_concurrent_validations: 6,
            queue_max_size: 1_000,
            queue_default_max_attempts: 3,
            dashboard_cache_ttl_seconds: 300,
            terminology_default_base: "https://tx.fhir.org".to_string(),
            terminology_request_timeout_ms: 10_000,
            terminology_health_timeout_ms: 5_000,
            terminology_cache_max_entries: 10_000,
            terminology_cache_ttl_seconds: 3_600,
            fhir_server_base_url: "http://localhost:8080".to_string(),
            fhir_server_timeout_ms: 30_000,
        }
    }
}

impl ValidationConfig {
    pub fn terminology_request_timeout(&self) -> Duration {
        Duration::from_millis(self.terminology_request_timeout_ms)
    }

    pub fn terminology_health_timeout(&self) -> Duration {
        Duration::from_millis(self.terminology_health_timeout_ms)
    }

    pub fn terminology_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.terminology_cache_ttl_seconds)
    }

    pub fn dashboard_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.dashboard_cache_ttl_seconds)
    }

    pub fn fhir_server_timeout(&self) -> Duration {
        Duration::from_millis(self.fhir_server_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub persistence: PersistenceConfig,
    pub validation: ValidationConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Loads from (in ascending precedence) built-in defaults, a `.env` file if
    /// present, then environment variables, matching the teacher's
    /// `config` + `dotenvy` convention.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.max_request_body_size", 10 * 1024 * 1024i64)?
            .set_default("server.cors_origins", Vec::<String>::new())?
            .set_default("logging.level", "info")?
            .set_default("logging.deployment_environment", "development")?
            .set_default("logging.json", false)?
            .set_default("validation.bulk_type_skip_threshold", 50_000i64)?
            .set_default("validation.bulk_valid_score_threshold", 95)?
            .set_default("validation.bulk_batch_size", 50)?
            .set_default("validation.max_concurrent_validations", 6)?
            .set_default("validation.queue_max_size", 1_000)?
            .set_default("validation.queue_default_max_attempts", 3)?
            .set_default("validation.dashboard_cache_ttl_seconds", 300i64)?
            .set_default("validation.terminology_default_base", "https://tx.fhir.org")?
            .set_default("validation.terminology_request_timeout_ms", 10_000i64)?
            .set_default("validation.terminology_health_timeout_ms", 5_000i64)?
            .set_default("validation.terminology_cache_max_entries", 10_000i64)?
            .set_default("validation.terminology_cache_ttl_seconds", 3_600i64)?
            .set_default("validation.fhir_server_base_url", "http://localhost:8080")?
            .set_default("validation.fhir_server_timeout_ms", 30_000i64)?
            .add_source(
                config::Environment::default()
                    .try_parsing(true)
                    .separator("__")
                    .list_separator(","),
            );

        let mut cfg: Config = builder.build()?.try_deserialize()?;

        if let Ok(database_url) = std::env::var("DATABASE_URL") {
            cfg.persistence.database_url = Some(database_url);
        }
        if let Ok(log_level) = std::env::var("LOG_LEVEL") {
            cfg.logging.level = log_level;
        }
        if let Ok(env) = std::env::var("APP_ENV").or_else(|_| std::env::var("NODE_ENV")) {
            cfg.logging.deployment_environment = env;
        }
        if let Ok(base) = std::env::var("TERMINOLOGY_DEFAULT_BASE") {
            cfg.validation.terminology_default_base = base;
        }
        if let Ok(base) = std::env::var("FHIR_SERVER_URL") {
            cfg.validation.fhir_server_base_url = base;
        }

        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be nonzero".to_string()));
        }
        if self.validation.max_concurrent_validations == 0 {
            return Err(ConfigError::Invalid("validation.max_concurrent_validations must be nonzero".to_string()));
        }
        if self.validation.terminology_default_base.is_empty() {
            return Err(ConfigError::Invalid("validation.terminology_default_base must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("invalid server.host/port: {e}")))
    }
}
