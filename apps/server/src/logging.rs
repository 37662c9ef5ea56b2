//! Logging initialization (SPEC_FULL.md "AMBIENT STACK"): `tracing` +
//! `tracing-subscriber`, JSON in production, pretty-printed otherwise,
//! selected by `LoggingConfig::is_production`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fhirval_server={},fhirval_worker={},tower_http=debug,sqlx=warn", config.level, config.level)))
}

/// Initializes the global subscriber. Call once, at process start, before any
/// other `tracing` call.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = build_env_filter(config);
    let registry = tracing_subscriber::registry().with(env_filter);

    if config.json || config.is_production() {
        registry.with(fmt::layer().json().with_current_span(true).with_span_list(false)).init();
    } else {
        registry.with(fmt::layer().with_target(true).with_thread_ids(false)).init();
    }

    tracing::info!(environment = %config.deployment_environment, "logging initialized");
    Ok(())
}

/// Lightweight alternative for binaries that only need `RUST_LOG`-driven
/// defaults (the worker binary, which has no HTTP-facing config surface).
pub fn init_simple_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "fhirval_worker=info,sqlx=warn".into()))
        .with(fmt::layer())
        .init();
}
