//! `fhirval-server` — the HTTP API binary (spec.md §6). For the queue
//! dispatcher that actually executes enqueued validations, see the
//! `fhirval-worker` binary (`src/worker.rs`); this process only accepts
//! requests and serves reads.

use anyhow::Context;
use fhirval_server::{api::create_router, config::Config, logging, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("invalid configuration: {e}");
        std::process::exit(1);
    }

    logging::init_logging(&config.logging).context("failed to initialize logging")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.logging.deployment_environment,
        "starting fhirval-server"
    );

    let addr = config.socket_addr().context("failed to determine socket address")?;

    let state = match AppState::new(config).await {
        Ok(state) => state,
        Err(e) => {
            // SS 6 exit code 2: persistence unreachable at startup.
            tracing::error!(error = %e, "failed to initialize application state");
            std::process::exit(2);
        }
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind TCP listener on {addr}"))?;

    tracing::info!(listen_addr = %addr, "fhirval-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated unexpectedly")?;

    tracing::info!("fhirval-server shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let sigint = tokio::signal::ctrl_c();

    tokio::select! {
        _ = sigint => tracing::info!("SIGINT received, shutting down"),
        _ = sigterm.recv() => tracing::info!("SIGTERM received, shutting down"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("failed to install CTRL+C handler");
    tracing::info!("shutdown signal received");
}
