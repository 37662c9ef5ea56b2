//! `fhirval-worker` — the queue dispatcher binary (§4.9, §5 "Queue dispatcher:
//! a single scheduler thread (or tick) plus `maxConcurrentValidations`
//! execution slots"). Shares `AppState`'s composition root with the API
//! binary so both processes validate under the same settings and persistence,
//! but only this one drains the `ValidationQueue`.

use anyhow::Context;
use fhirval_queue::{Dispatcher, DispatcherConfig};
use fhirval_server::{config::Config, logging, state::AppState};
use tokio::sync::watch;

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

    logging::init_simple_logging();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting fhirval-worker");

    let max_concurrent = config.validation.max_concurrent_validations;

    let state = match AppState::new(config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize application state");
            std::process::exit(2);
        }
    };

    let dispatcher = Dispatcher::new(
        state.queue.clone(),
        state.processor.clone(),
        DispatcherConfig { max_concurrent_validations: max_concurrent, ..DispatcherConfig::default() },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    dispatcher.run(shutdown_rx).await;
    tracing::info!("fhirval-worker shutdown complete");
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
