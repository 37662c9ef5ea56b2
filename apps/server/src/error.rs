//! API error envelope (SS 7): `{success: false, message, error: CODE, details?, timestamp}`.
//! Internal failures are logged with full detail and never leak a stack trace
//! to the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Input(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    DependencyUnavailable(String),

    #[error(transparent)]
    Settings(#[from] fhirval_settings::SettingsError),

    #[error(transparent)]
    Queue(#[from] fhirval_queue::QueueError),

    #[error(transparent)]
    Persistence(#[from] fhirval_persistence::PersistenceError),

    #[error(transparent)]
    Bulk(#[from] fhirval_orchestrator::BulkError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Error::Input(_) => (StatusCode::BAD_REQUEST, "INPUT_ERROR"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Error::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Error::DependencyUnavailable(_) => (StatusCode::BAD_GATEWAY, "DEPENDENCY_UNAVAILABLE"),
            Error::Settings(e) => settings_status_and_code(e),
            Error::Queue(e) => queue_status_and_code(e),
            Error::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_ERROR"),
            Error::Bulk(e) => bulk_status_and_code(e),
            Error::Other(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

fn settings_status_and_code(e: &fhirval_settings::SettingsError) -> (StatusCode, &'static str) {
    use fhirval_settings::SettingsError::*;
    match e {
        NotFound(_) | BackupNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        Validation(_) => (StatusCode::BAD_REQUEST, "INPUT_ERROR"),
        Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
        BackupCorrupt(_) => (StatusCode::CONFLICT, "BACKUP_TAMPERED"),
    }
}

fn queue_status_and_code(e: &fhirval_queue::QueueError) -> (StatusCode, &'static str) {
    use fhirval_queue::QueueError::*;
    match e {
        AtCapacity { .. } => (StatusCode::SERVICE_UNAVAILABLE, "QUEUE_FULL"),
        NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        AlreadyTerminal(_) => (StatusCode::CONFLICT, "ALREADY_TERMINAL"),
    }
}

fn bulk_status_and_code(e: &fhirval_orchestrator::BulkError) -> (StatusCode, &'static str) {
    use fhirval_orchestrator::BulkError::*;
    match e {
        AlreadyRunning => (StatusCode::CONFLICT, "BULK_ALREADY_RUNNING"),
        NotPaused => (StatusCode::CONFLICT, "BULK_NOT_PAUSED"),
        NotRunning => (StatusCode::CONFLICT, "BULK_NOT_RUNNING"),
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal error");
        }
        let body = Json(json!({
            "success": false,
            "message": self.to_string(),
            "error": code,
            "timestamp": Utc::now(),
        }));
        (status, body).into_response()
    }
}
