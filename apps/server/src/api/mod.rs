//! The §6 HTTP API: routes, handlers, and the middleware stack.

pub mod handlers;
pub mod middleware;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

/// Builds the full application router: health check, the validation API
/// surface (§6), and the ambient middleware stack (request id, security
/// headers, compression, CORS, body-size limiting).
pub fn create_router(state: AppState) -> Router {
    let max_body_size = state.config.server.max_request_body_size;
    let cors_origins = state.config.server.cors_origins.clone();

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/validation", validation_routes())
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::security_headers_middleware))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(middleware::compression())
        .layer(middleware::cors(&cors_origins))
        .layer(middleware::trace())
        .layer(DefaultBodyLimit::max(max_body_size))
}

fn validation_routes() -> Router<AppState> {
    Router::new()
        .route("/validate", post(handlers::validation::validate))
        .route("/validate-batch", post(handlers::validation::validate_batch))
        .route("/validate-by-ids", post(handlers::validation::validate_by_ids))
        .route("/bulk/start", post(handlers::bulk::start))
        .route("/bulk/pause", post(handlers::bulk::pause))
        .route("/bulk/resume", post(handlers::bulk::resume))
        .route("/bulk/stop", post(handlers::bulk::stop))
        .route("/bulk/progress", get(handlers::bulk::progress))
        .route(
            "/settings",
            get(handlers::settings::get_active).put(handlers::settings::update_active),
        )
        .route("/settings/reset", post(handlers::settings::reset))
        .route("/settings/validate", post(handlers::settings::validate))
        .route("/settings/test", post(handlers::settings::test))
        .route("/settings/presets/apply", post(handlers::settings::apply_preset))
        .route("/settings/rollback", post(handlers::settings::rollback))
        .route("/settings/history", get(handlers::settings::history))
        .route("/settings/statistics", get(handlers::settings::statistics))
        .route("/settings/audit", get(handlers::settings::audit))
        .route(
            "/settings/backups",
            get(handlers::settings::list_backups).post(handlers::settings::create_backup),
        )
        .route("/settings/backups/cleanup", post(handlers::settings::cleanup_backups))
        .route(
            "/settings/backups/:id",
            delete(handlers::settings::delete_backup),
        )
        .route("/settings/backups/:id/verify", get(handlers::settings::verify_backup))
        .route("/settings/backups/:id/restore", post(handlers::settings::restore_backup))
        .route("/queue/enqueue", post(handlers::queue::enqueue))
        .route("/queue/stats", get(handlers::queue::stats))
        .route("/queue/items", get(handlers::queue::items))
        .route("/queue/processing", get(handlers::queue::processing))
        .route("/queue/cancel", post(handlers::queue::cancel))
        .route("/queue/cancel/:id", post(handlers::queue::cancel_by_path))
        .route("/queue/clear", post(handlers::queue::clear))
        .route("/queue/start", post(handlers::queue::start))
        .route("/queue/stop", post(handlers::queue::stop))
        .route("/dashboard", get(handlers::dashboard::snapshot))
        .route("/stream", get(handlers::stream::stream))
}

async fn health_check() -> &'static str {
    "ok"
}
