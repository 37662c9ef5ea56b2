//! Dashboard aggregator read path (§4.13). Not itself named in §6's endpoint
//! list, but the component it fronts is — "selected" interfaces, not
//! exhaustive ones.

use axum::extract::State;
use axum::Json;
use fhirval_dashboard::DashboardSnapshot;

use crate::state::AppState;

/// `GET /api/validation/dashboard`.
pub async fn snapshot(State(state): State<AppState>) -> Json<DashboardSnapshot> {
    Json(state.dashboard.snapshot().await)
}
