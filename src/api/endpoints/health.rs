use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// `GET /api/health`: liveness probe. Reports `shutting_down` once the
/// core has been closed.
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    let status = if ctx.core.is_shut_down() {
        "shutting_down"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status,
        version: crate::config::APP_VERSION,
    })
}
