//! Doctor-facing alert endpoints and the live alert stream.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures_util::Stream;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::sse::json_event_stream;
use crate::api::types::ApiContext;
use crate::models::Alert;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeRequest {
    pub alert_id: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// `GET /api/alerts`: every stored alert, newest first.
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<Alert>>, ApiError> {
    let alerts = ctx.blocking(|core| Ok(core.alerts().all_alerts()?)).await?;
    Ok(Json(alerts))
}

/// `GET /api/alerts/patient/:patient_id`
pub async fn by_patient(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
) -> Result<Json<Vec<Alert>>, ApiError> {
    let alerts = ctx
        .blocking(move |core| Ok(core.alerts().alerts_for_patient(&patient_id)?))
        .await?;
    Ok(Json(alerts))
}

/// `GET /api/alerts/stream`: SSE feed of alerts created after connect.
pub async fn stream(
    State(ctx): State<ApiContext>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let alerts = ctx.core.alerts().alert_stream()?;
    tracing::debug!(consumers = ctx.core.alerts().consumer_count(), "Alert stream opened");
    Ok(json_event_stream(alerts))
}

/// `POST /api/alerts/acknowledge`
pub async fn acknowledge(
    State(ctx): State<ApiContext>,
    Json(body): Json<AcknowledgeRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    ctx.blocking(move |core| Ok(core.alerts().acknowledge_alert(&body.alert_id)?))
        .await?;
    Ok(Json(SuccessResponse { success: true }))
}
