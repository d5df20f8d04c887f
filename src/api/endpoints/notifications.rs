//! Patient notification producers and the per-patient stream.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use axum::Json;
use chrono::{DateTime, Utc};
use futures_util::Stream;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::sse::json_event_stream;
use crate::api::types::ApiContext;
use crate::models::PatientNotification;

#[derive(Debug, Deserialize)]
pub struct DrugNotificationRequest {
    pub drug_name: String,
    #[serde(default)]
    pub scheduled_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct DoctorInstructionRequest {
    pub message: String,
    #[serde(default)]
    pub language: Option<String>,
}

/// `GET /api/patient-notifications/stream/:patient_id`
///
/// Notifications published before the first consumer attaches are not
/// replayed.
pub async fn stream(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let notifications = ctx.core.patient_streams().notification_stream(&patient_id)?;
    tracing::debug!(patient_id, "Patient stream opened");
    Ok(json_event_stream(notifications))
}

/// `POST /api/patient-notifications/reminder/:patient_id`
pub async fn reminder(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
    Json(body): Json<DrugNotificationRequest>,
) -> Result<Json<PatientNotification>, ApiError> {
    let notification = ctx
        .blocking(move |core| {
            Ok(core.notifications().send_medication_reminder(
                &patient_id,
                &body.drug_name,
                body.scheduled_time,
            )?)
        })
        .await?;
    Ok(Json(notification))
}

/// `POST /api/patient-notifications/warning/:patient_id`
pub async fn warning(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
    Json(body): Json<DrugNotificationRequest>,
) -> Result<Json<PatientNotification>, ApiError> {
    let notification = ctx
        .blocking(move |core| {
            Ok(core
                .notifications()
                .send_ai_warning(&patient_id, &body.drug_name, body.scheduled_time)?)
        })
        .await?;
    Ok(Json(notification))
}

/// `POST /api/patient-notifications/doctor-instruction/:patient_id`
pub async fn doctor_instruction(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
    Json(body): Json<DoctorInstructionRequest>,
) -> Result<Json<PatientNotification>, ApiError> {
    if body.message.trim().is_empty() {
        return Err(ApiError::BadRequest("Message is required".into()));
    }
    let notification = ctx
        .blocking(move |core| {
            Ok(core.notifications().send_doctor_instruction(
                &patient_id,
                &body.message,
                body.language.as_deref(),
            )?)
        })
        .await?;
    Ok(Json(notification))
}
