//! Doctor dashboard endpoints.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::dashboard::{DoctorDashboard, PatientDetail};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondRequest {
    pub alert_id: String,
    pub response: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondResponse {
    pub success: bool,
    pub message: &'static str,
    pub alert_id: String,
    pub response: String,
}

/// `GET /api/doctor/dashboard/:doctor_id`
pub async fn dashboard(
    State(ctx): State<ApiContext>,
    Path(doctor_id): Path<String>,
) -> Result<Json<DoctorDashboard>, ApiError> {
    let dashboard = ctx
        .blocking(move |core| Ok(core.dashboard().doctor_dashboard(&doctor_id)?))
        .await?;
    Ok(Json(dashboard))
}

/// `GET /api/doctor/patient/:doctor_id/:patient_id`: 404 unless the
/// patient is assigned to this doctor.
pub async fn patient_detail(
    State(ctx): State<ApiContext>,
    Path((doctor_id, patient_id)): Path<(String, String)>,
) -> Result<Json<PatientDetail>, ApiError> {
    let detail = ctx
        .blocking(move |core| {
            core.dashboard()
                .patient_details(&doctor_id, &patient_id)?
                .ok_or_else(|| {
                    ApiError::NotFound(format!(
                        "Patient {patient_id} is not assigned to doctor {doctor_id}"
                    ))
                })
        })
        .await?;
    Ok(Json(detail))
}

/// `POST /api/doctor/respond`: records nothing yet, echoes the response.
pub async fn respond(Json(body): Json<RespondRequest>) -> Result<Json<RespondResponse>, ApiError> {
    if body.response.trim().is_empty() {
        return Err(ApiError::BadRequest("Response is required".into()));
    }
    tracing::info!(alert_id = %body.alert_id, "Doctor responded to alert");
    Ok(Json(RespondResponse {
        success: true,
        message: "Response recorded",
        alert_id: body.alert_id,
        response: body.response,
    }))
}
