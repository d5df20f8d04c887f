//! Patient endpoints: management, dose ingress and the voice assistant.

use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::endpoints::{default_language, read_audio};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::config::{DEFAULT_RECENT_DOSES, MAX_SKIPS_PER_REQUEST};
use crate::models::enums::DoseStatus;
use crate::models::{Alert, MedicationDetail, MedicationDose, MedicationHistory, NewPatient, Patient};
use crate::patients::{PatientUpdate, VoiceReply};
use crate::workflow::DoseOutcome;

// ═══════════════════════════════════════════════════════════
// Request types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    #[serde(flatten)]
    pub patient: NewPatient,
    #[serde(default)]
    pub medication_details: Vec<MedicationDetail>,
}

#[derive(Debug, Deserialize)]
pub struct RecordDoseRequest {
    pub patient_id: String,
    pub drug_name: String,
    pub status: DoseStatus,
    #[serde(default)]
    pub scheduled_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SkipDoseRequest {
    pub drug_name: String,
    pub skips: u32,
    #[serde(default)]
    pub patient_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecentDosesQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct VoiceQueryParams {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub patient_id: Option<String>,
}

// ═══════════════════════════════════════════════════════════
// Handlers
// ═══════════════════════════════════════════════════════════

/// `GET /api/patient`
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<Patient>>, ApiError> {
    let patients = ctx.blocking(|core| Ok(core.patients().list_patients()?)).await?;
    Ok(Json(patients))
}

/// `POST /api/patient`
pub async fn create(
    State(ctx): State<ApiContext>,
    Json(body): Json<CreatePatientRequest>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    if body.patient.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Patient name is required".into()));
    }
    let patient = ctx
        .blocking(move |core| {
            Ok(core
                .patients()
                .create_patient(body.patient, body.medication_details)?)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

/// `GET /api/patient/doctor/:doctor_id`
pub async fn by_doctor(
    State(ctx): State<ApiContext>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Vec<Patient>>, ApiError> {
    let patients = ctx
        .blocking(move |core| Ok(core.patients().patients_by_doctor(&doctor_id)?))
        .await?;
    Ok(Json(patients))
}

/// `GET /api/patient/:id`
pub async fn get(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<Patient>, ApiError> {
    let patient = ctx.blocking(move |core| Ok(core.patients().get_patient(&id)?)).await?;
    Ok(Json(patient))
}

/// `PUT /api/patient/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Json(body): Json<PatientUpdate>,
) -> Result<Json<Patient>, ApiError> {
    let patient = ctx
        .blocking(move |core| Ok(core.patients().update_patient(&id, body)?))
        .await?;
    Ok(Json(patient))
}

/// `POST /api/patient/record-dose`: persist one dose. A skipped dose
/// raises an alert and, when enabled, queues a proactive AI warning for
/// the patient. The warning runs detached and never affects the response.
pub async fn record_dose(
    State(ctx): State<ApiContext>,
    Json(body): Json<RecordDoseRequest>,
) -> Result<(StatusCode, Json<DoseOutcome>), ApiError> {
    let RecordDoseRequest {
        patient_id,
        drug_name,
        status,
        scheduled_time,
    } = body;

    let outcome = {
        let (patient_id, drug_name) = (patient_id.clone(), drug_name.clone());
        ctx.blocking(move |core| {
            Ok(core
                .workflow()
                .record_dose(&patient_id, &drug_name, status, scheduled_time)?)
        })
        .await?
    };

    if outcome.alert().is_some() && ctx.core.config.notify_patient_on_skip {
        notify_after_skip(Arc::clone(&ctx.core), patient_id, drug_name, scheduled_time);
    }

    Ok((StatusCode::CREATED, Json(outcome)))
}

fn notify_after_skip(
    core: Arc<crate::core_state::CoreState>,
    patient_id: String,
    drug_name: String,
    scheduled_time: Option<DateTime<Utc>>,
) {
    tokio::task::spawn_blocking(move || {
        if let Err(e) = core
            .notifications()
            .send_ai_warning(&patient_id, &drug_name, scheduled_time)
        {
            tracing::warn!(patient_id, error = %e, "Post-skip warning failed");
        }
    });
}

/// `POST /api/patient/skip-dose`: record a batch of skipped doses and
/// return the alert sized by the batch.
pub async fn skip_dose(
    State(ctx): State<ApiContext>,
    Json(body): Json<SkipDoseRequest>,
) -> Result<Json<Alert>, ApiError> {
    if body.skips == 0 {
        return Err(ApiError::BadRequest("skips must be at least 1".into()));
    }
    if body.skips > MAX_SKIPS_PER_REQUEST {
        return Err(ApiError::BadRequest(format!(
            "skips must be at most {MAX_SKIPS_PER_REQUEST}"
        )));
    }

    let alert = ctx
        .blocking(move |core| {
            let patient_id = match body.patient_id {
                Some(id) => id,
                None => core
                    .patients()
                    .first_patient_id()?
                    .ok_or_else(|| ApiError::BadRequest("No patient found".into()))?,
            };
            Ok(core
                .workflow()
                .record_skip_dose(&patient_id, &body.drug_name, body.skips)?)
        })
        .await?;
    Ok(Json(alert))
}

/// `GET /api/patient/:id/medication-history`
pub async fn medication_history(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<Vec<MedicationHistory>>, ApiError> {
    let history = ctx
        .blocking(move |core| Ok(core.patients().medication_history(&id)?))
        .await?;
    Ok(Json(history))
}

/// `GET /api/patient/:id/recent-doses?limit=`
pub async fn recent_doses(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Query(query): Query<RecentDosesQuery>,
) -> Result<Json<Vec<MedicationDose>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_DOSES);
    let doses = ctx
        .blocking(move |core| Ok(core.patients().recent_doses(&id, limit)?))
        .await?;
    Ok(Json(doses))
}

/// `POST /api/patient/voice-query`: multipart audio in, spoken reply out.
pub async fn voice_query(
    State(ctx): State<ApiContext>,
    Query(params): Query<VoiceQueryParams>,
    multipart: Multipart,
) -> Result<Json<VoiceReply>, ApiError> {
    let audio = read_audio(multipart, params.language).await?;

    let reply = ctx
        .blocking(move |core| {
            let patient_id = match params.patient_id {
                Some(id) => id,
                None => core
                    .patients()
                    .first_patient_id()?
                    .ok_or_else(|| ApiError::BadRequest("No patient found".into()))?,
            };
            Ok(core.patients().voice_query(&patient_id, audio)?)
        })
        .await?;
    Ok(Json(reply))
}
