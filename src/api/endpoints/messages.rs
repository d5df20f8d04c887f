//! Patient/doctor messaging.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::endpoints::{default_language, read_audio};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::{Conversation, Message, NewMessage};

#[derive(Debug, Deserialize)]
pub struct VoiceMessageParams {
    pub patient_id: String,
    pub doctor_id: String,
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub success: bool,
}

/// `POST /api/messages`
pub async fn send(
    State(ctx): State<ApiContext>,
    Json(body): Json<NewMessage>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    if body.message.trim().is_empty() && body.audio_url.is_none() {
        return Err(ApiError::BadRequest("Message text or audio is required".into()));
    }
    let message = ctx
        .blocking(move |core| Ok(core.conversations().send_message(body)?))
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// `GET /api/messages/conversation/:patient_id/:doctor_id`
pub async fn conversation(
    State(ctx): State<ApiContext>,
    Path((patient_id, doctor_id)): Path<(String, String)>,
) -> Result<Json<Conversation>, ApiError> {
    let conversation = ctx
        .blocking(move |core| {
            core.conversations()
                .get_conversation(&patient_id, &doctor_id)?
                .ok_or_else(|| {
                    ApiError::NotFound(format!(
                        "No conversation between {patient_id} and {doctor_id}"
                    ))
                })
        })
        .await?;
    Ok(Json(conversation))
}

/// `GET /api/messages/doctor/:doctor_id`
pub async fn for_doctor(
    State(ctx): State<ApiContext>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let conversations = ctx
        .blocking(move |core| Ok(core.conversations().conversations_for_doctor(&doctor_id)?))
        .await?;
    Ok(Json(conversations))
}

/// `GET /api/messages/patient/:patient_id`
pub async fn for_patient(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let conversations = ctx
        .blocking(move |core| Ok(core.conversations().conversations_for_patient(&patient_id)?))
        .await?;
    Ok(Json(conversations))
}

/// `POST /api/messages/voice?patient_id=&doctor_id=&language=`
pub async fn voice(
    State(ctx): State<ApiContext>,
    Query(params): Query<VoiceMessageParams>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let audio = read_audio(multipart, params.language).await?;
    let message = ctx
        .blocking(move |core| {
            Ok(core
                .conversations()
                .send_voice_message(&params.patient_id, &params.doctor_id, audio)?)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// `POST /api/messages/:message_id/read`
pub async fn mark_read(
    State(ctx): State<ApiContext>,
    Path(message_id): Path<String>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    ctx.blocking(move |core| Ok(core.conversations().mark_as_read(&message_id)?))
        .await?;
    Ok(Json(MarkReadResponse { success: true }))
}
