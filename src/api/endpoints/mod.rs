pub mod alerts;
pub mod doctors;
pub mod health;
pub mod messages;
pub mod notifications;
pub mod patients;

use axum::extract::Multipart;

use crate::ai_service::AudioInput;
use crate::api::error::ApiError;

/// Pull the `audio` (or `file`) part out of a multipart upload.
pub(crate) async fn read_audio(mut multipart: Multipart, language: String) -> Result<AudioInput, ApiError> {
    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name() {
            Some("audio") | Some("file") => {
                let file_name = field.file_name().unwrap_or("audio.wav").to_string();
                let mime_type = field.content_type().unwrap_or("audio/wav").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read audio: {e}")))?;
                if bytes.is_empty() {
                    break;
                }
                return Ok(AudioInput {
                    bytes: bytes.to_vec(),
                    mime_type,
                    file_name,
                    language,
                });
            }
            _ => {}
        }
    }
    Err(ApiError::BadRequest("Audio file is required".into()))
}

fn default_language() -> String {
    crate::config::DEFAULT_LANGUAGE.to_string()
}
