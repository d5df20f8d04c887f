//! Client for the external AI service: skip-risk scoring, speech-to-text,
//! text-to-speech and translation.
//!
//! `AiClient` is the seam; `HttpAiClient` talks to the real service with a
//! blocking reqwest client (call it from `spawn_blocking`), `MockAiClient`
//! is the configurable test double.

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AppConfig;
use crate::models::enums::RiskLevel;

#[derive(Error, Debug)]
pub enum AiServiceError {
    #[error("Cannot connect to AI service at {0}")]
    Connection(String),

    #[error("AI service request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("AI service returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Failed to parse AI service response: {0}")]
    ResponseParsing(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

// ═══════════════════════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════════════════════

/// Body of `POST /analyze_skip`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipRiskRequest {
    pub drug_name: String,
    pub skips: u32,
    pub patient_age: u32,
    pub conditions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub message: String,
    pub ai_explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similar_drugs: Option<Vec<String>>,
}

/// Uploaded audio handed to the transcription endpoint.
#[derive(Debug, Clone)]
pub struct AudioInput {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    pub language: String,
}

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    language: &'a str,
}

#[derive(Deserialize)]
struct SynthesizeResponse {
    audio_url: String,
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
    source_language: &'a str,
    target_language: &'a str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    text: Option<String>,
    translated_text: Option<String>,
}

// ═══════════════════════════════════════════════════════════
// Client trait
// ═══════════════════════════════════════════════════════════

pub trait AiClient: Send + Sync {
    fn analyze_skip_risk(&self, request: &SkipRiskRequest) -> Result<RiskAssessment, AiServiceError>;

    fn transcribe_audio(&self, audio: &AudioInput) -> Result<Transcription, AiServiceError>;

    /// Returns a URL to the synthesized audio.
    fn synthesize_speech(&self, text: &str, language: &str) -> Result<String, AiServiceError>;

    /// Languages are full names ("Hindi"), or "auto" for the source.
    fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, AiServiceError>;
}

// ═══════════════════════════════════════════════════════════
// HTTP implementation
// ═══════════════════════════════════════════════════════════

pub struct HttpAiClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
    translate_timeout_secs: u64,
}

impl HttpAiClient {
    pub fn new(
        base_url: &str,
        timeout_secs: u64,
        translate_timeout_secs: u64,
    ) -> Result<Self, AiServiceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AiServiceError::Client(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
            translate_timeout_secs,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AiServiceError> {
        Self::new(
            &config.ai_service_url,
            config.ai_timeout_secs,
            config.translate_timeout_secs,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send(
        &self,
        request: reqwest::blocking::RequestBuilder,
        timeout_secs: u64,
    ) -> Result<reqwest::blocking::Response, AiServiceError> {
        let response = request.send().map_err(|e| {
            if e.is_connect() {
                AiServiceError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                AiServiceError::Timeout(timeout_secs)
            } else {
                AiServiceError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AiServiceError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    fn resolve_audio_url(&self, audio_url: &str) -> String {
        if audio_url.starts_with("http://") || audio_url.starts_with("https://") {
            audio_url.to_string()
        } else {
            self.url(audio_url)
        }
    }
}

impl AiClient for HttpAiClient {
    fn analyze_skip_risk(&self, request: &SkipRiskRequest) -> Result<RiskAssessment, AiServiceError> {
        let response = self.send(
            self.client.post(self.url("/analyze_skip")).json(request),
            self.timeout_secs,
        )?;
        response
            .json()
            .map_err(|e| AiServiceError::ResponseParsing(e.to_string()))
    }

    fn transcribe_audio(&self, audio: &AudioInput) -> Result<Transcription, AiServiceError> {
        let part = reqwest::blocking::multipart::Part::bytes(audio.bytes.clone())
            .file_name(audio.file_name.clone())
            .mime_str(&audio.mime_type)
            .map_err(|e| AiServiceError::Http(e.to_string()))?;
        let form = reqwest::blocking::multipart::Form::new()
            .part("file", part)
            .text("language", audio.language.clone());

        let response = self.send(
            self.client.post(self.url("/voice/transcribe")).multipart(form),
            self.timeout_secs,
        )?;
        response
            .json()
            .map_err(|e| AiServiceError::ResponseParsing(e.to_string()))
    }

    fn synthesize_speech(&self, text: &str, language: &str) -> Result<String, AiServiceError> {
        let response = self.send(
            self.client
                .post(self.url("/voice/synthesize"))
                .json(&SynthesizeRequest { text, language }),
            self.timeout_secs,
        )?;
        let parsed: SynthesizeResponse = response
            .json()
            .map_err(|e| AiServiceError::ResponseParsing(e.to_string()))?;
        Ok(self.resolve_audio_url(&parsed.audio_url))
    }

    fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, AiServiceError> {
        let response = self.send(
            self.client
                .post(self.url("/translate"))
                .timeout(Duration::from_secs(self.translate_timeout_secs))
                .json(&TranslateRequest {
                    text,
                    source_language,
                    target_language,
                }),
            self.translate_timeout_secs,
        )?;
        let parsed: TranslateResponse = response
            .json()
            .map_err(|e| AiServiceError::ResponseParsing(e.to_string()))?;
        parsed
            .text
            .or(parsed.translated_text)
            .ok_or_else(|| AiServiceError::ResponseParsing("translation missing text".into()))
    }
}

// ═══════════════════════════════════════════════════════════
// Mock client
// ═══════════════════════════════════════════════════════════

/// Mock AI client: fixed assessment, optional forced failures, and a record
/// of every skip-risk request. Translation tags text as `[Target] text`.
pub struct MockAiClient {
    assessment: RiskAssessment,
    fail_analysis: bool,
    fail_translation: bool,
    transcript: String,
    audio_url: String,
    analysis_requests: Mutex<Vec<SkipRiskRequest>>,
    translate_requests: Mutex<Vec<(String, String)>>,
}

impl MockAiClient {
    pub fn new(risk_level: RiskLevel) -> Self {
        Self {
            assessment: RiskAssessment {
                risk_level,
                message: format!("{} risk from skipping this medication", risk_level),
                ai_explanation: "Assessment from mock AI service".to_string(),
                similar_drugs: None,
            },
            fail_analysis: false,
            fail_translation: false,
            transcript: String::new(),
            audio_url: "http://localhost:8000/audio/mock.wav".to_string(),
            analysis_requests: Mutex::new(Vec::new()),
            translate_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_assessment(mut self, assessment: RiskAssessment) -> Self {
        self.assessment = assessment;
        self
    }

    pub fn failing_analysis(mut self) -> Self {
        self.fail_analysis = true;
        self
    }

    pub fn failing_translation(mut self) -> Self {
        self.fail_translation = true;
        self
    }

    pub fn with_transcript(mut self, transcript: &str) -> Self {
        self.transcript = transcript.to_string();
        self
    }

    /// Every skip-risk request received, in call order.
    pub fn analysis_requests(&self) -> Vec<SkipRiskRequest> {
        self.analysis_requests
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Every (text, target language) pair sent for translation.
    pub fn translate_requests(&self) -> Vec<(String, String)> {
        self.translate_requests
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn unavailable() -> AiServiceError {
        AiServiceError::Upstream {
            status: 503,
            body: "mock service unavailable".to_string(),
        }
    }
}

impl AiClient for MockAiClient {
    fn analyze_skip_risk(&self, request: &SkipRiskRequest) -> Result<RiskAssessment, AiServiceError> {
        if let Ok(mut calls) = self.analysis_requests.lock() {
            calls.push(request.clone());
        }
        if self.fail_analysis {
            return Err(Self::unavailable());
        }
        Ok(self.assessment.clone())
    }

    fn transcribe_audio(&self, audio: &AudioInput) -> Result<Transcription, AiServiceError> {
        Ok(Transcription {
            text: self.transcript.clone(),
            language: audio.language.clone(),
        })
    }

    fn synthesize_speech(&self, _text: &str, _language: &str) -> Result<String, AiServiceError> {
        Ok(self.audio_url.clone())
    }

    fn translate(
        &self,
        text: &str,
        _source_language: &str,
        target_language: &str,
    ) -> Result<String, AiServiceError> {
        if let Ok(mut calls) = self.translate_requests.lock() {
            calls.push((text.to_string(), target_language.to_string()));
        }
        if self.fail_translation {
            return Err(Self::unavailable());
        }
        Ok(format!("[{target_language}] {text}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SkipRiskRequest {
        SkipRiskRequest {
            drug_name: "Furosemide".into(),
            skips: 2,
            patient_age: 63,
            conditions: vec!["Heart Failure".into()],
        }
    }

    #[test]
    fn mock_returns_configured_assessment_and_records_calls() {
        let client = MockAiClient::new(RiskLevel::High);
        let assessment = client.analyze_skip_risk(&request()).unwrap();
        assert_eq!(assessment.risk_level, RiskLevel::High);
        assert_eq!(client.analysis_requests(), vec![request()]);
    }

    #[test]
    fn mock_failure_is_upstream_error() {
        let client = MockAiClient::new(RiskLevel::Low).failing_analysis();
        let err = client.analyze_skip_risk(&request()).unwrap_err();
        assert!(matches!(err, AiServiceError::Upstream { status: 503, .. }));
        // Failed calls are still recorded
        assert_eq!(client.analysis_requests().len(), 1);
    }

    #[test]
    fn mock_translation_tags_target() {
        let client = MockAiClient::new(RiskLevel::Low);
        assert_eq!(client.translate("Take it", "auto", "Hindi").unwrap(), "[Hindi] Take it");
        assert!(MockAiClient::new(RiskLevel::Low)
            .failing_translation()
            .translate("x", "auto", "Tamil")
            .is_err());
    }

    #[test]
    fn http_client_trims_trailing_slash() {
        let client = HttpAiClient::new("http://localhost:8000/", 60, 15).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("/translate"), "http://localhost:8000/translate");
    }

    #[test]
    fn http_client_from_config_uses_timeouts() {
        let config = AppConfig::default();
        let client = HttpAiClient::from_config(&config).unwrap();
        assert_eq!(client.timeout_secs, 60);
        assert_eq!(client.translate_timeout_secs, 15);
    }

    #[test]
    fn relative_audio_urls_get_base_prefix() {
        let client = HttpAiClient::new("http://ai:8000", 60, 15).unwrap();
        assert_eq!(
            client.resolve_audio_url("/audio/out.wav"),
            "http://ai:8000/audio/out.wav"
        );
        assert_eq!(
            client.resolve_audio_url("https://cdn/x.wav"),
            "https://cdn/x.wav"
        );
    }

    #[test]
    fn assessment_parses_service_json() {
        let json = r#"{"risk_level":"High","message":"m","ai_explanation":"e","similar_drugs":["Torsemide"]}"#;
        let parsed: RiskAssessment = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.risk_level, RiskLevel::High);
        assert_eq!(parsed.similar_drugs.unwrap(), vec!["Torsemide"]);
    }

    #[test]
    fn unreachable_service_maps_to_connection_error() {
        // Port 9 (discard) is closed on test hosts; connection is refused
        let client = HttpAiClient::new("http://127.0.0.1:9", 2, 2).unwrap();
        let err = client.analyze_skip_risk(&request()).unwrap_err();
        assert!(matches!(
            err,
            AiServiceError::Connection(_) | AiServiceError::Timeout(_) | AiServiceError::Http(_)
        ));
    }
}
