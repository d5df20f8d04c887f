//! Patient management and the voice query assistant.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::ai_service::{AiClient, AiServiceError, AudioInput};
use crate::db::{DatabaseError, Store};
use crate::models::{MedicationDetail, MedicationDose, MedicationHistory, NewPatient, Patient};

#[derive(Error, Debug)]
pub enum PatientError {
    #[error("Patient not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("AI service error: {0}")]
    Upstream(#[from] AiServiceError),
}

/// Partial update. Risk tier and last alert are owned by the skip workflow
/// and cannot be set here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub conditions: Option<Vec<String>>,
    #[serde(default)]
    pub current_medications: Option<Vec<String>>,
    #[serde(default)]
    pub doctor_id: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    /// Replaces the whole medication list when present.
    #[serde(default)]
    pub medication_details: Option<Vec<MedicationDetail>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceReply {
    pub text: String,
    pub audio_url: String,
}

const REPLY_MISSED: &str = "आपने अपनी दवा छोड़ दी है। कृपया अपने डॉक्टर से संपर्क करें।";
const REPLY_SIDE_EFFECTS: &str = "कृपया अपने डॉक्टर से दवा के दुष्प्रभावों के बारे में पूछें।";
const REPLY_GENERIC: &str = "मैं आपकी मदद करने के लिए यहाँ हूँ। कृपया अपने डॉक्टर से परामर्श करें।";

/// Canned reply chosen by keywords in the transcribed query.
pub fn voice_reply(query: &str) -> &'static str {
    let query = query.to_lowercase();
    if ["miss", "skip", "forgot"].iter().any(|k| query.contains(k)) {
        REPLY_MISSED
    } else if query.contains("side effect") || query.contains("नुकसान") {
        REPLY_SIDE_EFFECTS
    } else {
        REPLY_GENERIC
    }
}

pub struct PatientService {
    store: Arc<dyn Store>,
    ai: Arc<dyn AiClient>,
}

impl PatientService {
    pub fn new(store: Arc<dyn Store>, ai: Arc<dyn AiClient>) -> Self {
        Self { store, ai }
    }

    pub fn list_patients(&self) -> Result<Vec<Patient>, PatientError> {
        Ok(self.store.get_all_patients()?)
    }

    pub fn patients_by_doctor(&self, doctor_id: &str) -> Result<Vec<Patient>, PatientError> {
        Ok(self.store.get_patients_by_doctor(doctor_id)?)
    }

    pub fn get_patient(&self, id: &str) -> Result<Patient, PatientError> {
        self.store
            .get_patient(id)?
            .ok_or_else(|| PatientError::NotFound(id.to_string()))
    }

    /// Oldest stored patient, used when ingress omits a patient id.
    pub fn first_patient_id(&self) -> Result<Option<String>, PatientError> {
        Ok(self.store.get_all_patients()?.into_iter().next().map(|p| p.id))
    }

    pub fn create_patient(
        &self,
        new: NewPatient,
        medication_details: Vec<MedicationDetail>,
    ) -> Result<Patient, PatientError> {
        if let Some(doctor_id) = new.doctor_id.as_deref() {
            self.require_doctor(doctor_id)?;
        }

        let patient = Patient::from_new(Uuid::new_v4().to_string(), new);
        self.store.save_patient(&patient)?;
        if !medication_details.is_empty() {
            self.store.save_medications(&patient.id, &medication_details)?;
        }
        if let Some(doctor_id) = patient.doctor_id.as_deref() {
            self.store.assign_patient_to_doctor(&patient.id, doctor_id)?;
        }

        tracing::info!(patient_id = %patient.id, "Patient created");
        self.get_patient(&patient.id)
    }

    pub fn update_patient(&self, id: &str, update: PatientUpdate) -> Result<Patient, PatientError> {
        let mut patient = self.get_patient(id)?;
        if let Some(doctor_id) = update.doctor_id.as_deref() {
            self.require_doctor(doctor_id)?;
        }

        if let Some(name) = update.name {
            patient.name = name;
        }
        if let Some(age) = update.age {
            patient.age = age;
        }
        if let Some(conditions) = update.conditions {
            patient.conditions = conditions;
        }
        if let Some(medications) = update.current_medications {
            patient.current_medications = medications;
        }
        if let Some(language) = update.language {
            patient.language = language;
        }
        if update.doctor_id.is_some() {
            patient.doctor_id = update.doctor_id;
        }

        self.store.save_patient(&patient)?;
        if let Some(details) = update.medication_details {
            self.store.save_medications(id, &details)?;
        }
        tracing::info!(patient_id = id, "Patient updated");
        self.get_patient(id)
    }

    pub fn medication_history(&self, id: &str) -> Result<Vec<MedicationHistory>, PatientError> {
        Ok(self.store.get_medication_history(id)?)
    }

    pub fn recent_doses(&self, id: &str, limit: usize) -> Result<Vec<MedicationDose>, PatientError> {
        Ok(self.store.get_recent_doses(id, limit)?)
    }

    /// Transcribe the question, pick a canned reply and synthesize it.
    pub fn voice_query(&self, patient_id: &str, audio: AudioInput) -> Result<VoiceReply, PatientError> {
        self.get_patient(patient_id)?;
        let language = audio.language.clone();

        let transcription = self.ai.transcribe_audio(&audio)?;
        let text = voice_reply(&transcription.text);
        let audio_url = self.ai.synthesize_speech(text, &language)?;

        tracing::debug!(patient_id, "Voice query answered");
        Ok(VoiceReply {
            text: text.to_string(),
            audio_url,
        })
    }

    fn require_doctor(&self, doctor_id: &str) -> Result<(), PatientError> {
        match self.store.get_doctor(doctor_id)? {
            Some(_) => Ok(()),
            None => Err(DatabaseError::not_found("doctor", doctor_id).into()),
        }
    }
}
