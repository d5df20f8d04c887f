//! Patient-facing notification producers.
//!
//! Every producer builds a `PatientNotification`, publishes it on
//! `patient.notification` and returns it. AI and translation failures
//! degrade to canned or untranslated text; only a missing patient fails.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::ai_service::{AiClient, SkipRiskRequest};
use crate::config;
use crate::db::{DatabaseError, Store};
use crate::events::{EventBus, PatientNotified};
use crate::models::enums::{NotificationType, RiskLevel};
use crate::models::{Patient, PatientNotification};

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Patient not found: {0}")]
    PatientNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

const REMINDER_TEMPLATES: &[(&str, &str)] = &[
    (
        "en",
        "Please take your {drug} medication now. It's time for your scheduled dose.",
    ),
    (
        "hi",
        "कृपया अभी अपनी {drug} दवा लें। यह आपकी निर्धारित खुराक का समय है।",
    ),
    (
        "ta",
        "தயவுசெய்து இப்போது உங்கள் {drug} மருந்தை எடுத்துக் கொள்ளுங்கள். இது உங்கள் திட்டமிடப்பட்ட மருந்தின் நேரம்.",
    ),
    (
        "te",
        "దయచేసి ఇప్పుడు మీ {drug} మందును తీసుకోండి. ఇది మీ షెడ్యూల్ చేసిన మోతాదు సమయం.",
    ),
];

/// Reminder text in `language`, or in the fallback template language.
pub fn reminder_text(language: &str, drug_name: &str) -> String {
    let template = REMINDER_TEMPLATES
        .iter()
        .find(|(code, _)| *code == language)
        .or_else(|| {
            REMINDER_TEMPLATES
                .iter()
                .find(|(code, _)| *code == config::FALLBACK_TEMPLATE_LANGUAGE)
        })
        .map_or("", |(_, text)| *text);
    template.replace("{drug}", drug_name)
}

/// Warning used when the AI service cannot assess a skip.
pub fn fallback_warning(drug_name: &str) -> String {
    format!(
        "Skipping {drug_name} may cause health complications. Please take your medication as prescribed."
    )
}

/// Full language name expected by the translation service.
pub fn language_name(code: &str) -> &'static str {
    match code {
        "hi" => "Hindi",
        "ta" => "Tamil",
        "te" => "Telugu",
        "kn" => "Kannada",
        "ml" => "Malayalam",
        "mr" => "Marathi",
        "gu" => "Gujarati",
        "bn" => "Bengali",
        "pa" => "Punjabi",
        _ => "English",
    }
}

pub struct NotificationService {
    store: Arc<dyn Store>,
    ai: Arc<dyn AiClient>,
    bus: EventBus,
}

impl NotificationService {
    pub fn new(store: Arc<dyn Store>, ai: Arc<dyn AiClient>, bus: EventBus) -> Self {
        Self { store, ai, bus }
    }

    /// Templated reminder in the patient's language. No translation call.
    pub fn send_medication_reminder(
        &self,
        patient_id: &str,
        drug_name: &str,
        scheduled_time: Option<DateTime<Utc>>,
    ) -> Result<PatientNotification, NotificationError> {
        let patient = self.require_patient(patient_id)?;
        let language = patient.preferred_language();

        let mut notification = PatientNotification::new(
            patient_id,
            NotificationType::MedicationReminder,
            reminder_text(language, drug_name),
            language,
        );
        notification.drug_name = Some(drug_name.to_string());
        notification.scheduled_time = scheduled_time;
        Ok(self.publish(notification))
    }

    /// Fresh AI assessment of skipping one dose, translated for the patient.
    /// Falls back to the stored medication tier and a canned message.
    pub fn send_ai_warning(
        &self,
        patient_id: &str,
        drug_name: &str,
        scheduled_time: Option<DateTime<Utc>>,
    ) -> Result<PatientNotification, NotificationError> {
        let patient = self.require_patient(patient_id)?;
        let stored_risk = stored_risk(&patient, drug_name);

        let request = SkipRiskRequest {
            drug_name: drug_name.to_string(),
            skips: 1,
            patient_age: patient.age,
            conditions: patient.conditions.clone(),
        };
        let (risk_level, message) = match self.ai.analyze_skip_risk(&request) {
            Ok(assessment) => (assessment.risk_level, assessment.message),
            Err(e) => {
                tracing::warn!(patient_id, error = %e, "AI warning assessment failed, using fallback");
                (stored_risk, fallback_warning(drug_name))
            }
        };

        let language = patient.preferred_language();
        let mut notification = PatientNotification::new(
            patient_id,
            NotificationType::AiWarning,
            self.translate_for(&message, language),
            language,
        );
        notification.drug_name = Some(drug_name.to_string());
        notification.risk_level = Some(risk_level);
        notification.scheduled_time = scheduled_time;
        Ok(self.publish(notification))
    }

    /// Doctor's message translated to `language`, else the patient's
    /// preference. The original text is kept in `doctor_message`.
    pub fn send_doctor_instruction(
        &self,
        patient_id: &str,
        message: &str,
        language: Option<&str>,
    ) -> Result<PatientNotification, NotificationError> {
        let patient = self.require_patient(patient_id)?;
        let language = language
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .unwrap_or_else(|| patient.preferred_language());

        let mut notification = PatientNotification::new(
            patient_id,
            NotificationType::DoctorInstruction,
            self.translate_for(message, language),
            language,
        );
        notification.doctor_message = Some(message.to_string());
        Ok(self.publish(notification))
    }

    /// Best-effort translation; any failure keeps the source text.
    fn translate_for(&self, text: &str, language: &str) -> String {
        if language == "en" {
            return text.to_string();
        }
        match self.ai.translate(text, "auto", language_name(language)) {
            Ok(translated) if !translated.trim().is_empty() && translated != text => translated,
            Ok(_) => text.to_string(),
            Err(e) => {
                tracing::warn!(language, error = %e, "Translation failed, sending original text");
                text.to_string()
            }
        }
    }

    fn publish(&self, notification: PatientNotification) -> PatientNotification {
        let delivered = self.bus.publish::<PatientNotified>(notification.clone());
        tracing::info!(
            patient_id = %notification.patient_id,
            kind = %notification.kind,
            delivered,
            "Patient notification sent"
        );
        notification
    }

    fn require_patient(&self, patient_id: &str) -> Result<Patient, NotificationError> {
        self.store
            .get_patient(patient_id)?
            .ok_or_else(|| NotificationError::PatientNotFound(patient_id.to_string()))
    }
}

fn stored_risk(patient: &Patient, drug_name: &str) -> RiskLevel {
    patient
        .medication_details
        .iter()
        .find(|m| m.drug_name == drug_name)
        .map_or(RiskLevel::Medium, |m| m.risk_level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_service::MockAiClient;
    use crate::db::SqliteStore;
    use crate::models::enums::MedicationFrequency;
    use crate::models::{MedicationDetail, NewPatient};

    struct Fixture {
        service: NotificationService,
        ai: Arc<MockAiClient>,
        bus: EventBus,
    }

    fn fixture(ai: MockAiClient, language: &str) -> Fixture {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store
            .save_patient(&Patient::from_new(
                "p1".into(),
                NewPatient {
                    name: "Suresh Patel".into(),
                    age: 71,
                    conditions: vec!["Atrial Fibrillation".into()],
                    current_medications: vec!["Warfarin".into()],
                    doctor_id: None,
                    language: Some(language.into()),
                },
            ))
            .unwrap();
        store
            .save_medications(
                "p1",
                &[MedicationDetail {
                    drug_name: "Warfarin".into(),
                    dosage: "5mg".into(),
                    frequency: MedicationFrequency::OnceDaily,
                    timing: Some("evening".into()),
                    purpose: None,
                    risk_level: RiskLevel::High,
                    instructions: None,
                }],
            )
            .unwrap();
        let ai = Arc::new(ai);
        let bus = EventBus::init(8);
        Fixture {
            service: NotificationService::new(store, ai.clone(), bus.clone()),
            ai,
            bus,
        }
    }

    #[test]
    fn reminder_uses_language_template_with_fallback() {
        assert_eq!(
            reminder_text("en", "Metformin"),
            "Please take your Metformin medication now. It's time for your scheduled dose."
        );
        assert!(reminder_text("hi", "Metformin").starts_with("कृपया अभी अपनी Metformin"));
        assert_eq!(reminder_text("kn", "Metformin"), reminder_text("en", "Metformin"));
    }

    #[test]
    fn language_names_default_to_english() {
        assert_eq!(language_name("ta"), "Tamil");
        assert_eq!(language_name("pa"), "Punjabi");
        assert_eq!(language_name("fr"), "English");
    }

    #[test]
    fn reminder_is_published_and_returned_without_translation() {
        let f = fixture(MockAiClient::new(RiskLevel::Low), "te");
        let mut sub = f.bus.subscribe::<PatientNotified>().unwrap();

        let sent = f
            .service
            .send_medication_reminder("p1", "Warfarin", None)
            .unwrap();

        assert_eq!(sent.kind, NotificationType::MedicationReminder);
        assert_eq!(sent.language, "te");
        assert!(sent.text.contains("Warfarin"));
        assert!(f.ai.translate_requests().is_empty());
        assert_eq!(sub.try_recv().unwrap().id, sent.id);
    }

    #[test]
    fn ai_warning_uses_fresh_assessment_and_translates() {
        let f = fixture(MockAiClient::new(RiskLevel::Low), "hi");
        let sent = f.service.send_ai_warning("p1", "Warfarin", None).unwrap();

        assert_eq!(sent.risk_level, Some(RiskLevel::Low));
        assert!(sent.text.starts_with("[Hindi] "));
        assert_eq!(f.ai.analysis_requests()[0].skips, 1);
    }

    #[test]
    fn ai_warning_falls_back_to_stored_risk() {
        let f = fixture(MockAiClient::new(RiskLevel::Low).failing_analysis(), "en");
        let mut sub = f.bus.subscribe::<PatientNotified>().unwrap();

        let listed = f.service.send_ai_warning("p1", "Warfarin", None).unwrap();
        assert_eq!(listed.risk_level, Some(RiskLevel::High));
        assert_eq!(listed.text, fallback_warning("Warfarin"));

        // Drug names match exactly, so a different case is unlisted
        let other_case = f.service.send_ai_warning("p1", "warfarin", None).unwrap();
        assert_eq!(other_case.risk_level, Some(RiskLevel::Medium));

        let unlisted = f.service.send_ai_warning("p1", "Digoxin", None).unwrap();
        assert_eq!(unlisted.risk_level, Some(RiskLevel::Medium));
        assert!(unlisted.text.starts_with("Skipping Digoxin may cause"));

        assert!(sub.try_recv().is_some());
        assert!(sub.try_recv().is_some());
        assert!(sub.try_recv().is_some());
    }

    #[test]
    fn doctor_instruction_keeps_original_and_respects_language() {
        let f = fixture(MockAiClient::new(RiskLevel::Low), "hi");

        let default_lang = f
            .service
            .send_doctor_instruction("p1", "Reduce salt intake", None)
            .unwrap();
        assert_eq!(default_lang.language, "hi");
        assert_eq!(default_lang.text, "[Hindi] Reduce salt intake");
        assert_eq!(default_lang.doctor_message.as_deref(), Some("Reduce salt intake"));

        let explicit = f
            .service
            .send_doctor_instruction("p1", "Reduce salt intake", Some("ta"))
            .unwrap();
        assert_eq!(explicit.language, "ta");
        assert_eq!(explicit.text, "[Tamil] Reduce salt intake");
    }

    #[test]
    fn translation_failure_sends_original_text() {
        let f = fixture(MockAiClient::new(RiskLevel::Low).failing_translation(), "hi");
        let sent = f
            .service
            .send_doctor_instruction("p1", "Walk for 20 minutes", None)
            .unwrap();
        assert_eq!(sent.text, "Walk for 20 minutes");
    }

    #[test]
    fn unknown_patient_fails() {
        let f = fixture(MockAiClient::new(RiskLevel::Low), "hi");
        let err = f
            .service
            .send_medication_reminder("ghost", "Warfarin", None)
            .unwrap_err();
        assert!(matches!(err, NotificationError::PatientNotFound(_)));
    }
}
