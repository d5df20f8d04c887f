use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{NotificationType, RiskLevel};

/// Ephemeral patient-facing notification. Only ever a stream payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientNotification {
    pub id: String,
    pub patient_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drug_name: Option<String>,
    /// Already in the patient's language.
    pub text: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_message: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
}

impl PatientNotification {
    pub fn new(patient_id: &str, kind: NotificationType, text: String, language: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id: patient_id.to_string(),
            kind,
            drug_name: None,
            text,
            language: language.to_string(),
            risk_level: None,
            scheduled_time: None,
            doctor_message: None,
            timestamp: Utc::now(),
            acknowledged: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_kind_as_type_field() {
        let n = PatientNotification::new("p1", NotificationType::MedicationReminder, "hi".into(), "en");
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "medication_reminder");
        assert_eq!(json["acknowledged"], false);
        assert!(json.get("risk_level").is_none());
    }
}
