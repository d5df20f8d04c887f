use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::RiskLevel;
use super::medication::MedicationDetail;
use crate::config;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub conditions: Vec<String>,
    pub current_medications: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_alert: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    /// Populated on read; writes go through `Store::save_medications`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub medication_details: Vec<MedicationDetail>,
}

/// Input for patient creation and update; the id is assigned by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPatient {
    pub name: String,
    pub age: u32,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub current_medications: Vec<String>,
    #[serde(default)]
    pub doctor_id: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

pub fn default_language() -> String {
    config::DEFAULT_LANGUAGE.to_string()
}

impl Patient {
    pub fn from_new(id: String, new: NewPatient) -> Self {
        Self {
            id,
            name: new.name,
            age: new.age,
            conditions: new.conditions,
            current_medications: new.current_medications,
            risk_level: None,
            last_alert: None,
            doctor_id: new.doctor_id,
            language: new.language.unwrap_or_else(default_language),
            medication_details: Vec::new(),
        }
    }

    /// Language used for patient-facing text, falling back to the default.
    pub fn preferred_language(&self) -> &str {
        if self.language.trim().is_empty() {
            config::DEFAULT_LANGUAGE
        } else {
            &self.language
        }
    }
}
