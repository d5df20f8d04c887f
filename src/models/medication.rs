use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{DoseStatus, MedicationFrequency, RiskLevel};

/// Prescribed medication for one patient. Replaced wholesale on update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationDetail {
    pub drug_name: String,
    pub dosage: String,
    pub frequency: MedicationFrequency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    pub risk_level: RiskLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Immutable dose event. `actual_time` is set only for taken doses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationDose {
    pub id: String,
    pub patient_id: String,
    pub drug_name: String,
    pub status: DoseStatus,
    pub scheduled_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-drug dose summary for one patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationHistory {
    pub patient_id: String,
    pub drug_name: String,
    pub doses: Vec<MedicationDose>,
    pub total_taken: u32,
    pub total_skipped: u32,
    pub adherence_rate: f64,
}

impl MedicationHistory {
    /// Build a summary from doses already ordered newest first.
    pub fn from_doses(patient_id: &str, drug_name: &str, doses: Vec<MedicationDose>) -> Self {
        let total_taken = doses.iter().filter(|d| d.status == DoseStatus::Taken).count() as u32;
        let total_skipped = doses.len() as u32 - total_taken;
        Self {
            patient_id: patient_id.to_string(),
            drug_name: drug_name.to_string(),
            doses,
            total_taken,
            total_skipped,
            adherence_rate: adherence_rate(total_taken, total_skipped),
        }
    }
}

/// Percentage of taken doses, rounded to two decimals; 0 with no doses.
pub fn adherence_rate(taken: u32, skipped: u32) -> f64 {
    let total = taken + skipped;
    if total == 0 {
        return 0.0;
    }
    let pct = f64::from(taken) / f64::from(total) * 100.0;
    (pct * 100.0).round() / 100.0
}
