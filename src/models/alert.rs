use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::RiskLevel;

/// Doctor-facing alert raised by a skipped dose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub drug_name: String,
    pub risk_level: RiskLevel,
    pub message: String,
    pub ai_explanation: String,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
}

/// Partial update applied by `Store::update_alert`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertUpdate {
    pub acknowledged: Option<bool>,
}

/// Payload of the alert-acknowledged event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertAcknowledgement {
    pub alert_id: String,
    pub acknowledged_at: DateTime<Utc>,
}
