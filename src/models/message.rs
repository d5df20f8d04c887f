use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::SenderRole;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub sender: SenderRole,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

/// Outgoing message before an id and timestamp are assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub patient_id: String,
    pub doctor_id: String,
    pub sender: SenderRole,
    pub message: String,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// Derived view over every message of one (patient, doctor) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub patient_id: String,
    pub doctor_id: String,
    pub messages: Vec<Message>,
    pub last_message_time: DateTime<Utc>,
    pub unread_count: usize,
}
