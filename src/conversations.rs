//! Patient and doctor conversation threads.
//!
//! A conversation is never stored; it is rebuilt on every read from the
//! messages sharing one (patient_id, doctor_id) pair.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::ai_service::{AiClient, AiServiceError, AudioInput};
use crate::db::{DatabaseError, Store};
use crate::models::enums::SenderRole;
use crate::models::{Conversation, Message, NewMessage};

#[derive(Error, Debug)]
pub enum ConversationError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("AI service error: {0}")]
    Upstream(#[from] AiServiceError),
}

/// One conversation from the messages of a single pair, in any order.
/// `None` when there are no messages.
pub fn build_conversation(mut messages: Vec<Message>) -> Option<Conversation> {
    // Stable sort keeps insertion order for equal timestamps
    messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    let last = messages.last()?;

    Some(Conversation {
        patient_id: last.patient_id.clone(),
        doctor_id: last.doctor_id.clone(),
        last_message_time: last.timestamp,
        unread_count: messages.iter().filter(|m| !m.read).count(),
        messages,
    })
}

/// Split messages into one conversation per distinct (patient, doctor)
/// pair. Input is expected newest first; conversations come back most
/// recently active first.
pub fn group_conversations(messages: Vec<Message>) -> Vec<Conversation> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut groups: Vec<Vec<Message>> = Vec::new();

    // Walk oldest first so each group is already in insertion order
    for message in messages.into_iter().rev() {
        let key = (message.patient_id.clone(), message.doctor_id.clone());
        match index.get(&key) {
            Some(&slot) => groups[slot].push(message),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![message]);
            }
        }
    }

    let mut conversations: Vec<Conversation> =
        groups.into_iter().filter_map(build_conversation).collect();
    conversations.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
    conversations
}

// ═══════════════════════════════════════════════════════════
// ConversationService
// ═══════════════════════════════════════════════════════════

pub struct ConversationService {
    store: Arc<dyn Store>,
    ai: Arc<dyn AiClient>,
}

impl ConversationService {
    pub fn new(store: Arc<dyn Store>, ai: Arc<dyn AiClient>) -> Self {
        Self { store, ai }
    }

    /// Persist a new unread message. Both participants must exist.
    pub fn send_message(&self, new: NewMessage) -> Result<Message, ConversationError> {
        self.require_participants(&new.patient_id, &new.doctor_id)?;

        let message = Message {
            id: Uuid::new_v4().to_string(),
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            sender: new.sender,
            message: new.message,
            audio_url: new.audio_url,
            language: new.language,
            timestamp: Utc::now(),
            read: false,
        };
        self.store.save_message(&message)?;
        tracing::info!(
            message_id = %message.id,
            sender = %message.sender,
            "Message sent"
        );
        Ok(message)
    }

    /// Transcribe a patient's recording and store the text as their message.
    pub fn send_voice_message(
        &self,
        patient_id: &str,
        doctor_id: &str,
        audio: AudioInput,
    ) -> Result<Message, ConversationError> {
        self.require_participants(patient_id, doctor_id)?;
        let transcription = self.ai.transcribe_audio(&audio)?;

        self.send_message(NewMessage {
            patient_id: patient_id.to_string(),
            doctor_id: doctor_id.to_string(),
            sender: SenderRole::Patient,
            message: transcription.text,
            audio_url: None,
            language: Some(transcription.language),
        })
    }

    pub fn get_conversation(
        &self,
        patient_id: &str,
        doctor_id: &str,
    ) -> Result<Option<Conversation>, ConversationError> {
        Ok(self.store.get_conversation(patient_id, doctor_id)?)
    }

    pub fn conversations_for_doctor(
        &self,
        doctor_id: &str,
    ) -> Result<Vec<Conversation>, ConversationError> {
        Ok(self.store.get_conversations_by_doctor(doctor_id)?)
    }

    pub fn conversations_for_patient(
        &self,
        patient_id: &str,
    ) -> Result<Vec<Conversation>, ConversationError> {
        Ok(self.store.get_conversations_by_patient(patient_id)?)
    }

    pub fn mark_as_read(&self, message_id: &str) -> Result<(), ConversationError> {
        Ok(self.store.mark_message_as_read(message_id)?)
    }

    fn require_participants(&self, patient_id: &str, doctor_id: &str) -> Result<(), DatabaseError> {
        if self.store.get_patient(patient_id)?.is_none() {
            return Err(DatabaseError::not_found("patient", patient_id));
        }
        if self.store.get_doctor(doctor_id)?.is_none() {
            return Err(DatabaseError::not_found("doctor", doctor_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_service::MockAiClient;
    use crate::db::SqliteStore;
    use crate::models::enums::RiskLevel;
    use crate::models::{Doctor, NewPatient, Patient};
    use chrono::{DateTime, Duration};

    fn message(id: &str, patient_id: &str, at: DateTime<Utc>, read: bool) -> Message {
        Message {
            id: id.into(),
            patient_id: patient_id.into(),
            doctor_id: "doc".into(),
            sender: SenderRole::Patient,
            message: format!("message {id}"),
            audio_url: None,
            language: None,
            timestamp: at,
            read,
        }
    }

    #[test]
    fn conversation_counts_unread_and_orders_oldest_first() {
        let t1 = Utc::now();
        let t2 = t1 + Duration::seconds(1);
        let conversation = build_conversation(vec![
            message("m2", "p", t2, true),
            message("m1", "p", t1, false),
        ])
        .unwrap();

        assert_eq!(conversation.unread_count, 1);
        assert_eq!(conversation.last_message_time, t2);
        let ids: Vec<&str> = conversation.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m1", "m2"]);
    }

    #[test]
    fn empty_pair_has_no_conversation() {
        assert!(build_conversation(Vec::new()).is_none());
    }

    #[test]
    fn grouping_splits_by_pair_and_sorts_by_activity() {
        let t0 = Utc::now();
        // Newest first, as the store returns them
        let grouped = group_conversations(vec![
            message("b2", "pb", t0 + Duration::seconds(4), false),
            message("a2", "pa", t0 + Duration::seconds(3), true),
            message("b1", "pb", t0 + Duration::seconds(2), false),
            message("a1", "pa", t0 + Duration::seconds(1), false),
        ]);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].patient_id, "pb");
        assert_eq!(grouped[0].unread_count, 2);
        assert_eq!(grouped[1].messages[0].id, "a1");
        assert_eq!(grouped[1].messages[1].id, "a2");
        assert_eq!(grouped[1].unread_count, 1);
    }

    fn service(ai: MockAiClient) -> (ConversationService, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store
            .save_doctor(&Doctor {
                id: "doc".into(),
                name: "Dr. Anjali Mehta".into(),
                email: None,
                specialization: None,
                patient_ids: Vec::new(),
            })
            .unwrap();
        store
            .save_patient(&Patient::from_new(
                "p".into(),
                NewPatient {
                    name: "Suresh Patel".into(),
                    age: 71,
                    conditions: Vec::new(),
                    current_medications: Vec::new(),
                    doctor_id: Some("doc".into()),
                    language: None,
                },
            ))
            .unwrap();
        (ConversationService::new(store.clone(), Arc::new(ai)), store)
    }

    #[test]
    fn send_then_mark_read() {
        let (service, _store) = service(MockAiClient::new(RiskLevel::Low));
        let sent = service
            .send_message(NewMessage {
                patient_id: "p".into(),
                doctor_id: "doc".into(),
                sender: SenderRole::Doctor,
                message: "Take it after food".into(),
                audio_url: None,
                language: Some("en".into()),
            })
            .unwrap();
        assert!(!sent.read);

        service.mark_as_read(&sent.id).unwrap();
        let conversation = service.get_conversation("p", "doc").unwrap().unwrap();
        assert_eq!(conversation.unread_count, 0);
        assert_eq!(service.conversations_for_doctor("doc").unwrap().len(), 1);
    }

    #[test]
    fn unknown_participant_is_not_found() {
        let (service, _store) = service(MockAiClient::new(RiskLevel::Low));
        let err = service
            .send_message(NewMessage {
                patient_id: "ghost".into(),
                doctor_id: "doc".into(),
                sender: SenderRole::Patient,
                message: "hello".into(),
                audio_url: None,
                language: None,
            })
            .unwrap_err();
        assert!(matches!(err, ConversationError::Database(e) if e.is_not_found()));
    }

    #[test]
    fn voice_message_stores_transcript_as_patient_message() {
        let (service, _store) =
            service(MockAiClient::new(RiskLevel::Low).with_transcript("मुझे चक्कर आ रहा है"));
        let saved = service
            .send_voice_message(
                "p",
                "doc",
                AudioInput {
                    bytes: vec![0, 1, 2],
                    mime_type: "audio/webm".into(),
                    file_name: "voice.webm".into(),
                    language: "hi".into(),
                },
            )
            .unwrap();

        assert_eq!(saved.sender, SenderRole::Patient);
        assert_eq!(saved.message, "मुझे चक्कर आ रहा है");
        assert_eq!(saved.language.as_deref(), Some("hi"));
        assert_eq!(service.conversations_for_patient("p").unwrap().len(), 1);
    }
}
