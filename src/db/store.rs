//! Persistence gateway consumed by the workflow engine, stream managers
//! and aggregators.
//!
//! Methods are blocking; async callers go through `spawn_blocking`.

use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use super::repository as repo;
use super::DatabaseError;
use crate::conversations::{build_conversation, group_conversations};
use crate::models::*;

pub trait Store: Send + Sync {
    // ── Patients ────────────────────────────────────────────
    fn get_patient(&self, id: &str) -> Result<Option<Patient>, DatabaseError>;
    fn get_all_patients(&self) -> Result<Vec<Patient>, DatabaseError>;
    fn get_patients_by_doctor(&self, doctor_id: &str) -> Result<Vec<Patient>, DatabaseError>;
    /// Upsert; `medication_details` is not written here.
    fn save_patient(&self, patient: &Patient) -> Result<(), DatabaseError>;
    fn save_medications(
        &self,
        patient_id: &str,
        medications: &[MedicationDetail],
    ) -> Result<(), DatabaseError>;
    fn get_medications(&self, patient_id: &str) -> Result<Vec<MedicationDetail>, DatabaseError>;

    // ── Doctors ─────────────────────────────────────────────
    fn get_doctor(&self, id: &str) -> Result<Option<Doctor>, DatabaseError>;
    fn get_all_doctors(&self) -> Result<Vec<Doctor>, DatabaseError>;
    fn save_doctor(&self, doctor: &Doctor) -> Result<(), DatabaseError>;
    fn assign_patient_to_doctor(&self, patient_id: &str, doctor_id: &str)
        -> Result<(), DatabaseError>;

    // ── Doses ───────────────────────────────────────────────
    fn save_medication_dose(&self, dose: &MedicationDose) -> Result<(), DatabaseError>;
    fn get_medication_history(&self, patient_id: &str)
        -> Result<Vec<MedicationHistory>, DatabaseError>;
    fn get_recent_doses(&self, patient_id: &str, limit: usize)
        -> Result<Vec<MedicationDose>, DatabaseError>;

    // ── Alerts ──────────────────────────────────────────────
    fn save_alert(&self, alert: &Alert) -> Result<(), DatabaseError>;
    fn get_alert(&self, id: &str) -> Result<Option<Alert>, DatabaseError>;
    fn get_alerts_by_patient(&self, patient_id: &str) -> Result<Vec<Alert>, DatabaseError>;
    fn get_all_alerts(&self) -> Result<Vec<Alert>, DatabaseError>;
    fn update_alert(&self, id: &str, update: &AlertUpdate) -> Result<(), DatabaseError>;

    // ── Messages ────────────────────────────────────────────
    fn save_message(&self, message: &Message) -> Result<(), DatabaseError>;
    fn get_message(&self, id: &str) -> Result<Option<Message>, DatabaseError>;
    fn get_conversation(
        &self,
        patient_id: &str,
        doctor_id: &str,
    ) -> Result<Option<Conversation>, DatabaseError>;
    fn get_conversations_by_doctor(&self, doctor_id: &str)
        -> Result<Vec<Conversation>, DatabaseError>;
    fn get_conversations_by_patient(&self, patient_id: &str)
        -> Result<Vec<Conversation>, DatabaseError>;
    fn mark_message_as_read(&self, id: &str) -> Result<(), DatabaseError>;
}

/// SQLite-backed store. One connection, serialised behind a mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Fresh in-memory database with migrations applied.
    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::new(super::open_memory_database()?))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)
    }
}

impl Store for SqliteStore {
    fn get_patient(&self, id: &str) -> Result<Option<Patient>, DatabaseError> {
        repo::get_patient(&*self.conn()?, id)
    }

    fn get_all_patients(&self) -> Result<Vec<Patient>, DatabaseError> {
        repo::get_all_patients(&*self.conn()?)
    }

    fn get_patients_by_doctor(&self, doctor_id: &str) -> Result<Vec<Patient>, DatabaseError> {
        repo::get_patients_by_doctor(&*self.conn()?, doctor_id)
    }

    fn save_patient(&self, patient: &Patient) -> Result<(), DatabaseError> {
        repo::upsert_patient(&*self.conn()?, patient)
    }

    fn save_medications(
        &self,
        patient_id: &str,
        medications: &[MedicationDetail],
    ) -> Result<(), DatabaseError> {
        repo::replace_medications(&*self.conn()?, patient_id, medications)
    }

    fn get_medications(&self, patient_id: &str) -> Result<Vec<MedicationDetail>, DatabaseError> {
        repo::get_medications(&*self.conn()?, patient_id)
    }

    fn get_doctor(&self, id: &str) -> Result<Option<Doctor>, DatabaseError> {
        repo::get_doctor(&*self.conn()?, id)
    }

    fn get_all_doctors(&self) -> Result<Vec<Doctor>, DatabaseError> {
        repo::get_all_doctors(&*self.conn()?)
    }

    fn save_doctor(&self, doctor: &Doctor) -> Result<(), DatabaseError> {
        repo::insert_doctor(&*self.conn()?, doctor)
    }

    fn assign_patient_to_doctor(
        &self,
        patient_id: &str,
        doctor_id: &str,
    ) -> Result<(), DatabaseError> {
        repo::assign_patient_to_doctor(&*self.conn()?, patient_id, doctor_id)
    }

    fn save_medication_dose(&self, dose: &MedicationDose) -> Result<(), DatabaseError> {
        repo::insert_dose(&*self.conn()?, dose)
    }

    fn get_medication_history(
        &self,
        patient_id: &str,
    ) -> Result<Vec<MedicationHistory>, DatabaseError> {
        repo::get_medication_history(&*self.conn()?, patient_id)
    }

    fn get_recent_doses(
        &self,
        patient_id: &str,
        limit: usize,
    ) -> Result<Vec<MedicationDose>, DatabaseError> {
        repo::get_recent_doses(&*self.conn()?, patient_id, limit)
    }

    fn save_alert(&self, alert: &Alert) -> Result<(), DatabaseError> {
        repo::insert_alert(&*self.conn()?, alert)
    }

    fn get_alert(&self, id: &str) -> Result<Option<Alert>, DatabaseError> {
        repo::get_alert(&*self.conn()?, id)
    }

    fn get_alerts_by_patient(&self, patient_id: &str) -> Result<Vec<Alert>, DatabaseError> {
        repo::get_alerts_by_patient(&*self.conn()?, patient_id)
    }

    fn get_all_alerts(&self) -> Result<Vec<Alert>, DatabaseError> {
        repo::get_all_alerts(&*self.conn()?)
    }

    fn update_alert(&self, id: &str, update: &AlertUpdate) -> Result<(), DatabaseError> {
        repo::update_alert(&*self.conn()?, id, update)
    }

    fn save_message(&self, message: &Message) -> Result<(), DatabaseError> {
        repo::insert_message(&*self.conn()?, message)
    }

    fn get_message(&self, id: &str) -> Result<Option<Message>, DatabaseError> {
        repo::get_message(&*self.conn()?, id)
    }

    fn get_conversation(
        &self,
        patient_id: &str,
        doctor_id: &str,
    ) -> Result<Option<Conversation>, DatabaseError> {
        let messages = repo::get_messages_for_pair(&*self.conn()?, patient_id, doctor_id)?;
        Ok(build_conversation(messages))
    }

    fn get_conversations_by_doctor(
        &self,
        doctor_id: &str,
    ) -> Result<Vec<Conversation>, DatabaseError> {
        let messages = repo::get_messages_by_doctor(&*self.conn()?, doctor_id)?;
        Ok(group_conversations(messages))
    }

    fn get_conversations_by_patient(
        &self,
        patient_id: &str,
    ) -> Result<Vec<Conversation>, DatabaseError> {
        let messages = repo::get_messages_by_patient(&*self.conn()?, patient_id)?;
        Ok(group_conversations(messages))
    }

    fn mark_message_as_read(&self, id: &str) -> Result<(), DatabaseError> {
        repo::mark_message_read(&*self.conn()?, id)
    }
}
