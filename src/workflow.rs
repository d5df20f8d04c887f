//! Dose recording and the skip-alert pipeline.
//!
//! A skipped dose runs, in strict order: risk analysis, patient risk
//! update, alert persistence, `alert.created` publication. A failed
//! analysis aborts the pipeline after the dose row is written, leaving no
//! alert and no risk change.
//!
//! Calls are blocking (store and AI client); async callers use
//! `spawn_blocking`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::ai_service::{AiClient, AiServiceError, SkipRiskRequest};
use crate::config::SkipBatchPolicy;
use crate::db::{DatabaseError, Store};
use crate::events::{AlertCreated, EventBus};
use crate::models::enums::DoseStatus;
use crate::models::{Alert, MedicationDose, Patient};

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Patient not found: {0}")]
    PatientNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Risk analysis failed: {0}")]
    Upstream(#[from] AiServiceError),
}

/// Result of `record_dose`: the dose itself when taken, the raised alert
/// when skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "record", rename_all = "snake_case")]
pub enum DoseOutcome {
    DoseRecorded(MedicationDose),
    SkipAlertRaised(Alert),
}

impl DoseOutcome {
    pub fn alert(&self) -> Option<&Alert> {
        match self {
            Self::SkipAlertRaised(alert) => Some(alert),
            Self::DoseRecorded(_) => None,
        }
    }
}

pub struct DoseWorkflow {
    store: Arc<dyn Store>,
    ai: Arc<dyn AiClient>,
    bus: EventBus,
    skip_batch_policy: SkipBatchPolicy,
}

impl DoseWorkflow {
    pub fn new(
        store: Arc<dyn Store>,
        ai: Arc<dyn AiClient>,
        bus: EventBus,
        skip_batch_policy: SkipBatchPolicy,
    ) -> Self {
        Self {
            store,
            ai,
            bus,
            skip_batch_policy,
        }
    }

    pub fn skip_batch_policy(&self) -> SkipBatchPolicy {
        self.skip_batch_policy
    }

    /// Persist one dose. A skipped dose also raises an alert with `skips = 1`.
    pub fn record_dose(
        &self,
        patient_id: &str,
        drug_name: &str,
        status: DoseStatus,
        scheduled_time: Option<DateTime<Utc>>,
    ) -> Result<DoseOutcome, WorkflowError> {
        let patient = self.require_patient(patient_id)?;
        let dose = self.persist_dose(&patient, drug_name, status, scheduled_time)?;

        match status {
            DoseStatus::Taken => Ok(DoseOutcome::DoseRecorded(dose)),
            DoseStatus::Skipped => {
                let alert = self.create_skip_alert(patient_id, drug_name, 1)?;
                Ok(DoseOutcome::SkipAlertRaised(alert))
            }
        }
    }

    /// Record `skip_count` skipped doses and return the alert assessed with
    /// `skips = skip_count`.
    ///
    /// Under `SkipBatchPolicy::PerUnit` every unit runs the full skip-alert
    /// pipeline first, so `skip_count + 1` alerts are created. Under
    /// `Summary` the doses are written without alerts and only the final
    /// alert is raised.
    pub fn record_skip_dose(
        &self,
        patient_id: &str,
        drug_name: &str,
        skip_count: u32,
    ) -> Result<Alert, WorkflowError> {
        let patient = self.require_patient(patient_id)?;

        for _ in 0..skip_count {
            match self.skip_batch_policy {
                SkipBatchPolicy::PerUnit => {
                    self.record_dose(patient_id, drug_name, DoseStatus::Skipped, None)?;
                }
                SkipBatchPolicy::Summary => {
                    self.persist_dose(&patient, drug_name, DoseStatus::Skipped, None)?;
                }
            }
        }

        self.create_skip_alert(patient_id, drug_name, skip_count)
    }

    /// The skip-alert pipeline: analyze, update patient, persist, publish.
    pub fn create_skip_alert(
        &self,
        patient_id: &str,
        drug_name: &str,
        skips: u32,
    ) -> Result<Alert, WorkflowError> {
        let mut patient = self.require_patient(patient_id)?;

        let assessment = self.ai.analyze_skip_risk(&SkipRiskRequest {
            drug_name: drug_name.to_string(),
            skips,
            patient_age: patient.age,
            conditions: patient.conditions.clone(),
        })?;

        let now = Utc::now();
        patient.risk_level = Some(assessment.risk_level);
        patient.last_alert = Some(now);
        self.store.save_patient(&patient)?;

        let alert = Alert {
            id: Uuid::new_v4().to_string(),
            patient_id: patient.id.clone(),
            patient_name: patient.name.clone(),
            drug_name: drug_name.to_string(),
            risk_level: assessment.risk_level,
            message: assessment.message,
            ai_explanation: assessment.ai_explanation,
            timestamp: now,
            acknowledged: false,
        };
        self.store.save_alert(&alert)?;

        let delivered = self.bus.publish::<AlertCreated>(alert.clone());
        tracing::info!(
            alert_id = %alert.id,
            patient_id = %alert.patient_id,
            risk = %alert.risk_level,
            skips,
            delivered,
            "Skip alert raised"
        );
        Ok(alert)
    }

    fn require_patient(&self, patient_id: &str) -> Result<Patient, WorkflowError> {
        self.store
            .get_patient(patient_id)?
            .ok_or_else(|| WorkflowError::PatientNotFound(patient_id.to_string()))
    }

    fn persist_dose(
        &self,
        patient: &Patient,
        drug_name: &str,
        status: DoseStatus,
        scheduled_time: Option<DateTime<Utc>>,
    ) -> Result<MedicationDose, WorkflowError> {
        let now = Utc::now();
        let dose = MedicationDose {
            id: Uuid::new_v4().to_string(),
            patient_id: patient.id.clone(),
            drug_name: drug_name.to_string(),
            status,
            scheduled_time: scheduled_time.unwrap_or(now),
            actual_time: (status == DoseStatus::Taken).then_some(now),
            notes: None,
            created_at: now,
        };
        self.store.save_medication_dose(&dose)?;
        tracing::debug!(dose_id = %dose.id, patient_id = %patient.id, status = %status, "Dose recorded");
        Ok(dose)
    }
}
