//! Doctor dashboard: adherence per patient and risk-tier counts.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::config::RECENT_ALERTS_LIMIT;
use crate::db::{DatabaseError, Store};
use crate::models::enums::RiskLevel;
use crate::models::medication::adherence_rate;
use crate::models::{Alert, Doctor, MedicationHistory, Patient};

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Doctor not found: {0}")]
    DoctorNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientDetail {
    #[serde(flatten)]
    pub patient: Patient,
    pub medication_history: Vec<MedicationHistory>,
    pub recent_alerts: Vec<Alert>,
    pub total_doses_taken: u32,
    pub total_doses_skipped: u32,
    pub adherence_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoctorDashboard {
    pub doctor_id: String,
    pub doctor_name: String,
    pub total_patients: usize,
    pub high_risk_patients: usize,
    pub medium_risk_patients: usize,
    /// Includes patients with no assessed risk yet.
    pub low_risk_patients: usize,
    pub patients: Vec<PatientDetail>,
}

pub struct DashboardService {
    store: Arc<dyn Store>,
}

impl DashboardService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn doctor_dashboard(&self, doctor_id: &str) -> Result<DoctorDashboard, DashboardError> {
        let doctor = self.require_doctor(doctor_id)?;

        let patients = self
            .store
            .get_patients_by_doctor(doctor_id)?
            .into_iter()
            .map(|patient| self.patient_detail(patient))
            .collect::<Result<Vec<_>, _>>()?;

        let count = |tier: RiskLevel| {
            patients
                .iter()
                .filter(|d| d.patient.risk_level.unwrap_or(RiskLevel::Low) == tier)
                .count()
        };

        Ok(DoctorDashboard {
            doctor_id: doctor.id,
            doctor_name: doctor.name,
            total_patients: patients.len(),
            high_risk_patients: count(RiskLevel::High),
            medium_risk_patients: count(RiskLevel::Medium),
            low_risk_patients: count(RiskLevel::Low),
            patients,
        })
    }

    /// `None` when the patient does not exist or belongs to another doctor.
    pub fn patient_details(
        &self,
        doctor_id: &str,
        patient_id: &str,
    ) -> Result<Option<PatientDetail>, DashboardError> {
        self.require_doctor(doctor_id)?;

        match self.store.get_patient(patient_id)? {
            Some(patient) if patient.doctor_id.as_deref() == Some(doctor_id) => {
                Ok(Some(self.patient_detail(patient)?))
            }
            _ => Ok(None),
        }
    }

    fn patient_detail(&self, patient: Patient) -> Result<PatientDetail, DashboardError> {
        let medication_history = self.store.get_medication_history(&patient.id)?;
        let mut recent_alerts = self.store.get_alerts_by_patient(&patient.id)?;
        recent_alerts.truncate(RECENT_ALERTS_LIMIT);

        let total_doses_taken: u32 = medication_history.iter().map(|h| h.total_taken).sum();
        let total_doses_skipped: u32 = medication_history.iter().map(|h| h.total_skipped).sum();

        Ok(PatientDetail {
            patient,
            medication_history,
            recent_alerts,
            total_doses_taken,
            total_doses_skipped,
            adherence_rate: adherence_rate(total_doses_taken, total_doses_skipped),
        })
    }

    fn require_doctor(&self, doctor_id: &str) -> Result<Doctor, DashboardError> {
        self.store
            .get_doctor(doctor_id)?
            .ok_or_else(|| DashboardError::DoctorNotFound(doctor_id.to_string()))
    }
}
