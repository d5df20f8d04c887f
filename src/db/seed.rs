//! Demo data for a fresh install: one doctor and three patients.

use uuid::Uuid;

use super::{DatabaseError, Store};
use crate::models::{Doctor, NewPatient, Patient};

pub const DEMO_DOCTOR_ID: &str = "doctor-1";

struct DemoPatient {
    name: &'static str,
    age: u32,
    conditions: &'static [&'static str],
    medications: &'static [&'static str],
}

const DEMO_PATIENTS: &[DemoPatient] = &[
    DemoPatient {
        name: "Rajesh Kumar",
        age: 63,
        conditions: &["Type 2 Diabetes", "Heart Failure"],
        medications: &["Furosemide", "Metformin", "Lisinopril"],
    },
    DemoPatient {
        name: "Priya Sharma",
        age: 58,
        conditions: &["Hypertension"],
        medications: &["Amlodipine", "Atorvastatin"],
    },
    DemoPatient {
        name: "Suresh Patel",
        age: 71,
        conditions: &["Atrial Fibrillation"],
        medications: &["Warfarin", "Digoxin"],
    },
];

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Create the demo doctor if missing, and the demo patients only when no
/// patient exists yet. Returns the number of patients created.
pub fn seed_demo_data(store: &dyn Store) -> Result<usize, DatabaseError> {
    if store.get_doctor(DEMO_DOCTOR_ID)?.is_none() {
        store.save_doctor(&Doctor {
            id: DEMO_DOCTOR_ID.to_string(),
            name: "Dr. Anjali Mehta".to_string(),
            email: Some("dr.mehta@medmentor.ai".to_string()),
            specialization: Some("Cardiologist".to_string()),
            patient_ids: Vec::new(),
        })?;
        tracing::info!(doctor_id = DEMO_DOCTOR_ID, "Seeded demo doctor");
    }

    if !store.get_all_patients()?.is_empty() {
        return Ok(0);
    }

    for demo in DEMO_PATIENTS {
        let patient = Patient::from_new(
            Uuid::new_v4().to_string(),
            NewPatient {
                name: demo.name.to_string(),
                age: demo.age,
                conditions: owned(demo.conditions),
                current_medications: owned(demo.medications),
                doctor_id: Some(DEMO_DOCTOR_ID.to_string()),
                language: None,
            },
        );
        store.save_patient(&patient)?;
    }
    tracing::info!(count = DEMO_PATIENTS.len(), "Seeded demo patients");
    Ok(DEMO_PATIENTS.len())
}
