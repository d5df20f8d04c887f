use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection};

use super::{format_ts, from_json_list, get_medications, parse_opt_ts, to_json_list};
use crate::db::DatabaseError;
use crate::models::enums::RiskLevel;
use crate::models::Patient;

const PATIENT_COLUMNS: &str =
    "id, name, age, conditions, current_medications, risk_level, last_alert, doctor_id, language";

/// Insert or update a patient. Medication details are stored separately.
pub fn upsert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, name, age, conditions, current_medications, risk_level,
         last_alert, doctor_id, language, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            age = excluded.age,
            conditions = excluded.conditions,
            current_medications = excluded.current_medications,
            risk_level = excluded.risk_level,
            last_alert = excluded.last_alert,
            doctor_id = excluded.doctor_id,
            language = excluded.language",
        params![
            patient.id,
            patient.name,
            patient.age,
            to_json_list(&patient.conditions),
            to_json_list(&patient.current_medications),
            patient.risk_level.map(|r| r.as_str()),
            patient.last_alert.as_ref().map(format_ts),
            patient.doctor_id,
            patient.language,
            format_ts(&Utc::now()),
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &str) -> Result<Option<Patient>, DatabaseError> {
    let result = conn.query_row(
        &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"),
        params![id],
        patient_row_from_rusqlite,
    );

    match result {
        Ok(row) => Ok(Some(load_patient(conn, row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_all_patients(conn: &Connection) -> Result<Vec<Patient>, DatabaseError> {
    query_patients(
        conn,
        &format!("SELECT {PATIENT_COLUMNS} FROM patients ORDER BY created_at ASC, rowid ASC"),
        params![],
    )
}

pub fn get_patients_by_doctor(
    conn: &Connection,
    doctor_id: &str,
) -> Result<Vec<Patient>, DatabaseError> {
    query_patients(
        conn,
        &format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE doctor_id = ?1
             ORDER BY created_at ASC, rowid ASC"
        ),
        params![doctor_id],
    )
}

/// Point the patient's `doctor_id` at an existing doctor.
pub fn assign_patient_to_doctor(
    conn: &Connection,
    patient_id: &str,
    doctor_id: &str,
) -> Result<(), DatabaseError> {
    let doctor_exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM doctors WHERE id = ?1)",
        params![doctor_id],
        |row| row.get(0),
    )?;
    if !doctor_exists {
        return Err(DatabaseError::not_found("doctor", doctor_id));
    }

    let updated = conn.execute(
        "UPDATE patients SET doctor_id = ?1 WHERE id = ?2",
        params![doctor_id, patient_id],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("patient", patient_id));
    }
    Ok(())
}

pub fn patient_exists(conn: &Connection, id: &str) -> Result<bool, DatabaseError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM patients WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn query_patients(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| Ok(patient_row_from_rusqlite(row)))?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(load_patient(conn, row??)?);
    }
    Ok(patients)
}

struct PatientRow {
    id: String,
    name: String,
    age: u32,
    conditions: String,
    current_medications: String,
    risk_level: Option<String>,
    last_alert: Option<String>,
    doctor_id: Option<String>,
    language: String,
}

fn patient_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<PatientRow, rusqlite::Error> {
    Ok(PatientRow {
        id: row.get(0)?,
        name: row.get(1)?,
        age: row.get(2)?,
        conditions: row.get(3)?,
        current_medications: row.get(4)?,
        risk_level: row.get(5)?,
        last_alert: row.get(6)?,
        doctor_id: row.get(7)?,
        language: row.get(8)?,
    })
}

fn load_patient(conn: &Connection, row: PatientRow) -> Result<Patient, DatabaseError> {
    let medication_details = get_medications(conn, &row.id)?;
    Ok(Patient {
        risk_level: row.risk_level.as_deref().map(RiskLevel::from_str).transpose()?,
        last_alert: parse_opt_ts(row.last_alert)?,
        conditions: from_json_list(&row.conditions),
        current_medications: from_json_list(&row.current_medications),
        id: row.id,
        name: row.name,
        age: row.age,
        doctor_id: row.doctor_id,
        language: row.language,
        medication_details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::insert_doctor;
    use crate::models::{Doctor, NewPatient};

    fn sample_patient(id: &str) -> Patient {
        Patient::from_new(
            id.to_string(),
            NewPatient {
                name: "Rajesh Kumar".into(),
                age: 63,
                conditions: vec!["Type 2 Diabetes".into(), "Heart Failure".into()],
                current_medications: vec!["Furosemide".into(), "Metformin".into()],
                doctor_id: None,
                language: None,
            },
        )
    }

    fn doctor(id: &str) -> Doctor {
        Doctor {
            id: id.into(),
            name: "Dr. Anjali Mehta".into(),
            email: None,
            specialization: None,
            patient_ids: vec![],
        }
    }

    #[test]
    fn upsert_then_get_preserves_fields() {
        let conn = open_memory_database().unwrap();
        let patient = sample_patient("p1");
        upsert_patient(&conn, &patient).unwrap();

        let loaded = get_patient(&conn, "p1").unwrap().unwrap();
        assert_eq!(loaded, patient);
    }

    #[test]
    fn upsert_updates_risk_in_place() {
        let conn = open_memory_database().unwrap();
        let mut patient = sample_patient("p1");
        upsert_patient(&conn, &patient).unwrap();

        patient.risk_level = Some(RiskLevel::High);
        patient.last_alert = Some(Utc::now());
        upsert_patient(&conn, &patient).unwrap();

        let loaded = get_patient(&conn, "p1").unwrap().unwrap();
        assert_eq!(loaded.risk_level, Some(RiskLevel::High));
        assert!(loaded.last_alert.is_some());
        assert_eq!(get_all_patients(&conn).unwrap().len(), 1);
    }

    #[test]
    fn missing_patient_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_patient(&conn, "nope").unwrap().is_none());
        assert!(!patient_exists(&conn, "nope").unwrap());
    }

    #[test]
    fn assign_and_filter_by_doctor() {
        let conn = open_memory_database().unwrap();
        insert_doctor(&conn, &doctor("doctor-1")).unwrap();
        upsert_patient(&conn, &sample_patient("p1")).unwrap();
        upsert_patient(&conn, &sample_patient("p2")).unwrap();

        assign_patient_to_doctor(&conn, "p2", "doctor-1").unwrap();

        let assigned = get_patients_by_doctor(&conn, "doctor-1").unwrap();
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].id, "p2");
    }

    #[test]
    fn assign_to_missing_entities_fails() {
        let conn = open_memory_database().unwrap();
        insert_doctor(&conn, &doctor("doctor-1")).unwrap();
        upsert_patient(&conn, &sample_patient("p1")).unwrap();

        let err = assign_patient_to_doctor(&conn, "p1", "ghost").unwrap_err();
        assert!(err.is_not_found());
        let err = assign_patient_to_doctor(&conn, "ghost", "doctor-1").unwrap_err();
        assert!(err.is_not_found());
    }
}
