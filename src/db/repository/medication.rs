use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::patient_exists;
use crate::db::DatabaseError;
use crate::models::enums::{MedicationFrequency, RiskLevel};
use crate::models::MedicationDetail;

/// Replace every medication of a patient (delete-all-then-insert).
pub fn replace_medications(
    conn: &Connection,
    patient_id: &str,
    medications: &[MedicationDetail],
) -> Result<(), DatabaseError> {
    if !patient_exists(conn, patient_id)? {
        return Err(DatabaseError::not_found("patient", patient_id));
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM medications WHERE patient_id = ?1",
        params![patient_id],
    )?;

    for med in medications {
        tx.execute(
            "INSERT INTO medications (id, patient_id, drug_name, dosage, frequency, timing,
             purpose, risk_level, instructions)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                Uuid::new_v4().to_string(),
                patient_id,
                med.drug_name,
                med.dosage,
                med.frequency.as_str(),
                med.timing,
                med.purpose,
                med.risk_level.as_str(),
                med.instructions,
            ],
        )?;
    }

    tx.commit()?;
    Ok(())
}

/// Medications of a patient in insertion order.
pub fn get_medications(
    conn: &Connection,
    patient_id: &str,
) -> Result<Vec<MedicationDetail>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT drug_name, dosage, frequency, timing, purpose, risk_level, instructions
         FROM medications WHERE patient_id = ?1 ORDER BY rowid ASC",
    )?;

    let rows = stmt.query_map(params![patient_id], |row| {
        Ok(medication_row_from_rusqlite(row))
    })?;

    let mut meds = Vec::new();
    for row in rows {
        meds.push(medication_from_row(row??)?);
    }
    Ok(meds)
}

struct MedicationRow {
    drug_name: String,
    dosage: String,
    frequency: String,
    timing: Option<String>,
    purpose: Option<String>,
    risk_level: String,
    instructions: Option<String>,
}

fn medication_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<MedicationRow, rusqlite::Error> {
    Ok(MedicationRow {
        drug_name: row.get(0)?,
        dosage: row.get(1)?,
        frequency: row.get(2)?,
        timing: row.get(3)?,
        purpose: row.get(4)?,
        risk_level: row.get(5)?,
        instructions: row.get(6)?,
    })
}

fn medication_from_row(row: MedicationRow) -> Result<MedicationDetail, DatabaseError> {
    Ok(MedicationDetail {
        drug_name: row.drug_name,
        dosage: row.dosage,
        frequency: MedicationFrequency::from_str(&row.frequency)?,
        timing: row.timing,
        purpose: row.purpose,
        risk_level: RiskLevel::from_str(&row.risk_level)?,
        instructions: row.instructions,
    })
}
