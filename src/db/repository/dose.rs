use std::str::FromStr;

use rusqlite::{params, Connection};

use super::{format_ts, parse_opt_ts, parse_ts, patient_exists};
use crate::db::DatabaseError;
use crate::models::enums::DoseStatus;
use crate::models::{MedicationDose, MedicationHistory};

const DOSE_COLUMNS: &str =
    "id, patient_id, drug_name, status, scheduled_time, actual_time, notes, created_at";

/// Append a dose record. The patient must exist.
pub fn insert_dose(conn: &Connection, dose: &MedicationDose) -> Result<(), DatabaseError> {
    if !patient_exists(conn, &dose.patient_id)? {
        return Err(DatabaseError::not_found("patient", &dose.patient_id));
    }

    conn.execute(
        "INSERT INTO medication_doses (id, patient_id, drug_name, status, scheduled_time,
         actual_time, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            dose.id,
            dose.patient_id,
            dose.drug_name,
            dose.status.as_str(),
            format_ts(&dose.scheduled_time),
            dose.actual_time.as_ref().map(format_ts),
            dose.notes,
            format_ts(&dose.created_at),
        ],
    )?;
    Ok(())
}

/// Most recent doses first.
pub fn get_recent_doses(
    conn: &Connection,
    patient_id: &str,
    limit: usize,
) -> Result<Vec<MedicationDose>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOSE_COLUMNS} FROM medication_doses WHERE patient_id = ?1
         ORDER BY created_at DESC, rowid DESC LIMIT ?2"
    ))?;
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = stmt.query_map(params![patient_id, limit], |row| {
        Ok(dose_row_from_rusqlite(row))
    })?;

    let mut doses = Vec::new();
    for row in rows {
        doses.push(dose_from_row(row??)?);
    }
    Ok(doses)
}

/// Dose history grouped by drug. Groups appear in order of each drug's
/// most recent dose; doses inside a group are newest first.
pub fn get_medication_history(
    conn: &Connection,
    patient_id: &str,
) -> Result<Vec<MedicationHistory>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOSE_COLUMNS} FROM medication_doses WHERE patient_id = ?1
         ORDER BY created_at DESC, rowid DESC"
    ))?;
    let rows = stmt.query_map(params![patient_id], |row| Ok(dose_row_from_rusqlite(row)))?;

    let mut groups: Vec<(String, Vec<MedicationDose>)> = Vec::new();
    for row in rows {
        let dose = dose_from_row(row??)?;
        match groups.iter_mut().find(|(drug, _)| *drug == dose.drug_name) {
            Some((_, doses)) => doses.push(dose),
            None => groups.push((dose.drug_name.clone(), vec![dose])),
        }
    }

    Ok(groups
        .into_iter()
        .map(|(drug, doses)| MedicationHistory::from_doses(patient_id, &drug, doses))
        .collect())
}

struct DoseRow {
    id: String,
    patient_id: String,
    drug_name: String,
    status: String,
    scheduled_time: String,
    actual_time: Option<String>,
    notes: Option<String>,
    created_at: String,
}

fn dose_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<DoseRow, rusqlite::Error> {
    Ok(DoseRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        drug_name: row.get(2)?,
        status: row.get(3)?,
        scheduled_time: row.get(4)?,
        actual_time: row.get(5)?,
        notes: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn dose_from_row(row: DoseRow) -> Result<MedicationDose, DatabaseError> {
    Ok(MedicationDose {
        status: DoseStatus::from_str(&row.status)?,
        scheduled_time: parse_ts(&row.scheduled_time)?,
        actual_time: parse_opt_ts(row.actual_time)?,
        created_at: parse_ts(&row.created_at)?,
        id: row.id,
        patient_id: row.patient_id,
        drug_name: row.drug_name,
        notes: row.notes,
    })
}
