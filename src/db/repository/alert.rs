use std::str::FromStr;

use rusqlite::{params, Connection};

use super::{format_ts, parse_ts, patient_exists};
use crate::db::DatabaseError;
use crate::models::enums::RiskLevel;
use crate::models::{Alert, AlertUpdate};

const ALERT_COLUMNS: &str =
    "id, patient_id, patient_name, drug_name, risk_level, message, ai_explanation, timestamp, acknowledged";

/// Persist a new alert. The referenced patient must exist.
pub fn insert_alert(conn: &Connection, alert: &Alert) -> Result<(), DatabaseError> {
    if !patient_exists(conn, &alert.patient_id)? {
        return Err(DatabaseError::not_found("patient", &alert.patient_id));
    }

    conn.execute(
        "INSERT INTO alerts (id, patient_id, patient_name, drug_name, risk_level, message,
         ai_explanation, timestamp, acknowledged)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            alert.id,
            alert.patient_id,
            alert.patient_name,
            alert.drug_name,
            alert.risk_level.as_str(),
            alert.message,
            alert.ai_explanation,
            format_ts(&alert.timestamp),
            alert.acknowledged as i32,
        ],
    )?;
    Ok(())
}

pub fn get_alert(conn: &Connection, id: &str) -> Result<Option<Alert>, DatabaseError> {
    let result = conn.query_row(
        &format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = ?1"),
        params![id],
        alert_row_from_rusqlite,
    );

    match result {
        Ok(row) => Ok(Some(alert_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Alerts of one patient, newest first.
pub fn get_alerts_by_patient(
    conn: &Connection,
    patient_id: &str,
) -> Result<Vec<Alert>, DatabaseError> {
    query_alerts(
        conn,
        &format!(
            "SELECT {ALERT_COLUMNS} FROM alerts WHERE patient_id = ?1
             ORDER BY timestamp DESC, rowid DESC"
        ),
        params![patient_id],
    )
}

/// Every alert, newest first.
pub fn get_all_alerts(conn: &Connection) -> Result<Vec<Alert>, DatabaseError> {
    query_alerts(
        conn,
        &format!("SELECT {ALERT_COLUMNS} FROM alerts ORDER BY timestamp DESC, rowid DESC"),
        params![],
    )
}

/// Apply a partial update. Fails with `NotFound` for an unknown id.
pub fn update_alert(conn: &Connection, id: &str, update: &AlertUpdate) -> Result<(), DatabaseError> {
    let updated = match update.acknowledged {
        Some(acknowledged) => conn.execute(
            "UPDATE alerts SET acknowledged = ?1 WHERE id = ?2",
            params![acknowledged as i32, id],
        )?,
        None => conn.query_row(
            "SELECT COUNT(*) FROM alerts WHERE id = ?1",
            params![id],
            |row| row.get::<_, i64>(0),
        )? as usize,
    };

    if updated == 0 {
        return Err(DatabaseError::not_found("alert", id));
    }
    Ok(())
}

fn query_alerts(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Alert>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| Ok(alert_row_from_rusqlite(row)))?;

    let mut alerts = Vec::new();
    for row in rows {
        alerts.push(alert_from_row(row??)?);
    }
    Ok(alerts)
}

struct AlertRow {
    id: String,
    patient_id: String,
    patient_name: String,
    drug_name: String,
    risk_level: String,
    message: String,
    ai_explanation: String,
    timestamp: String,
    acknowledged: i32,
}

fn alert_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<AlertRow, rusqlite::Error> {
    Ok(AlertRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        patient_name: row.get(2)?,
        drug_name: row.get(3)?,
        risk_level: row.get(4)?,
        message: row.get(5)?,
        ai_explanation: row.get(6)?,
        timestamp: row.get(7)?,
        acknowledged: row.get(8)?,
    })
}

fn alert_from_row(row: AlertRow) -> Result<Alert, DatabaseError> {
    Ok(Alert {
        risk_level: RiskLevel::from_str(&row.risk_level)?,
        timestamp: parse_ts(&row.timestamp)?,
        acknowledged: row.acknowledged != 0,
        id: row.id,
        patient_id: row.patient_id,
        patient_name: row.patient_name,
        drug_name: row.drug_name,
        message: row.message,
        ai_explanation: row.ai_explanation,
    })
}
