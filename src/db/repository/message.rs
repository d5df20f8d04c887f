use std::str::FromStr;

use rusqlite::{params, Connection};

use super::{format_ts, parse_ts};
use crate::db::DatabaseError;
use crate::models::enums::SenderRole;
use crate::models::Message;

const MESSAGE_COLUMNS: &str =
    "id, patient_id, doctor_id, sender, message, audio_url, language, timestamp, read";

pub fn insert_message(conn: &Connection, msg: &Message) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO messages (id, patient_id, doctor_id, sender, message, audio_url, language,
         timestamp, read)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            msg.id,
            msg.patient_id,
            msg.doctor_id,
            msg.sender.as_str(),
            msg.message,
            msg.audio_url,
            msg.language,
            format_ts(&msg.timestamp),
            msg.read as i32,
        ],
    )?;
    Ok(())
}

pub fn get_message(conn: &Connection, id: &str) -> Result<Option<Message>, DatabaseError> {
    let result = conn.query_row(
        &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
        params![id],
        message_row_from_rusqlite,
    );

    match result {
        Ok(row) => Ok(Some(message_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Messages of one (patient, doctor) pair, oldest first.
pub fn get_messages_for_pair(
    conn: &Connection,
    patient_id: &str,
    doctor_id: &str,
) -> Result<Vec<Message>, DatabaseError> {
    query_messages(
        conn,
        &format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE patient_id = ?1 AND doctor_id = ?2
             ORDER BY timestamp ASC, rowid ASC"
        ),
        params![patient_id, doctor_id],
    )
}

/// Every message involving a doctor, newest first.
pub fn get_messages_by_doctor(
    conn: &Connection,
    doctor_id: &str,
) -> Result<Vec<Message>, DatabaseError> {
    query_messages(
        conn,
        &format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE doctor_id = ?1
             ORDER BY timestamp DESC, rowid DESC"
        ),
        params![doctor_id],
    )
}

/// Every message involving a patient, newest first.
pub fn get_messages_by_patient(
    conn: &Connection,
    patient_id: &str,
) -> Result<Vec<Message>, DatabaseError> {
    query_messages(
        conn,
        &format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE patient_id = ?1
             ORDER BY timestamp DESC, rowid DESC"
        ),
        params![patient_id],
    )
}

pub fn mark_message_read(conn: &Connection, id: &str) -> Result<(), DatabaseError> {
    let updated = conn.execute("UPDATE messages SET read = 1 WHERE id = ?1", params![id])?;
    if updated == 0 {
        return Err(DatabaseError::not_found("message", id));
    }
    Ok(())
}

fn query_messages(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Message>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| Ok(message_row_from_rusqlite(row)))?;

    let mut messages = Vec::new();
    for row in rows {
        messages.push(message_from_row(row??)?);
    }
    Ok(messages)
}

struct MessageRow {
    id: String,
    patient_id: String,
    doctor_id: String,
    sender: String,
    message: String,
    audio_url: Option<String>,
    language: Option<String>,
    timestamp: String,
    read: i32,
}

fn message_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<MessageRow, rusqlite::Error> {
    Ok(MessageRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        sender: row.get(3)?,
        message: row.get(4)?,
        audio_url: row.get(5)?,
        language: row.get(6)?,
        timestamp: row.get(7)?,
        read: row.get(8)?,
    })
}

fn message_from_row(row: MessageRow) -> Result<Message, DatabaseError> {
    Ok(Message {
        sender: SenderRole::from_str(&row.sender)?,
        timestamp: parse_ts(&row.timestamp)?,
        read: row.read != 0,
        id: row.id,
        patient_id: row.patient_id,
        doctor_id: row.doctor_id,
        message: row.message,
        audio_url: row.audio_url,
        language: row.language,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use chrono::{Duration, Utc};

    fn msg(id: &str, patient: &str, doctor: &str, offset_secs: i64) -> Message {
        Message {
            id: id.into(),
            patient_id: patient.into(),
            doctor_id: doctor.into(),
            sender: SenderRole::Patient,
            message: format!("message {id}"),
            audio_url: None,
            language: Some("hi".into()),
            timestamp: Utc::now() + Duration::seconds(offset_secs),
            read: false,
        }
    }

    #[test]
    fn pair_query_is_oldest_first() {
        let conn = open_memory_database().unwrap();
        insert_message(&conn, &msg("m2", "p1", "d1", 2)).unwrap();
        insert_message(&conn, &msg("m1", "p1", "d1", 1)).unwrap();
        insert_message(&conn, &msg("other", "p2", "d1", 3)).unwrap();

        let ids: Vec<String> = get_messages_for_pair(&conn, "p1", "d1")
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }

    #[test]
    fn doctor_and_patient_queries_are_newest_first() {
        let conn = open_memory_database().unwrap();
        insert_message(&conn, &msg("m1", "p1", "d1", 1)).unwrap();
        insert_message(&conn, &msg("m2", "p2", "d1", 2)).unwrap();
        insert_message(&conn, &msg("m3", "p1", "d2", 3)).unwrap();

        let by_doctor = get_messages_by_doctor(&conn, "d1").unwrap();
        assert_eq!(by_doctor[0].id, "m2");
        assert_eq!(by_doctor.len(), 2);

        let by_patient = get_messages_by_patient(&conn, "p1").unwrap();
        assert_eq!(by_patient[0].id, "m3");
        assert_eq!(by_patient.len(), 2);
    }

    #[test]
    fn mark_read_updates_and_reports_missing() {
        let conn = open_memory_database().unwrap();
        insert_message(&conn, &msg("m1", "p1", "d1", 0)).unwrap();

        mark_message_read(&conn, "m1").unwrap();
        assert!(get_message(&conn, "m1").unwrap().unwrap().read);
        assert!(mark_message_read(&conn, "ghost").unwrap_err().is_not_found());
    }
}
