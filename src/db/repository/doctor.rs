use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::Doctor;

/// Insert or update a doctor. `patient_ids` is derived and never stored.
pub fn insert_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctors (id, name, email, specialization) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            email = excluded.email,
            specialization = excluded.specialization",
        params![doctor.id, doctor.name, doctor.email, doctor.specialization],
    )?;
    Ok(())
}

pub fn get_doctor(conn: &Connection, id: &str) -> Result<Option<Doctor>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, name, email, specialization FROM doctors WHERE id = ?1",
        params![id],
        |row| {
            Ok(Doctor {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                specialization: row.get(3)?,
                patient_ids: Vec::new(),
            })
        },
    );

    let mut doctor = match result {
        Ok(doctor) => doctor,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    doctor.patient_ids = patient_ids_for(conn, &doctor.id)?;
    Ok(Some(doctor))
}

pub fn get_all_doctors(conn: &Connection) -> Result<Vec<Doctor>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT id, name, email, specialization FROM doctors ORDER BY name ASC")?;
    let rows = stmt.query_map([], |row| {
        Ok(Doctor {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            specialization: row.get(3)?,
            patient_ids: Vec::new(),
        })
    })?;

    let mut doctors = Vec::new();
    for row in rows {
        let mut doctor = row?;
        doctor.patient_ids = patient_ids_for(conn, &doctor.id)?;
        doctors.push(doctor);
    }
    Ok(doctors)
}

fn patient_ids_for(conn: &Connection, doctor_id: &str) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id FROM patients WHERE doctor_id = ?1 ORDER BY created_at ASC, rowid ASC",
    )?;
    let ids = stmt
        .query_map(params![doctor_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}
