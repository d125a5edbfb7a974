use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{expect_changed, parse_id};
use crate::db::DatabaseError;
use crate::models::Doctor;

const DOCTOR_COLUMNS: &str = "id, name, email, specialization, sip, phone, address, hospital,
     experience, created_at, updated_at";

pub fn insert_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctors (id, name, email, specialization, sip, phone, address, hospital,
         experience, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            doctor.id.to_string(),
            doctor.name,
            doctor.email,
            doctor.specialization,
            doctor.sip,
            doctor.phone,
            doctor.address,
            doctor.hospital,
            doctor.experience,
            doctor.created_at,
            doctor.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_doctor(conn: &Connection, id: &Uuid) -> Result<Option<Doctor>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {DOCTOR_COLUMNS} FROM doctors WHERE id = ?1"),
            params![id.to_string()],
            doctor_row_from_rusqlite,
        )
        .optional()?;
    row.map(doctor_from_row).transpose()
}

pub fn doctor_exists(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM doctors WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// All doctors, newest first.
pub fn list_doctors(conn: &Connection) -> Result<Vec<Doctor>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOCTOR_COLUMNS} FROM doctors ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map([], doctor_row_from_rusqlite)?;

    let mut doctors = Vec::new();
    for row in rows {
        doctors.push(doctor_from_row(row?)?);
    }
    Ok(doctors)
}

/// Overwrites every profile field except `id` and `created_at`.
pub fn update_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE doctors SET name = ?2, email = ?3, specialization = ?4, sip = ?5, phone = ?6,
         address = ?7, hospital = ?8, experience = ?9, updated_at = ?10
         WHERE id = ?1",
        params![
            doctor.id.to_string(),
            doctor.name,
            doctor.email,
            doctor.specialization,
            doctor.sip,
            doctor.phone,
            doctor.address,
            doctor.hospital,
            doctor.experience,
            doctor.updated_at,
        ],
    )?;
    expect_changed(changed, "doctor", &doctor.id)
}

pub fn delete_doctor(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM doctors WHERE id = ?1", params![id.to_string()])?;
    expect_changed(changed, "doctor", id)
}

struct DoctorRow {
    id: String,
    name: String,
    email: String,
    specialization: String,
    sip: String,
    phone: String,
    address: Option<String>,
    hospital: Option<String>,
    experience: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn doctor_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<DoctorRow, rusqlite::Error> {
    Ok(DoctorRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        specialization: row.get(3)?,
        sip: row.get(4)?,
        phone: row.get(5)?,
        address: row.get(6)?,
        hospital: row.get(7)?,
        experience: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn doctor_from_row(row: DoctorRow) -> Result<Doctor, DatabaseError> {
    Ok(Doctor {
        id: parse_id(&row.id)?,
        name: row.name,
        email: row.email,
        specialization: row.specialization,
        sip: row.sip,
        phone: row.phone,
        address: row.address,
        hospital: row.hospital,
        experience: row.experience,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
