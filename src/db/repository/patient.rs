use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{decode_list, encode_list, expect_changed, parse_enum, parse_id};
use crate::db::DatabaseError;
use crate::models::Patient;

const PATIENT_COLUMNS: &str = "id, user_id, name, age, gender, email, phone, condition, doctor_id,
     allergies, emergency_contact, address, created_at, updated_at";

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, user_id, name, age, gender, email, phone, condition, doctor_id,
         allergies, emergency_contact, address, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            patient.id.to_string(),
            patient.user_id.map(|id| id.to_string()),
            patient.name,
            patient.age,
            patient.gender.as_str(),
            patient.email,
            patient.phone,
            patient.condition,
            patient.doctor_id.to_string(),
            encode_list(&patient.allergies)?,
            patient.emergency_contact,
            patient.address,
            patient.created_at,
            patient.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"),
            params![id.to_string()],
            patient_row_from_rusqlite,
        )
        .optional()?;
    row.map(patient_from_row).transpose()
}

/// Patients newest first, optionally narrowed to one attending doctor.
pub fn list_patients(
    conn: &Connection,
    doctor_id: Option<&Uuid>,
) -> Result<Vec<Patient>, DatabaseError> {
    let (sql, params_vec): (String, Vec<String>) = match doctor_id {
        Some(id) => (
            format!(
                "SELECT {PATIENT_COLUMNS} FROM patients WHERE doctor_id = ?1
                 ORDER BY created_at DESC"
            ),
            vec![id.to_string()],
        ),
        None => (
            format!("SELECT {PATIENT_COLUMNS} FROM patients ORDER BY created_at DESC"),
            Vec::new(),
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        rusqlite::params_from_iter(params_vec.iter()),
        patient_row_from_rusqlite,
    )?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(patient_from_row(row?)?);
    }
    Ok(patients)
}

/// Ids of the patients a doctor attends.
pub fn patient_ids_for_doctor(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<Vec<Uuid>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT id FROM patients WHERE doctor_id = ?1")?;
    let rows = stmt.query_map(params![doctor_id.to_string()], |row| row.get::<_, String>(0))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(parse_id(&row?)?);
    }
    Ok(ids)
}

pub fn update_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE patients SET user_id = ?2, name = ?3, age = ?4, gender = ?5, email = ?6,
         phone = ?7, condition = ?8, doctor_id = ?9, allergies = ?10, emergency_contact = ?11,
         address = ?12, updated_at = ?13
         WHERE id = ?1",
        params![
            patient.id.to_string(),
            patient.user_id.map(|id| id.to_string()),
            patient.name,
            patient.age,
            patient.gender.as_str(),
            patient.email,
            patient.phone,
            patient.condition,
            patient.doctor_id.to_string(),
            encode_list(&patient.allergies)?,
            patient.emergency_contact,
            patient.address,
            patient.updated_at,
        ],
    )?;
    expect_changed(changed, "patient", &patient.id)
}

/// Removes the patient row only; schedules and records are left behind.
pub fn delete_patient(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM patients WHERE id = ?1", params![id.to_string()])?;
    expect_changed(changed, "patient", id)
}

struct PatientRow {
    id: String,
    user_id: Option<String>,
    name: String,
    age: u32,
    gender: String,
    email: String,
    phone: String,
    condition: String,
    doctor_id: String,
    allergies: String,
    emergency_contact: String,
    address: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn patient_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<PatientRow, rusqlite::Error> {
    Ok(PatientRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        age: row.get(3)?,
        gender: row.get(4)?,
        email: row.get(5)?,
        phone: row.get(6)?,
        condition: row.get(7)?,
        doctor_id: row.get(8)?,
        allergies: row.get(9)?,
        emergency_contact: row.get(10)?,
        address: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn patient_from_row(row: PatientRow) -> Result<Patient, DatabaseError> {
    Ok(Patient {
        id: parse_id(&row.id)?,
        user_id: row.user_id.as_deref().map(parse_id).transpose()?,
        name: row.name,
        age: row.age,
        gender: parse_enum(&row.gender)?,
        email: row.email,
        phone: row.phone,
        condition: row.condition,
        doctor_id: parse_id(&row.doctor_id)?,
        allergies: decode_list(&row.allergies)?,
        emergency_contact: row.emergency_contact,
        address: row.address,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
