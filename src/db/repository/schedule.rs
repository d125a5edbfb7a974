use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{decode_list, encode_list, expect_changed, parse_id};
use crate::db::DatabaseError;
use crate::models::MedicationSchedule;

const SCHEDULE_COLUMNS: &str = "id, patient_id, patient_name, medication_name, dosage, frequency,
     times, start_date, end_date, prescribed_by, prescribed_by_name, instructions, notes,
     is_active, created_at, updated_at";

pub fn insert_schedule(
    conn: &Connection,
    schedule: &MedicationSchedule,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medication_schedules (id, patient_id, patient_name, medication_name, dosage,
         frequency, times, start_date, end_date, prescribed_by, prescribed_by_name, instructions,
         notes, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            schedule.id.to_string(),
            schedule.patient_id.to_string(),
            schedule.patient_name,
            schedule.medication_name,
            schedule.dosage,
            schedule.frequency,
            encode_list(&schedule.times)?,
            schedule.start_date,
            schedule.end_date,
            schedule.prescribed_by.to_string(),
            schedule.prescribed_by_name,
            schedule.instructions,
            schedule.notes,
            schedule.is_active,
            schedule.created_at,
            schedule.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_schedule(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<MedicationSchedule>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {SCHEDULE_COLUMNS} FROM medication_schedules WHERE id = ?1"),
            params![id.to_string()],
            schedule_row_from_rusqlite,
        )
        .optional()?;
    row.map(schedule_from_row).transpose()
}

/// Every schedule, newest first.
pub fn list_schedules(conn: &Connection) -> Result<Vec<MedicationSchedule>, DatabaseError> {
    query_schedules(
        conn,
        &format!("SELECT {SCHEDULE_COLUMNS} FROM medication_schedules ORDER BY created_at DESC"),
        &[],
    )
}

/// Schedules written by one prescriber, newest first.
pub fn list_schedules_prescribed_by(
    conn: &Connection,
    prescriber: &Uuid,
) -> Result<Vec<MedicationSchedule>, DatabaseError> {
    query_schedules(
        conn,
        &format!(
            "SELECT {SCHEDULE_COLUMNS} FROM medication_schedules WHERE prescribed_by = ?1
             ORDER BY created_at DESC"
        ),
        &[prescriber.to_string()],
    )
}

pub fn list_schedules_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<MedicationSchedule>, DatabaseError> {
    query_schedules(
        conn,
        &format!(
            "SELECT {SCHEDULE_COLUMNS} FROM medication_schedules WHERE patient_id = ?1
             ORDER BY created_at DESC"
        ),
        &[patient_id.to_string()],
    )
}

/// Active schedules whose range covers `day`.
pub fn list_schedules_current_on(
    conn: &Connection,
    day: NaiveDate,
) -> Result<Vec<MedicationSchedule>, DatabaseError> {
    query_schedules(
        conn,
        &format!(
            "SELECT {SCHEDULE_COLUMNS} FROM medication_schedules
             WHERE is_active = 1 AND start_date <= ?1 AND end_date >= ?1
             ORDER BY created_at DESC"
        ),
        &[day.format("%Y-%m-%d").to_string()],
    )
}

pub fn update_schedule(
    conn: &Connection,
    schedule: &MedicationSchedule,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE medication_schedules SET patient_id = ?2, patient_name = ?3,
         medication_name = ?4, dosage = ?5, frequency = ?6, times = ?7, start_date = ?8,
         end_date = ?9, prescribed_by = ?10, prescribed_by_name = ?11, instructions = ?12,
         notes = ?13, is_active = ?14, updated_at = ?15
         WHERE id = ?1",
        params![
            schedule.id.to_string(),
            schedule.patient_id.to_string(),
            schedule.patient_name,
            schedule.medication_name,
            schedule.dosage,
            schedule.frequency,
            encode_list(&schedule.times)?,
            schedule.start_date,
            schedule.end_date,
            schedule.prescribed_by.to_string(),
            schedule.prescribed_by_name,
            schedule.instructions,
            schedule.notes,
            schedule.is_active,
            schedule.updated_at,
        ],
    )?;
    expect_changed(changed, "medication_schedule", &schedule.id)
}

/// Deletes the schedule; its records go with it via ON DELETE CASCADE.
pub fn delete_schedule(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM medication_schedules WHERE id = ?1",
        params![id.to_string()],
    )?;
    expect_changed(changed, "medication_schedule", id)
}

fn query_schedules(
    conn: &Connection,
    sql: &str,
    params_vec: &[String],
) -> Result<Vec<MedicationSchedule>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(
        rusqlite::params_from_iter(params_vec.iter()),
        schedule_row_from_rusqlite,
    )?;

    let mut schedules = Vec::new();
    for row in rows {
        schedules.push(schedule_from_row(row?)?);
    }
    Ok(schedules)
}

struct ScheduleRow {
    id: String,
    patient_id: String,
    patient_name: String,
    medication_name: String,
    dosage: String,
    frequency: String,
    times: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    prescribed_by: String,
    prescribed_by_name: String,
    instructions: String,
    notes: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn schedule_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<ScheduleRow, rusqlite::Error> {
    Ok(ScheduleRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        patient_name: row.get(2)?,
        medication_name: row.get(3)?,
        dosage: row.get(4)?,
        frequency: row.get(5)?,
        times: row.get(6)?,
        start_date: row.get(7)?,
        end_date: row.get(8)?,
        prescribed_by: row.get(9)?,
        prescribed_by_name: row.get(10)?,
        instructions: row.get(11)?,
        notes: row.get(12)?,
        is_active: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn schedule_from_row(row: ScheduleRow) -> Result<MedicationSchedule, DatabaseError> {
    Ok(MedicationSchedule {
        id: parse_id(&row.id)?,
        patient_id: parse_id(&row.patient_id)?,
        patient_name: row.patient_name,
        medication_name: row.medication_name,
        dosage: row.dosage,
        frequency: row.frequency,
        times: decode_list(&row.times)?,
        start_date: row.start_date,
        end_date: row.end_date,
        prescribed_by: parse_id(&row.prescribed_by)?,
        prescribed_by_name: row.prescribed_by_name,
        instructions: row.instructions,
        notes: row.notes,
        is_active: row.is_active,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
