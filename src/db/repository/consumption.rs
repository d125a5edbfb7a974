use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{decode_list, encode_list, expect_changed, parse_enum, parse_id};
use crate::db::DatabaseError;
use crate::models::enums::RecordStatus;
use crate::models::ConsumptionRecord;

const RECORD_COLUMNS: &str = "id, patient_id, patient_name, medication_name, schedule_id,
     scheduled_date, scheduled_time, scheduled_date_time, actual_time, dosage, status, notes,
     side_effects_reported, recorded_by, created_at, updated_at";

/// Above this many patient ids a doctor's record list is fetched broadly
/// and filtered in memory instead of through an `IN` clause.
pub const MAX_IN_CLAUSE_IDS: usize = 10;

const INSERT_RECORD_SQL: &str = "INSERT INTO consumption_records (id, patient_id, patient_name,
     medication_name, schedule_id, scheduled_date, scheduled_time, scheduled_date_time,
     actual_time, dosage, status, notes, side_effects_reported, recorded_by, created_at,
     updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)";

pub fn insert_record(conn: &Connection, record: &ConsumptionRecord) -> Result<(), DatabaseError> {
    execute_insert(conn, INSERT_RECORD_SQL, record)?;
    Ok(())
}

/// Inserts unless a record already occupies the same
/// (schedule, date, time) slot. Returns whether a row was written.
pub fn insert_record_if_absent(
    conn: &Connection,
    record: &ConsumptionRecord,
) -> Result<bool, DatabaseError> {
    let sql = INSERT_RECORD_SQL.replacen("INSERT INTO", "INSERT OR IGNORE INTO", 1);
    Ok(execute_insert(conn, &sql, record)? == 1)
}

fn execute_insert(
    conn: &Connection,
    sql: &str,
    record: &ConsumptionRecord,
) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        sql,
        params![
            record.id.to_string(),
            record.patient_id.to_string(),
            record.patient_name,
            record.medication_name,
            record.schedule_id.to_string(),
            record.scheduled_date,
            record.scheduled_time,
            record.scheduled_date_time,
            record.actual_time,
            record.dosage,
            record.status.as_str(),
            record.notes,
            encode_list(&record.side_effects_reported)?,
            record.recorded_by,
            record.created_at,
            record.updated_at,
        ],
    )?;
    Ok(changed)
}

pub fn get_record(conn: &Connection, id: &Uuid) -> Result<Option<ConsumptionRecord>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM consumption_records WHERE id = ?1"),
            params![id.to_string()],
            record_row_from_rusqlite,
        )
        .optional()?;
    row.map(record_from_row).transpose()
}

/// Most recently created records, newest first.
pub fn list_records(conn: &Connection, limit: u32) -> Result<Vec<ConsumptionRecord>, DatabaseError> {
    query_records(
        conn,
        &format!(
            "SELECT {RECORD_COLUMNS} FROM consumption_records
             ORDER BY created_at DESC LIMIT {limit}"
        ),
        Vec::new(),
    )
}

/// Records belonging to any of `patient_ids`, newest first.
///
/// Small id sets go through an `IN` clause. Larger sets fall back to the
/// unfiltered query bounded by `limit`, then filter in memory, so a doctor
/// with many patients may see fewer than `limit` rows.
pub fn list_records_for_patients(
    conn: &Connection,
    patient_ids: &[Uuid],
    limit: u32,
) -> Result<Vec<ConsumptionRecord>, DatabaseError> {
    if patient_ids.is_empty() {
        return Ok(Vec::new());
    }

    if patient_ids.len() <= MAX_IN_CLAUSE_IDS {
        let placeholders: Vec<String> = (1..=patient_ids.len()).map(|i| format!("?{i}")).collect();
        let params_vec: Vec<String> = patient_ids.iter().map(Uuid::to_string).collect();
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM consumption_records
             WHERE patient_id IN ({}) ORDER BY created_at DESC LIMIT {limit}",
            placeholders.join(", "),
        );
        return query_records(conn, &sql, params_vec);
    }

    tracing::debug!(
        patients = patient_ids.len(),
        "Patient set too large for IN clause; filtering in memory"
    );
    let mut records = list_records(conn, limit)?;
    records.retain(|r| patient_ids.contains(&r.patient_id));
    Ok(records)
}

/// A schedule's records in (date, time) order.
pub fn list_records_for_schedule(
    conn: &Connection,
    schedule_id: &Uuid,
) -> Result<Vec<ConsumptionRecord>, DatabaseError> {
    query_records(
        conn,
        &format!(
            "SELECT {RECORD_COLUMNS} FROM consumption_records WHERE schedule_id = ?1
             ORDER BY scheduled_date ASC, scheduled_time ASC"
        ),
        vec![schedule_id.to_string()],
    )
}

pub fn count_records_for_schedule(
    conn: &Connection,
    schedule_id: &Uuid,
) -> Result<u32, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM consumption_records WHERE schedule_id = ?1",
        params![schedule_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Returns the number of rows removed.
pub fn delete_records_for_schedule(
    conn: &Connection,
    schedule_id: &Uuid,
) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "DELETE FROM consumption_records WHERE schedule_id = ?1",
        params![schedule_id.to_string()],
    )?)
}

/// Removes only the still-pending doses of a schedule.
pub fn delete_pending_records_for_schedule(
    conn: &Connection,
    schedule_id: &Uuid,
) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "DELETE FROM consumption_records WHERE schedule_id = ?1 AND status = 'pending'",
        params![schedule_id.to_string()],
    )?)
}

/// Writes a status edit. `actual_time = None` keeps whatever is stored.
#[allow(clippy::too_many_arguments)]
pub fn update_record_status(
    conn: &Connection,
    id: &Uuid,
    status: RecordStatus,
    actual_time: Option<DateTime<Utc>>,
    notes: &str,
    side_effects: &[String],
    recorded_by: &str,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE consumption_records SET status = ?2, actual_time = COALESCE(?3, actual_time),
         notes = ?4, side_effects_reported = ?5, recorded_by = ?6, updated_at = ?7
         WHERE id = ?1",
        params![
            id.to_string(),
            status.as_str(),
            actual_time,
            notes,
            encode_list(side_effects)?,
            recorded_by,
            now,
        ],
    )?;
    expect_changed(changed, "consumption_record", id)
}

fn query_records(
    conn: &Connection,
    sql: &str,
    params_vec: Vec<String>,
) -> Result<Vec<ConsumptionRecord>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(
        rusqlite::params_from_iter(params_vec.iter()),
        record_row_from_rusqlite,
    )?;

    let mut records = Vec::new();
    for row in rows {
        records.push(record_from_row(row?)?);
    }
    Ok(records)
}

struct RecordRow {
    id: String,
    patient_id: String,
    patient_name: String,
    medication_name: String,
    schedule_id: String,
    scheduled_date: NaiveDate,
    scheduled_time: String,
    scheduled_date_time: NaiveDateTime,
    actual_time: Option<DateTime<Utc>>,
    dosage: String,
    status: String,
    notes: String,
    side_effects_reported: String,
    recorded_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn record_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<RecordRow, rusqlite::Error> {
    Ok(RecordRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        patient_name: row.get(2)?,
        medication_name: row.get(3)?,
        schedule_id: row.get(4)?,
        scheduled_date: row.get(5)?,
        scheduled_time: row.get(6)?,
        scheduled_date_time: row.get(7)?,
        actual_time: row.get(8)?,
        dosage: row.get(9)?,
        status: row.get(10)?,
        notes: row.get(11)?,
        side_effects_reported: row.get(12)?,
        recorded_by: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn record_from_row(row: RecordRow) -> Result<ConsumptionRecord, DatabaseError> {
    Ok(ConsumptionRecord {
        id: parse_id(&row.id)?,
        patient_id: parse_id(&row.patient_id)?,
        patient_name: row.patient_name,
        medication_name: row.medication_name,
        schedule_id: parse_id(&row.schedule_id)?,
        scheduled_date: row.scheduled_date,
        scheduled_time: row.scheduled_time,
        scheduled_date_time: row.scheduled_date_time,
        actual_time: row.actual_time,
        dosage: row.dosage,
        status: parse_enum(&row.status)?,
        notes: row.notes,
        side_effects_reported: decode_list(&row.side_effects_reported)?,
        recorded_by: row.recorded_by,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
