//! Medication schedules and the dose expander.
//!
//! A schedule expands to one pending `ConsumptionRecord` per calendar day in
//! `[start_date, end_date]` times each entry of `times`. Two write paths use
//! the expansion:
//! - regeneration (create, reactivate, time list changed): replace every
//!   record of the schedule inside one transaction
//! - generate-upcoming: fill today and the next six days for every current
//!   schedule, skipping slots that already hold a record

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::enums::{RecordStatus, Role};
use crate::models::{
    matches_search, ConsumptionRecord, MedicationSchedule, ScheduleFilter, ScheduleInput,
    SYSTEM_RECORDER,
};
use crate::scoping::{self, require_staff, AccessError, Viewer};

/// Days covered by generate-upcoming, starting today.
pub const UPCOMING_DAYS: i64 = 7;

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Invalid dose time {0:?}, expected HH:MM")]
    InvalidTime(String),
    #[error("Start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error("Medication name is required")]
    MissingMedication,
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for ScheduleError {
    fn from(err: rusqlite::Error) -> Self {
        ScheduleError::Database(err.into())
    }
}

pub fn parse_dose_time(raw: &str) -> Result<NaiveTime, ScheduleError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| ScheduleError::InvalidTime(raw.to_string()))
}

/// Trim, validate and de-duplicate a time list, keeping entry order.
pub fn normalize_times(times: &[String]) -> Result<Vec<String>, ScheduleError> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(times.len());
    for raw in times {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        parse_dose_time(trimmed)?;
        if seen.insert(trimmed.to_string()) {
            out.push(trimmed.to_string());
        }
    }
    Ok(out)
}

fn pending_record(
    schedule: &MedicationSchedule,
    date: NaiveDate,
    time: &str,
    at: NaiveTime,
    now: DateTime<Utc>,
) -> ConsumptionRecord {
    ConsumptionRecord {
        id: Uuid::new_v4(),
        patient_id: schedule.patient_id,
        patient_name: schedule.patient_name.clone(),
        medication_name: schedule.medication_name.clone(),
        schedule_id: schedule.id,
        scheduled_date: date,
        scheduled_time: time.to_string(),
        scheduled_date_time: date.and_time(at),
        actual_time: None,
        dosage: schedule.dosage.clone(),
        status: RecordStatus::Pending,
        notes: String::new(),
        side_effects_reported: Vec::new(),
        recorded_by: SYSTEM_RECORDER.into(),
        created_at: now,
        updated_at: now,
    }
}

/// Records for the given days, in (date, time-list) order.
fn expand_days<I>(
    schedule: &MedicationSchedule,
    days: I,
    now: DateTime<Utc>,
) -> Result<Vec<ConsumptionRecord>, ScheduleError>
where
    I: IntoIterator<Item = NaiveDate>,
{
    let parsed: Vec<(&str, NaiveTime)> = schedule
        .times
        .iter()
        .map(|t| parse_dose_time(t).map(|at| (t.as_str(), at)))
        .collect::<Result<_, _>>()?;

    let mut records = Vec::new();
    for date in days {
        for (time, at) in &parsed {
            records.push(pending_record(schedule, date, time, *at, now));
        }
    }
    Ok(records)
}

/// Full expansion of a schedule. Empty when `times` is empty or the range
/// is inverted.
pub fn expand_schedule(
    schedule: &MedicationSchedule,
    now: DateTime<Utc>,
) -> Result<Vec<ConsumptionRecord>, ScheduleError> {
    let days = schedule
        .start_date
        .iter_days()
        .take_while(|d| *d <= schedule.end_date);
    expand_days(schedule, days, now)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationReport {
    pub records_created: u32,
    pub records_removed: u32,
    pub total_days: u32,
    pub times_per_day: u32,
    pub expected_total: u32,
}

/// Replace every record of a schedule with a fresh expansion, atomically.
pub fn regenerate_records(
    conn: &Connection,
    schedule: &MedicationSchedule,
) -> Result<GenerationReport, ScheduleError> {
    let records = expand_schedule(schedule, Utc::now())?;

    let tx = conn.unchecked_transaction()?;
    let removed = db::delete_records_for_schedule(&tx, &schedule.id)?;
    for record in &records {
        db::insert_record(&tx, record)?;
    }
    tx.commit()?;

    let report = GenerationReport {
        records_created: records.len() as u32,
        records_removed: removed as u32,
        total_days: schedule.total_days(),
        times_per_day: schedule.times.len() as u32,
        expected_total: schedule.total_doses(),
    };
    tracing::info!(
        schedule_id = %schedule.id,
        created = report.records_created,
        removed = report.records_removed,
        "Consumption records regenerated"
    );
    Ok(report)
}

/// Regenerate, logging and swallowing any failure so the schedule write
/// that triggered it still succeeds.
fn regenerate_best_effort(
    conn: &Connection,
    schedule: &MedicationSchedule,
) -> Option<GenerationReport> {
    match regenerate_records(conn, schedule) {
        Ok(report) => Some(report),
        Err(e) => {
            tracing::error!(schedule_id = %schedule.id, error = %e, "Record generation failed");
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingReport {
    pub eligible_schedules: u32,
    pub records_created: u32,
    pub message: String,
}

impl UpcomingReport {
    pub fn nothing_eligible(&self) -> bool {
        self.eligible_schedules == 0
    }
}

/// Fill today through today+6 for every current schedule the viewer
/// prescribes (operators: every schedule). Existing slots are left alone.
pub fn generate_upcoming(
    conn: &Connection,
    viewer: &Viewer,
    today: NaiveDate,
) -> Result<UpcomingReport, ScheduleError> {
    require_staff(viewer)?;

    let mut schedules = db::list_schedules_current_on(conn, today)?;
    if viewer.role == Role::Doctor {
        schedules.retain(|s| s.prescribed_by == viewer.id);
    }

    let now = Utc::now();
    let tx = conn.unchecked_transaction()?;
    let mut created = 0u32;
    for schedule in &schedules {
        let days = (0..UPCOMING_DAYS)
            .map(|offset| today + Duration::days(offset))
            .take_while(|d| *d <= schedule.end_date);
        for record in expand_days(schedule, days, now)? {
            if db::insert_record_if_absent(&tx, &record)? {
                created += 1;
            }
        }
    }
    tx.commit()?;

    let message = if schedules.is_empty() {
        "No active schedules eligible for generation".to_string()
    } else {
        format!("Generated {created} consumption records for the next {UPCOMING_DAYS} days")
    };
    let report = UpcomingReport {
        eligible_schedules: schedules.len() as u32,
        records_created: created,
        message,
    };
    tracing::info!(
        user_id = %viewer.id,
        eligible = report.eligible_schedules,
        created = report.records_created,
        "Upcoming consumption records generated"
    );
    Ok(report)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleStats {
    pub total: u32,
    pub active: u32,
    pub inactive: u32,
    /// Distinct patients across the listed schedules.
    pub patients: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleList {
    pub schedules: Vec<MedicationSchedule>,
    pub stats: ScheduleStats,
}

/// Visible schedules narrowed by `filter`. Stats cover every visible
/// schedule, not just the filtered page.
pub fn list_schedules(
    conn: &Connection,
    viewer: &Viewer,
    filter: &ScheduleFilter,
) -> Result<ScheduleList, ScheduleError> {
    let mut schedules = scoping::visible_schedules(conn, viewer)?;

    let active = schedules.iter().filter(|s| s.is_active).count() as u32;
    let patients: HashSet<Uuid> = schedules.iter().map(|s| s.patient_id).collect();
    let stats = ScheduleStats {
        total: schedules.len() as u32,
        active,
        inactive: schedules.len() as u32 - active,
        patients: patients.len() as u32,
    };

    schedules.retain(|s| {
        matches_search(
            filter.search.as_deref(),
            &[&s.patient_name, &s.medication_name, &s.dosage],
        ) && filter.patient_id.map_or(true, |p| s.patient_id == p)
            && match filter.status.as_deref() {
                Some("active") => s.is_active,
                Some("inactive") => !s.is_active,
                _ => true,
            }
    });
    Ok(ScheduleList { schedules, stats })
}

pub fn get_schedule(
    conn: &Connection,
    viewer: &Viewer,
    id: &Uuid,
) -> Result<MedicationSchedule, ScheduleError> {
    Ok(scoping::schedule_for_viewer(conn, viewer, id)?)
}

/// Result of a schedule write. `generation` is `None` when no expansion
/// ran or when it failed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSaved {
    pub schedule: MedicationSchedule,
    pub generation: Option<GenerationReport>,
}

fn validate(input: &ScheduleInput) -> Result<Vec<String>, ScheduleError> {
    if input.medication_name.trim().is_empty() {
        return Err(ScheduleError::MissingMedication);
    }
    if input.start_date > input.end_date {
        return Err(ScheduleError::InvalidRange {
            start: input.start_date,
            end: input.end_date,
        });
    }
    normalize_times(&input.times)
}

fn writable_patient(
    conn: &Connection,
    viewer: &Viewer,
    patient_id: &Uuid,
) -> Result<crate::models::Patient, ScheduleError> {
    require_staff(viewer)?;
    let patient = scoping::patient_for_viewer(conn, viewer, patient_id)?;
    if !scoping::can_manage_schedules_for(viewer, &patient) {
        return Err(AccessError::Forbidden("not the patient's doctor".into()).into());
    }
    Ok(patient)
}

/// Create a schedule prescribed by the viewer and expand its full date range.
/// Expansion runs whatever the active flag says.
pub fn create_schedule(
    conn: &Connection,
    viewer: &Viewer,
    input: &ScheduleInput,
) -> Result<ScheduleSaved, ScheduleError> {
    let times = validate(input)?;
    let patient = writable_patient(conn, viewer, &input.patient_id)?;

    let now = Utc::now();
    let schedule = MedicationSchedule {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        patient_name: patient.name,
        medication_name: input.medication_name.trim().to_string(),
        dosage: input.dosage.trim().to_string(),
        frequency: input.frequency.trim().to_string(),
        times,
        start_date: input.start_date,
        end_date: input.end_date,
        prescribed_by: viewer.id,
        prescribed_by_name: viewer.name.clone(),
        instructions: input.instructions.trim().to_string(),
        notes: input.notes.clone().filter(|n| !n.trim().is_empty()),
        is_active: input.is_active,
        created_at: now,
        updated_at: now,
    };
    db::insert_schedule(conn, &schedule)?;
    tracing::info!(schedule_id = %schedule.id, patient_id = %schedule.patient_id, "Schedule created");

    let generation = regenerate_best_effort(conn, &schedule);
    Ok(ScheduleSaved {
        schedule,
        generation,
    })
}

/// Overwrite a schedule. The editor becomes the prescriber.
///
/// Records follow the active flag: reactivating or changing the time list
/// of an active schedule regenerates everything, deactivating drops the
/// still-pending doses, anything else leaves records untouched.
pub fn update_schedule(
    conn: &Connection,
    viewer: &Viewer,
    id: &Uuid,
    input: &ScheduleInput,
) -> Result<ScheduleSaved, ScheduleError> {
    let times = validate(input)?;
    let previous = get_schedule(conn, viewer, id)?;
    writable_patient(conn, viewer, &previous.patient_id)?;
    let patient = writable_patient(conn, viewer, &input.patient_id)?;

    let schedule = MedicationSchedule {
        patient_id: patient.id,
        patient_name: patient.name,
        medication_name: input.medication_name.trim().to_string(),
        dosage: input.dosage.trim().to_string(),
        frequency: input.frequency.trim().to_string(),
        times,
        start_date: input.start_date,
        end_date: input.end_date,
        prescribed_by: viewer.id,
        prescribed_by_name: viewer.name.clone(),
        instructions: input.instructions.trim().to_string(),
        notes: input.notes.clone().filter(|n| !n.trim().is_empty()),
        is_active: input.is_active,
        updated_at: Utc::now(),
        ..previous.clone()
    };
    let deactivated = !schedule.is_active && previous.is_active;

    let tx = conn.unchecked_transaction()?;
    db::update_schedule(&tx, &schedule)?;
    let dropped = if deactivated {
        Some(db::delete_pending_records_for_schedule(&tx, &schedule.id)?)
    } else {
        None
    };
    tx.commit()?;

    tracing::info!(schedule_id = %schedule.id, "Schedule updated");
    if let Some(removed) = dropped {
        tracing::info!(schedule_id = %schedule.id, removed, "Pending records dropped on deactivation");
    }

    let reactivated = schedule.is_active && !previous.is_active;
    let times_changed = schedule.times != previous.times;
    let generation = if schedule.is_active && (reactivated || times_changed) {
        regenerate_best_effort(conn, &schedule)
    } else {
        None
    };
    Ok(ScheduleSaved {
        schedule,
        generation,
    })
}

/// Delete a schedule and every record derived from it. Returns the number
/// of records removed.
pub fn delete_schedule(
    conn: &Connection,
    viewer: &Viewer,
    id: &Uuid,
) -> Result<usize, ScheduleError> {
    let schedule = get_schedule(conn, viewer, id)?;
    writable_patient(conn, viewer, &schedule.patient_id)?;

    let tx = conn.unchecked_transaction()?;
    let removed = db::delete_records_for_schedule(&tx, id)?;
    db::delete_schedule(&tx, id)?;
    tx.commit()?;

    tracing::info!(schedule_id = %id, removed, "Schedule deleted");
    Ok(removed)
}
