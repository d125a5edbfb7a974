//! Consumption record reads and manual status edits.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::compliance::{summarize, ComplianceSummary};
use crate::db::{self, DatabaseError};
use crate::models::{matches_search, ConsumptionRecord, RecordFilter, RecordStatusUpdate};
use crate::scoping::{self, require_operator, AccessError, Viewer};

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordList {
    pub records: Vec<ConsumptionRecord>,
    /// Computed over every visible record, before filters apply.
    pub summary: ComplianceSummary,
}

pub fn list_records(
    conn: &Connection,
    viewer: &Viewer,
    filter: &RecordFilter,
    limit: u32,
) -> Result<RecordList, RecordError> {
    let mut records = scoping::visible_records(conn, viewer, limit)?;
    let summary = summarize(&records);

    records.retain(|r| {
        matches_search(
            filter.search.as_deref(),
            &[&r.patient_name, &r.medication_name],
        ) && filter.status.map_or(true, |s| r.status == s)
            && filter.patient_id.map_or(true, |p| r.patient_id == p)
            && filter.date.map_or(true, |d| r.scheduled_date == d)
    });
    Ok(RecordList { records, summary })
}

pub fn get_record(
    conn: &Connection,
    viewer: &Viewer,
    id: &Uuid,
) -> Result<ConsumptionRecord, RecordError> {
    Ok(scoping::record_for_viewer(conn, viewer, id)?)
}

/// Apply a manual status edit at `now`.
///
/// `taken` and `late` stamp `now` as the actual time; `pending` and
/// `missed` keep whatever actual time the record already had.
pub fn update_status(
    conn: &Connection,
    viewer: &Viewer,
    id: &Uuid,
    update: &RecordStatusUpdate,
    now: DateTime<Utc>,
) -> Result<ConsumptionRecord, RecordError> {
    require_operator(viewer)?;
    let previous = get_record(conn, viewer, id)?;

    let actual_time = update.status.stamps_actual_time().then_some(now);
    let side_effects: Vec<String> = update
        .side_effects_reported
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let recorded_by = viewer.id.to_string();

    db::update_record_status(
        conn,
        id,
        update.status,
        actual_time,
        update.notes.trim(),
        &side_effects,
        &recorded_by,
        now,
    )?;
    tracing::info!(
        record_id = %id,
        from = %previous.status,
        to = %update.status,
        "Consumption status updated"
    );

    Ok(ConsumptionRecord {
        status: update.status,
        actual_time: actual_time.or(previous.actual_time),
        notes: update.notes.trim().to_string(),
        side_effects_reported: side_effects,
        recorded_by,
        updated_at: now,
        ..previous
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::doctors::create_doctor;
    use crate::models::enums::{Gender, RecordStatus, Role};
    use crate::models::{AllergiesInput, DoctorInput, PatientInput, ScheduleInput};
    use crate::patients::create_patient;
    use crate::schedules::create_schedule;
    use chrono::{Duration, NaiveDate};

    struct Ward {
        conn: Connection,
        op: Viewer,
        doctor: Viewer,
    }

    fn doctor_input(name: &str, email: &str) -> DoctorInput {
        DoctorInput {
            name: name.into(),
            email: email.into(),
            password: Some("pw".into()),
            specialization: String::new(),
            sip: String::new(),
            phone: String::new(),
            address: None,
            hospital: None,
            experience: None,
        }
    }

    fn add_patient(ward: &Ward, name: &str, doctor_id: Uuid, medication: &str) -> Uuid {
        let patient = create_patient(
            &ward.conn,
            &ward.op,
            &PatientInput {
                name: name.into(),
                user_id: None,
                age: 40,
                gender: Gender::Female,
                email: String::new(),
                phone: String::new(),
                condition: String::new(),
                doctor_id,
                allergies: AllergiesInput::default(),
                emergency_contact: String::new(),
                address: String::new(),
            },
        )
        .unwrap();
        create_schedule(
            &ward.conn,
            &ward.op,
            &ScheduleInput {
                patient_id: patient.id,
                medication_name: medication.into(),
                dosage: "1 tab".into(),
                frequency: "daily".into(),
                times: vec!["08:00".into(), "20:00".into()],
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                instructions: String::new(),
                notes: None,
                is_active: true,
            },
        )
        .unwrap();
        patient.id
    }

    fn ward() -> Ward {
        let conn = open_memory_database().unwrap();
        let op = Viewer {
            id: Uuid::new_v4(),
            role: Role::Operator,
            name: "Ops".into(),
        };
        let doc = create_doctor(&conn, &op, &doctor_input("Dr. Sari", "sari@rs.test"), 5).unwrap();
        Ward {
            conn,
            op,
            doctor: Viewer {
                id: doc.id,
                role: Role::Doctor,
                name: doc.name,
            },
        }
    }

    fn taken(status: RecordStatus) -> RecordStatusUpdate {
        RecordStatusUpdate {
            status,
            notes: " felt dizzy ".into(),
            side_effects_reported: vec!["nausea".into(), " ".into()],
        }
    }

    #[test]
    fn taken_and_late_stamp_actual_time() {
        let w = ward();
        add_patient(&w, "Ani", w.doctor.id, "Metformin");
        let list = list_records(&w.conn, &w.op, &RecordFilter::default(), 500).unwrap();
        let now = Utc::now();

        for (record, status) in list
            .records
            .iter()
            .zip([RecordStatus::Taken, RecordStatus::Late])
        {
            let updated = update_status(&w.conn, &w.op, &record.id, &taken(status), now).unwrap();
            assert_eq!(updated.actual_time, Some(now));
            let stored = db::get_record(&w.conn, &record.id).unwrap().unwrap();
            assert!(stored.actual_time.is_some());
            assert_eq!(stored.status, status);
            assert_eq!(stored.notes, "felt dizzy");
            assert_eq!(stored.side_effects_reported, vec!["nausea"]);
            assert_eq!(stored.recorded_by, w.op.id.to_string());
        }
    }

    #[test]
    fn missed_keeps_previous_actual_time() {
        let w = ward();
        add_patient(&w, "Ani", w.doctor.id, "Metformin");
        let id = list_records(&w.conn, &w.op, &RecordFilter::default(), 500)
            .unwrap()
            .records[0]
            .id;

        let untouched = update_status(&w.conn, &w.op, &id, &taken(RecordStatus::Missed), Utc::now())
            .unwrap();
        assert!(untouched.actual_time.is_none());

        let first = Utc::now();
        update_status(&w.conn, &w.op, &id, &taken(RecordStatus::Taken), first).unwrap();
        let later = first + Duration::minutes(5);
        let reverted =
            update_status(&w.conn, &w.op, &id, &taken(RecordStatus::Pending), later).unwrap();
        assert_eq!(reverted.actual_time, Some(first));
        assert_eq!(reverted.status, RecordStatus::Pending);
    }

    #[test]
    fn status_edits_are_operator_only() {
        let w = ward();
        add_patient(&w, "Ani", w.doctor.id, "Metformin");
        let id = list_records(&w.conn, &w.op, &RecordFilter::default(), 500)
            .unwrap()
            .records[0]
            .id;
        assert!(matches!(
            update_status(&w.conn, &w.doctor, &id, &taken(RecordStatus::Taken), Utc::now()),
            Err(RecordError::Access(AccessError::Forbidden(_)))
        ));
    }

    #[test]
    fn doctor_sees_only_own_patients_records() {
        let w = ward();
        let other = create_doctor(&w.conn, &w.op, &doctor_input("Dr. Lain", "lain@rs.test"), 5)
            .unwrap();
        let mine = add_patient(&w, "Ani", w.doctor.id, "Metformin");
        let theirs = add_patient(&w, "Bayu", other.id, "Amlodipine");

        let list = list_records(&w.conn, &w.doctor, &RecordFilter::default(), 500).unwrap();
        assert_eq!(list.records.len(), 4);
        assert!(list.records.iter().all(|r| r.patient_id == mine));

        let foreign = list_records(&w.conn, &w.op, &RecordFilter::default(), 500)
            .unwrap()
            .records
            .into_iter()
            .find(|r| r.patient_id == theirs)
            .unwrap();
        assert!(matches!(
            get_record(&w.conn, &w.doctor, &foreign.id),
            Err(RecordError::Access(AccessError::NotFound { .. }))
        ));
    }

    #[test]
    fn filters_narrow_list_but_not_summary() {
        let w = ward();
        add_patient(&w, "Ani", w.doctor.id, "Metformin");
        add_patient(&w, "Bayu", w.doctor.id, "Amlodipine");
        let all = list_records(&w.conn, &w.op, &RecordFilter::default(), 500).unwrap();
        let target = all
            .records
            .iter()
            .find(|r| r.medication_name == "Amlodipine")
            .unwrap()
            .clone();
        update_status(&w.conn, &w.op, &target.id, &taken(RecordStatus::Taken), Utc::now())
            .unwrap();

        let filter = RecordFilter {
            search: Some("amlo".into()),
            status: Some(RecordStatus::Taken),
            patient_id: None,
            date: Some(target.scheduled_date),
        };
        let list = list_records(&w.conn, &w.op, &filter, 500).unwrap();
        assert_eq!(list.records.len(), 1);
        assert_eq!(list.records[0].id, target.id);
        assert_eq!(list.summary.total, 8);
        assert_eq!(list.summary.taken, 1);
        assert_eq!(list.summary.pending, 7);
        assert_eq!(list.summary.compliance_rate, 13);
    }

    #[test]
    fn patient_role_is_refused() {
        let w = ward();
        let patient = Viewer {
            id: Uuid::new_v4(),
            role: Role::Patient,
            name: "P".into(),
        };
        assert!(matches!(
            list_records(&w.conn, &patient, &RecordFilter::default(), 500),
            Err(RecordError::Access(AccessError::Forbidden(_)))
        ));
    }
}
