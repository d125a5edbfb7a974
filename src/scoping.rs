//! Role-based visibility and write permissions.
//!
//! Visibility rules, checked server-side on every read:
//! - operator: every patient, schedule and record
//! - doctor: only patients whose `doctor_id` is theirs, and the schedules and
//!   records of those patients
//! - patient: nothing
//!
//! Write rules:
//! - doctors and patients are operator-managed
//! - schedules: operator on any patient, doctor on their own patients
//! - record status edits: operator only; generating upcoming records:
//!   operator or doctor

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::enums::Role;
use crate::models::{ConsumptionRecord, MedicationSchedule, Patient, User};
use crate::notify::Actor;

/// The authenticated caller, as seen by the domain layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewer {
    pub id: Uuid,
    pub role: Role,
    pub name: String,
}

impl From<&User> for Viewer {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
            name: user.name.clone(),
        }
    }
}

impl Viewer {
    pub fn is_operator(&self) -> bool {
        self.role == Role::Operator
    }

    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id.to_string(),
            role: self.role,
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// The set of patients a viewer may see.
#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    All,
    Patients(Vec<Uuid>),
}

impl Scope {
    pub fn allows(&self, patient_id: &Uuid) -> bool {
        match self {
            Scope::All => true,
            Scope::Patients(ids) => ids.contains(patient_id),
        }
    }
}

/// Resolve what the viewer may read. Patients are refused outright.
pub fn resolve_scope(conn: &Connection, viewer: &Viewer) -> Result<Scope, AccessError> {
    match viewer.role {
        Role::Operator => Ok(Scope::All),
        Role::Doctor => {
            let ids = db::patient_ids_for_doctor(conn, &viewer.id)?;
            tracing::debug!(doctor_id = %viewer.id, patients = ids.len(), "Doctor scope resolved");
            Ok(Scope::Patients(ids))
        }
        Role::Patient => Err(AccessError::Forbidden("patients have no data access".into())),
    }
}

pub fn require_operator(viewer: &Viewer) -> Result<(), AccessError> {
    if viewer.is_operator() {
        Ok(())
    } else {
        Err(AccessError::Forbidden("operator role required".into()))
    }
}

/// Operator or doctor.
pub fn require_staff(viewer: &Viewer) -> Result<(), AccessError> {
    match viewer.role {
        Role::Operator | Role::Doctor => Ok(()),
        Role::Patient => Err(AccessError::Forbidden("staff role required".into())),
    }
}

pub fn visible_patients(conn: &Connection, viewer: &Viewer) -> Result<Vec<Patient>, AccessError> {
    match viewer.role {
        Role::Operator => Ok(db::list_patients(conn, None)?),
        Role::Doctor => Ok(db::list_patients(conn, Some(&viewer.id))?),
        Role::Patient => Err(AccessError::Forbidden("patients have no data access".into())),
    }
}

pub fn visible_schedules(
    conn: &Connection,
    viewer: &Viewer,
) -> Result<Vec<MedicationSchedule>, AccessError> {
    let scope = resolve_scope(conn, viewer)?;
    let mut schedules = db::list_schedules(conn)?;
    schedules.retain(|s| scope.allows(&s.patient_id));
    Ok(schedules)
}

/// Newest records the viewer may see, at most `limit` before scoping.
pub fn visible_records(
    conn: &Connection,
    viewer: &Viewer,
    limit: u32,
) -> Result<Vec<ConsumptionRecord>, AccessError> {
    match resolve_scope(conn, viewer)? {
        Scope::All => Ok(db::list_records(conn, limit)?),
        Scope::Patients(ids) => Ok(db::list_records_for_patients(conn, &ids, limit)?),
    }
}

/// Load a patient the viewer may see. Out-of-scope patients read as missing.
pub fn patient_for_viewer(
    conn: &Connection,
    viewer: &Viewer,
    patient_id: &Uuid,
) -> Result<Patient, AccessError> {
    let scope = resolve_scope(conn, viewer)?;
    let not_found = || AccessError::NotFound {
        entity: "Patient",
        id: *patient_id,
    };
    let patient = db::get_patient(conn, patient_id)?.ok_or_else(not_found)?;
    if !scope.allows(&patient.id) {
        return Err(not_found());
    }
    Ok(patient)
}

pub fn schedule_for_viewer(
    conn: &Connection,
    viewer: &Viewer,
    schedule_id: &Uuid,
) -> Result<MedicationSchedule, AccessError> {
    let scope = resolve_scope(conn, viewer)?;
    let not_found = || AccessError::NotFound {
        entity: "Medication schedule",
        id: *schedule_id,
    };
    let schedule = db::get_schedule(conn, schedule_id)?.ok_or_else(not_found)?;
    if !scope.allows(&schedule.patient_id) {
        return Err(not_found());
    }
    Ok(schedule)
}

pub fn record_for_viewer(
    conn: &Connection,
    viewer: &Viewer,
    record_id: &Uuid,
) -> Result<ConsumptionRecord, AccessError> {
    let scope = resolve_scope(conn, viewer)?;
    let not_found = || AccessError::NotFound {
        entity: "Consumption record",
        id: *record_id,
    };
    let record = db::get_record(conn, record_id)?.ok_or_else(not_found)?;
    if !scope.allows(&record.patient_id) {
        return Err(not_found());
    }
    Ok(record)
}

/// Schedules may be written by operators, or by the patient's own doctor.
pub fn can_manage_schedules_for(viewer: &Viewer, patient: &Patient) -> bool {
    match viewer.role {
        Role::Operator => true,
        Role::Doctor => patient.doctor_id == viewer.id,
        Role::Patient => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::{Gender, RecordStatus};
    use crate::models::{Doctor, SYSTEM_RECORDER};

    fn viewer(role: Role) -> Viewer {
        Viewer {
            id: Uuid::new_v4(),
            role,
            name: "Someone".into(),
        }
    }

    fn seed_doctor(conn: &Connection) -> Viewer {
        let now = Utc::now();
        let v = viewer(Role::Doctor);
        db::insert_user(
            conn,
            &User {
                id: v.id,
                email: format!("{}@clinic.test", v.id),
                name: v.name.clone(),
                role: Role::Doctor,
                created_at: now,
                updated_at: now,
            },
            "hash",
        )
        .unwrap();
        db::insert_doctor(
            conn,
            &Doctor {
                id: v.id,
                name: v.name.clone(),
                email: format!("{}@clinic.test", v.id),
                specialization: String::new(),
                sip: String::new(),
                phone: String::new(),
                address: None,
                hospital: None,
                experience: 0,
                created_at: now,
                updated_at: now,
            },
        )
        .unwrap();
        v
    }

    fn seed_patient(conn: &Connection, doctor_id: Uuid) -> Patient {
        let now = Utc::now();
        let patient = Patient {
            id: Uuid::new_v4(),
            user_id: None,
            name: "Budi".into(),
            age: 40,
            gender: Gender::Male,
            email: String::new(),
            phone: String::new(),
            condition: String::new(),
            doctor_id,
            allergies: Vec::new(),
            emergency_contact: String::new(),
            address: String::new(),
            created_at: now,
            updated_at: now,
        };
        db::insert_patient(conn, &patient).unwrap();
        patient
    }

    fn seed_schedule_with_record(conn: &Connection, patient: &Patient) -> (Uuid, Uuid) {
        let now = Utc::now();
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let schedule = MedicationSchedule {
            id: Uuid::new_v4(),
            patient_id: patient.id,
            patient_name: patient.name.clone(),
            medication_name: "Metformin".into(),
            dosage: "500mg".into(),
            frequency: "daily".into(),
            times: vec!["08:00".into()],
            start_date: day,
            end_date: day,
            prescribed_by: patient.doctor_id,
            prescribed_by_name: String::new(),
            instructions: String::new(),
            notes: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db::insert_schedule(conn, &schedule).unwrap();
        let record = ConsumptionRecord {
            id: Uuid::new_v4(),
            patient_id: patient.id,
            patient_name: patient.name.clone(),
            medication_name: schedule.medication_name.clone(),
            schedule_id: schedule.id,
            scheduled_date: day,
            scheduled_time: "08:00".into(),
            scheduled_date_time: day.and_hms_opt(8, 0, 0).unwrap(),
            actual_time: None,
            dosage: schedule.dosage.clone(),
            status: RecordStatus::Pending,
            notes: String::new(),
            side_effects_reported: Vec::new(),
            recorded_by: SYSTEM_RECORDER.into(),
            created_at: now,
            updated_at: now,
        };
        db::insert_record(conn, &record).unwrap();
        (schedule.id, record.id)
    }

    #[test]
    fn operator_sees_everything() {
        let conn = open_memory_database().unwrap();
        let a = seed_doctor(&conn);
        let b = seed_doctor(&conn);
        let pa = seed_patient(&conn, a.id);
        let pb = seed_patient(&conn, b.id);
        seed_schedule_with_record(&conn, &pa);
        seed_schedule_with_record(&conn, &pb);

        let op = viewer(Role::Operator);
        assert_eq!(resolve_scope(&conn, &op).unwrap(), Scope::All);
        assert_eq!(visible_patients(&conn, &op).unwrap().len(), 2);
        assert_eq!(visible_schedules(&conn, &op).unwrap().len(), 2);
        assert_eq!(visible_records(&conn, &op, 500).unwrap().len(), 2);
    }

    #[test]
    fn doctor_never_sees_another_doctors_patient() {
        let conn = open_memory_database().unwrap();
        let a = seed_doctor(&conn);
        let b = seed_doctor(&conn);
        let pa = seed_patient(&conn, a.id);
        let pb = seed_patient(&conn, b.id);
        let (_, record_b) = seed_schedule_with_record(&conn, &pb);
        seed_schedule_with_record(&conn, &pa);

        let patients = visible_patients(&conn, &a).unwrap();
        assert!(patients.iter().all(|p| p.doctor_id == a.id));
        assert_eq!(patients.len(), 1);

        let schedules = visible_schedules(&conn, &a).unwrap();
        assert!(schedules.iter().all(|s| s.patient_id == pa.id));
        let records = visible_records(&conn, &a, 500).unwrap();
        assert!(records.iter().all(|r| r.patient_id == pa.id));

        assert!(matches!(
            patient_for_viewer(&conn, &a, &pb.id),
            Err(AccessError::NotFound { .. })
        ));
        assert!(matches!(
            record_for_viewer(&conn, &a, &record_b),
            Err(AccessError::NotFound { .. })
        ));
    }

    #[test]
    fn doctor_without_patients_sees_no_records() {
        let conn = open_memory_database().unwrap();
        let a = seed_doctor(&conn);
        let b = seed_doctor(&conn);
        let pb = seed_patient(&conn, b.id);
        seed_schedule_with_record(&conn, &pb);

        assert!(visible_records(&conn, &a, 500).unwrap().is_empty());
        assert!(visible_schedules(&conn, &a).unwrap().is_empty());
    }

    #[test]
    fn patient_role_is_forbidden() {
        let conn = open_memory_database().unwrap();
        let p = viewer(Role::Patient);
        assert!(matches!(resolve_scope(&conn, &p), Err(AccessError::Forbidden(_))));
        assert!(matches!(visible_patients(&conn, &p), Err(AccessError::Forbidden(_))));
        assert!(require_staff(&p).is_err());
    }

    #[test]
    fn write_rules() {
        let conn = open_memory_database().unwrap();
        let a = seed_doctor(&conn);
        let b = seed_doctor(&conn);
        let pa = seed_patient(&conn, a.id);

        assert!(can_manage_schedules_for(&viewer(Role::Operator), &pa));
        assert!(can_manage_schedules_for(&a, &pa));
        assert!(!can_manage_schedules_for(&b, &pa));
        assert!(require_operator(&a).is_err());
        assert!(require_operator(&viewer(Role::Operator)).is_ok());
        assert!(require_staff(&a).is_ok());
    }
}
