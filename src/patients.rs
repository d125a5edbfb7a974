//! Patient management. Operators write; doctors read their own patients.

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::{matches_search, Patient, PatientFilter, PatientInput};
use crate::scoping::{self, require_operator, AccessError, Viewer};

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error("Invalid patient: {0}")]
    Validation(String),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

fn validate(conn: &Connection, input: &PatientInput) -> Result<(), PatientError> {
    if input.name.trim().is_empty() {
        return Err(PatientError::Validation("name is required".into()));
    }
    if !db::doctor_exists(conn, &input.doctor_id)? {
        return Err(PatientError::Validation(format!(
            "unknown doctor: {}",
            input.doctor_id
        )));
    }
    Ok(())
}

pub fn list_patients(
    conn: &Connection,
    viewer: &Viewer,
    filter: &PatientFilter,
) -> Result<Vec<Patient>, PatientError> {
    let mut patients = scoping::visible_patients(conn, viewer)?;
    patients.retain(|p| {
        matches_search(filter.search.as_deref(), &[&p.name, &p.email, &p.condition])
            && filter.gender.map_or(true, |g| p.gender == g)
            && filter.doctor_id.map_or(true, |d| p.doctor_id == d)
    });
    Ok(patients)
}

pub fn get_patient(conn: &Connection, viewer: &Viewer, id: &Uuid) -> Result<Patient, PatientError> {
    Ok(scoping::patient_for_viewer(conn, viewer, id)?)
}

pub fn create_patient(
    conn: &Connection,
    viewer: &Viewer,
    input: &PatientInput,
) -> Result<Patient, PatientError> {
    require_operator(viewer)?;
    validate(conn, input)?;

    let now = Utc::now();
    let patient = Patient {
        id: Uuid::new_v4(),
        user_id: input.user_id,
        name: input.name.trim().to_string(),
        age: input.age,
        gender: input.gender,
        email: input.email.trim().to_string(),
        phone: input.phone.trim().to_string(),
        condition: input.condition.trim().to_string(),
        doctor_id: input.doctor_id,
        allergies: input.allergies.normalize(),
        emergency_contact: input.emergency_contact.trim().to_string(),
        address: input.address.trim().to_string(),
        created_at: now,
        updated_at: now,
    };
    db::insert_patient(conn, &patient)?;
    tracing::info!(patient_id = %patient.id, doctor_id = %patient.doctor_id, "Patient created");
    Ok(patient)
}

/// Overwrites every field. Existing schedules keep their denormalized
/// patient name.
pub fn update_patient(
    conn: &Connection,
    viewer: &Viewer,
    id: &Uuid,
    input: &PatientInput,
) -> Result<Patient, PatientError> {
    require_operator(viewer)?;
    validate(conn, input)?;
    let existing = get_patient(conn, viewer, id)?;

    let patient = Patient {
        user_id: input.user_id,
        name: input.name.trim().to_string(),
        age: input.age,
        gender: input.gender,
        email: input.email.trim().to_string(),
        phone: input.phone.trim().to_string(),
        condition: input.condition.trim().to_string(),
        doctor_id: input.doctor_id,
        allergies: input.allergies.normalize(),
        emergency_contact: input.emergency_contact.trim().to_string(),
        address: input.address.trim().to_string(),
        updated_at: Utc::now(),
        ..existing
    };
    db::update_patient(conn, &patient)?;
    tracing::info!(patient_id = %patient.id, "Patient updated");
    Ok(patient)
}

pub fn delete_patient(conn: &Connection, viewer: &Viewer, id: &Uuid) -> Result<(), PatientError> {
    require_operator(viewer)?;
    match db::delete_patient(conn, id) {
        Ok(()) => {
            tracing::info!(patient_id = %id, "Patient deleted");
            Ok(())
        }
        Err(DatabaseError::NotFound { .. }) => Err(AccessError::NotFound {
            entity: "Patient",
            id: *id,
        }
        .into()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::doctors::create_doctor;
    use crate::models::enums::{Gender, Role};
    use crate::models::{AllergiesInput, DoctorInput};

    fn operator() -> Viewer {
        Viewer {
            id: Uuid::new_v4(),
            role: Role::Operator,
            name: "Ops".into(),
        }
    }

    fn new_doctor(conn: &Connection, email: &str) -> Viewer {
        let doctor = create_doctor(
            conn,
            &operator(),
            &DoctorInput {
                name: "Dr. Test".into(),
                email: email.into(),
                password: Some("pw".into()),
                specialization: String::new(),
                sip: String::new(),
                phone: String::new(),
                address: None,
                hospital: None,
                experience: None,
            },
            5,
        )
        .unwrap();
        Viewer {
            id: doctor.id,
            role: Role::Doctor,
            name: doctor.name,
        }
    }

    fn input(name: &str, doctor_id: Uuid) -> PatientInput {
        PatientInput {
            name: name.into(),
            user_id: None,
            age: 61,
            gender: Gender::Female,
            email: "pasien@mail.test".into(),
            phone: String::new(),
            condition: "Diabetes type 2".into(),
            doctor_id,
            allergies: AllergiesInput::Text("penicillin, sulfa".into()),
            emergency_contact: String::new(),
            address: String::new(),
        }
    }

    #[test]
    fn create_normalizes_allergies() {
        let conn = open_memory_database().unwrap();
        let doc = new_doctor(&conn, "a@rs.test");
        let patient = create_patient(&conn, &operator(), &input("Siti", doc.id)).unwrap();
        assert_eq!(patient.allergies, vec!["penicillin", "sulfa"]);
    }

    #[test]
    fn unknown_doctor_rejected() {
        let conn = open_memory_database().unwrap();
        assert!(matches!(
            create_patient(&conn, &operator(), &input("Siti", Uuid::new_v4())),
            Err(PatientError::Validation(_))
        ));
    }

    #[test]
    fn doctors_read_only_their_patients() {
        let conn = open_memory_database().unwrap();
        let op = operator();
        let a = new_doctor(&conn, "a@rs.test");
        let b = new_doctor(&conn, "b@rs.test");
        create_patient(&conn, &op, &input("Siti", a.id)).unwrap();
        let other = create_patient(&conn, &op, &input("Rina", b.id)).unwrap();

        let mine = list_patients(&conn, &a, &PatientFilter::default()).unwrap();
        assert_eq!(mine.len(), 1);
        assert!(mine.iter().all(|p| p.doctor_id == a.id));

        assert!(matches!(
            get_patient(&conn, &a, &other.id),
            Err(PatientError::Access(AccessError::NotFound { .. }))
        ));
        assert!(matches!(
            create_patient(&conn, &a, &input("Nope", a.id)),
            Err(PatientError::Access(AccessError::Forbidden(_)))
        ));
    }

    #[test]
    fn filters_combine() {
        let conn = open_memory_database().unwrap();
        let op = operator();
        let a = new_doctor(&conn, "a@rs.test");
        create_patient(&conn, &op, &input("Siti", a.id)).unwrap();
        let mut male = input("Budi", a.id);
        male.gender = Gender::Male;
        male.condition = "Hypertension".into();
        create_patient(&conn, &op, &male).unwrap();

        let filter = PatientFilter {
            search: Some("hyper".into()),
            gender: Some(Gender::Male),
            doctor_id: Some(a.id),
        };
        let found = list_patients(&conn, &op, &filter).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Budi");
    }

    #[test]
    fn update_and_delete() {
        let conn = open_memory_database().unwrap();
        let op = operator();
        let a = new_doctor(&conn, "a@rs.test");
        let patient = create_patient(&conn, &op, &input("Siti", a.id)).unwrap();

        let mut edit = input("Siti Aminah", a.id);
        edit.allergies = AllergiesInput::List(vec![]);
        let updated = update_patient(&conn, &op, &patient.id, &edit).unwrap();
        assert_eq!(updated.name, "Siti Aminah");
        assert!(updated.allergies.is_empty());
        assert_eq!(updated.created_at, patient.created_at);

        delete_patient(&conn, &op, &patient.id).unwrap();
        assert!(matches!(
            delete_patient(&conn, &op, &patient.id),
            Err(PatientError::Access(AccessError::NotFound { .. }))
        ));
    }
}
