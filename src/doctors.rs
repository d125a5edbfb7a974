//! Doctor management. Each doctor is a profile row plus a `users` login
//! sharing the same id; both are created, renamed and removed together.

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::auth::{self, AuthError};
use crate::db::{self, DatabaseError};
use crate::models::enums::Role;
use crate::models::{matches_search, Doctor, DoctorFilter, DoctorInput};
use crate::scoping::{require_operator, require_staff, AccessError, Viewer};

#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("Invalid doctor: {0}")]
    Validation(String),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

fn validate(input: &DoctorInput) -> Result<(), DoctorError> {
    if input.name.trim().is_empty() {
        return Err(DoctorError::Validation("name is required".into()));
    }
    if !input.email.contains('@') {
        return Err(DoctorError::Validation("a valid email is required".into()));
    }
    Ok(())
}

/// Doctors newest first, narrowed by search text and specialization.
pub fn list_doctors(
    conn: &Connection,
    viewer: &Viewer,
    filter: &DoctorFilter,
) -> Result<Vec<Doctor>, DoctorError> {
    require_staff(viewer)?;
    let mut doctors = db::list_doctors(conn)?;
    doctors.retain(|d| {
        matches_search(filter.search.as_deref(), &[&d.name, &d.email, &d.sip])
            && filter
                .specialization
                .as_deref()
                .map_or(true, |s| s.is_empty() || d.specialization.eq_ignore_ascii_case(s))
    });
    Ok(doctors)
}

pub fn get_doctor(conn: &Connection, viewer: &Viewer, id: &Uuid) -> Result<Doctor, DoctorError> {
    require_staff(viewer)?;
    db::get_doctor(conn, id)?.ok_or_else(|| {
        DoctorError::Access(AccessError::NotFound {
            entity: "Doctor",
            id: *id,
        })
    })
}

pub fn create_doctor(
    conn: &Connection,
    viewer: &Viewer,
    input: &DoctorInput,
    password_iterations: u32,
) -> Result<Doctor, DoctorError> {
    require_operator(viewer)?;
    validate(input)?;
    let password = input
        .password
        .as_deref()
        .ok_or_else(|| DoctorError::Validation("password is required".into()))?;

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    let user = auth::register_user(
        &tx,
        None,
        &input.email,
        &input.name,
        Role::Doctor,
        password,
        password_iterations,
    )?;
    let doctor = Doctor {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        specialization: input.specialization.trim().to_string(),
        sip: input.sip.trim().to_string(),
        phone: input.phone.trim().to_string(),
        address: input.address.clone().filter(|a| !a.trim().is_empty()),
        hospital: input.hospital.clone().filter(|h| !h.trim().is_empty()),
        experience: input.experience.unwrap_or(0),
        created_at: user.created_at,
        updated_at: user.updated_at,
    };
    db::insert_doctor(&tx, &doctor)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(doctor_id = %doctor.id, "Doctor created");
    Ok(doctor)
}

/// Overwrite a doctor's profile and mirror name/email onto the login.
/// The password is never changed here.
pub fn update_doctor(
    conn: &Connection,
    viewer: &Viewer,
    id: &Uuid,
    input: &DoctorInput,
) -> Result<Doctor, DoctorError> {
    require_operator(viewer)?;
    validate(input)?;
    let existing = get_doctor(conn, viewer, id)?;

    let now = Utc::now();
    let doctor = Doctor {
        name: input.name.trim().to_string(),
        email: input.email.trim().to_string(),
        specialization: input.specialization.trim().to_string(),
        sip: input.sip.trim().to_string(),
        phone: input.phone.trim().to_string(),
        address: input.address.clone().filter(|a| !a.trim().is_empty()),
        hospital: input.hospital.clone().filter(|h| !h.trim().is_empty()),
        experience: input.experience.unwrap_or(existing.experience),
        updated_at: now,
        ..existing
    };

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    db::update_doctor(&tx, &doctor)?;
    match db::update_user_profile(&tx, id, &doctor.name, &doctor.email, now) {
        Ok(()) | Err(DatabaseError::NotFound { .. }) => {}
        Err(e) => return Err(e.into()),
    }
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(doctor_id = %doctor.id, "Doctor updated");
    Ok(doctor)
}

/// Remove the profile and its login. Patients keep their dangling
/// `doctor_id` until reassigned.
pub fn delete_doctor(conn: &Connection, viewer: &Viewer, id: &Uuid) -> Result<(), DoctorError> {
    require_operator(viewer)?;

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    match db::delete_doctor(&tx, id) {
        Ok(()) => {}
        Err(DatabaseError::NotFound { .. }) => {
            return Err(AccessError::NotFound {
                entity: "Doctor",
                id: *id,
            }
            .into())
        }
        Err(e) => return Err(e.into()),
    }
    match db::delete_user(&tx, id) {
        Ok(()) | Err(DatabaseError::NotFound { .. }) => {}
        Err(e) => return Err(e.into()),
    }
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(doctor_id = %id, "Doctor deleted");
    Ok(())
}
