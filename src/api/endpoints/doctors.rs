//! Doctor endpoints.
//!
//! - `GET /api/doctors`: list with `search` and `specialization` filters
//! - `GET /api/doctors/:id`
//! - `POST /api/doctors`, `PUT /api/doctors/:id`, `DELETE /api/doctors/:id`:
//!   operator only; each write also touches the paired login

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Serialize;

use super::{parse_id, Deleted};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthUser};
use crate::auth;
use crate::doctors;
use crate::models::enums::{ChangeAction, Collection};
use crate::models::{Doctor, DoctorFilter, DoctorInput};
use crate::scoping::Viewer;

#[derive(Serialize)]
pub struct DoctorsResponse {
    pub doctors: Vec<Doctor>,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    Query(filter): Query<DoctorFilter>,
) -> Result<Json<DoctorsResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let doctors = doctors::list_doctors(&conn, &Viewer::from(&caller.user), &filter)?;
    Ok(Json(DoctorsResponse { doctors }))
}

pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Doctor>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(doctors::get_doctor(&conn, &Viewer::from(&caller.user), &id)?))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    Json(input): Json<DoctorInput>,
) -> Result<Json<Doctor>, ApiError> {
    let core = ctx.core.clone();
    let doctor = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let conn = core.open_db()?;
        Ok(doctors::create_doctor(
            &conn,
            &Viewer::from(&caller.user),
            &input,
            core.config.password_iterations,
        )?)
    })
    .await??;
    ctx.core.publish(Collection::Users, ChangeAction::Create, doctor.id);
    ctx.core.publish(Collection::Doctors, ChangeAction::Create, doctor.id);
    Ok(Json(doctor))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(input): Json<DoctorInput>,
) -> Result<Json<Doctor>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let doctor = doctors::update_doctor(&conn, &Viewer::from(&caller.user), &id, &input)?;
    ctx.core.publish(Collection::Doctors, ChangeAction::Update, doctor.id);
    Ok(Json(doctor))
}

pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Deleted>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    doctors::delete_doctor(&conn, &Viewer::from(&caller.user), &id)?;

    let ended = auth::end_sessions_for(&ctx.core, &id)?;
    if ended > 0 {
        tracing::info!(doctor_id = %id, ended, "Sessions ended for deleted doctor");
    }
    ctx.core.publish(Collection::Doctors, ChangeAction::Delete, id);
    ctx.core.publish(Collection::Users, ChangeAction::Delete, id);
    Ok(Json(Deleted::new(id)))
}
