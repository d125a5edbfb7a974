//! Patient endpoints. Doctors read their own patients; operators write.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Serialize;

use super::{parse_id, Deleted};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthUser};
use crate::models::enums::{ChangeAction, Collection};
use crate::models::{Patient, PatientFilter, PatientInput};
use crate::patients;
use crate::scoping::Viewer;

#[derive(Serialize)]
pub struct PatientsResponse {
    pub patients: Vec<Patient>,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    Query(filter): Query<PatientFilter>,
) -> Result<Json<PatientsResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let patients = patients::list_patients(&conn, &Viewer::from(&caller.user), &filter)?;
    Ok(Json(PatientsResponse { patients }))
}

pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Patient>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(patients::get_patient(&conn, &Viewer::from(&caller.user), &id)?))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    Json(input): Json<PatientInput>,
) -> Result<Json<Patient>, ApiError> {
    let conn = ctx.core.open_db()?;
    let patient = patients::create_patient(&conn, &Viewer::from(&caller.user), &input)?;
    ctx.core.publish(Collection::Patients, ChangeAction::Create, patient.id);
    Ok(Json(patient))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(input): Json<PatientInput>,
) -> Result<Json<Patient>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let patient = patients::update_patient(&conn, &Viewer::from(&caller.user), &id, &input)?;
    ctx.core.publish(Collection::Patients, ChangeAction::Update, patient.id);
    Ok(Json(patient))
}

pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Deleted>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    patients::delete_patient(&conn, &Viewer::from(&caller.user), &id)?;
    ctx.core.publish(Collection::Patients, ChangeAction::Delete, id);
    Ok(Json(Deleted::new(id)))
}
