//! Consumption record endpoints.
//!
//! - `GET /api/records`: filtered list plus summary
//! - `GET /api/records/:id`
//! - `PUT /api/records/:id`: status edit, operator only
//! - `POST /api/records/generate`: fill the coming week

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::{Local, Utc};
use uuid::Uuid;

use super::parse_id;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthUser};
use crate::models::enums::{ChangeAction, Collection};
use crate::models::{ConsumptionRecord, RecordFilter, RecordStatusUpdate};
use crate::records::{self, RecordList};
use crate::schedules::{self, UpcomingReport};
use crate::scoping::Viewer;

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    Query(filter): Query<RecordFilter>,
) -> Result<Json<RecordList>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(records::list_records(
        &conn,
        &Viewer::from(&caller.user),
        &filter,
        ctx.core.config.records_limit,
    )?))
}

pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ConsumptionRecord>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(records::get_record(
        &conn,
        &Viewer::from(&caller.user),
        &id,
    )?))
}

pub async fn update_status(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(update): Json<RecordStatusUpdate>,
) -> Result<Json<ConsumptionRecord>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let record = records::update_status(
        &conn,
        &Viewer::from(&caller.user),
        &id,
        &update,
        Utc::now(),
    )?;
    ctx.core
        .publish(Collection::ConsumptionRecords, ChangeAction::Update, record.id);
    Ok(Json(record))
}

pub async fn generate(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<UpcomingReport>, ApiError> {
    let conn = ctx.core.open_db()?;
    let today = Local::now().date_naive();
    let report = schedules::generate_upcoming(&conn, &Viewer::from(&caller.user), today)?;
    if report.records_created > 0 {
        // Bulk inserts carry the nil id.
        ctx.core
            .publish(Collection::ConsumptionRecords, ChangeAction::Create, Uuid::nil());
    }
    Ok(Json(report))
}
