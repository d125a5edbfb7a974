//! Medication schedule endpoints.
//!
//! Creating a schedule expands its consumption records and fires the
//! outbound webhook. Updates and deletes never notify.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Serialize;

use super::{parse_id, Deleted};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthUser};
use crate::models::enums::{ChangeAction, Collection};
use crate::models::{ScheduleFilter, ScheduleInput, ScheduleView};
use crate::schedules::{self, GenerationReport, ScheduleSaved, ScheduleStats};
use crate::scoping::Viewer;

#[derive(Serialize)]
pub struct SchedulesResponse {
    pub schedules: Vec<ScheduleView>,
    pub stats: ScheduleStats,
}

#[derive(Serialize)]
pub struct SavedResponse {
    pub schedule: ScheduleView,
    pub generation: Option<GenerationReport>,
}

impl From<ScheduleSaved> for SavedResponse {
    fn from(saved: ScheduleSaved) -> Self {
        Self {
            schedule: saved.schedule.into(),
            generation: saved.generation,
        }
    }
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    Query(filter): Query<ScheduleFilter>,
) -> Result<Json<SchedulesResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let list = schedules::list_schedules(&conn, &Viewer::from(&caller.user), &filter)?;
    Ok(Json(SchedulesResponse {
        schedules: list.schedules.into_iter().map(ScheduleView::from).collect(),
        stats: list.stats,
    }))
}

pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ScheduleView>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let schedule = schedules::get_schedule(&conn, &Viewer::from(&caller.user), &id)?;
    Ok(Json(schedule.into()))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    Json(input): Json<ScheduleInput>,
) -> Result<Json<SavedResponse>, ApiError> {
    let viewer = Viewer::from(&caller.user);
    let saved = {
        let conn = ctx.core.open_db()?;
        schedules::create_schedule(&conn, &viewer, &input)?
    };

    ctx.core
        .publish(Collection::MedicationSchedules, ChangeAction::Create, saved.schedule.id);
    if saved.generation.is_some() {
        ctx.core.publish(
            Collection::ConsumptionRecords,
            ChangeAction::Create,
            saved.schedule.id,
        );
    }

    let notifier = ctx.core.notifier();
    if notifier.is_enabled() {
        match serde_json::to_value(&saved.schedule) {
            Ok(data) => {
                let payload = notifier.payload(
                    ChangeAction::Create,
                    Collection::MedicationSchedules,
                    saved.schedule.id.to_string(),
                    Some(data),
                    None,
                    Some(&viewer.actor()),
                );
                notifier.notify(payload).await;
            }
            Err(e) => tracing::warn!(error = %e, "Could not serialize schedule for webhook"),
        }
    }

    Ok(Json(saved.into()))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(input): Json<ScheduleInput>,
) -> Result<Json<SavedResponse>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let saved = schedules::update_schedule(&conn, &Viewer::from(&caller.user), &id, &input)?;

    ctx.core
        .publish(Collection::MedicationSchedules, ChangeAction::Update, id);
    ctx.core
        .publish(Collection::ConsumptionRecords, ChangeAction::Update, id);
    Ok(Json(saved.into()))
}

pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Deleted>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let removed = schedules::delete_schedule(&conn, &Viewer::from(&caller.user), &id)?;

    if removed > 0 {
        ctx.core
            .publish(Collection::ConsumptionRecords, ChangeAction::Delete, id);
    }
    ctx.core
        .publish(Collection::MedicationSchedules, ChangeAction::Delete, id);
    Ok(Json(Deleted::new(id)))
}
