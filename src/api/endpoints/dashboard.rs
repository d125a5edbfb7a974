//! `GET /api/dashboard`: stats, compliance trends and recent activity.

use axum::extract::State;
use axum::{Extension, Json};
use chrono::Local;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthUser};
use crate::compliance::{self, Dashboard};
use crate::scoping::Viewer;

pub async fn show(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<Dashboard>, ApiError> {
    let conn = ctx.core.open_db()?;
    let dashboard = compliance::build_dashboard(
        &conn,
        &Viewer::from(&caller.user),
        Local::now().date_naive(),
        ctx.core.config.dashboard_limit,
    )?;
    Ok(Json(dashboard))
}
