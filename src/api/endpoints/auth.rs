//! Authentication endpoints.
//!
//! - `POST /api/auth/login`: unprotected, exchanges credentials for a token
//! - `POST /api/auth/logout`: ends the caller's session
//! - `GET /api/auth/me`: the caller's user record
//! - `POST /api/auth/ws-ticket`: one-time ticket for the change feed

use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthUser, WS_TICKET_TTL};
use crate::auth;
use crate::models::User;
use crate::scoping::{require_staff, Viewer};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

pub async fn login(
    State(ctx): State<ApiContext>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    // PBKDF2 verification is CPU-bound; keep it off the async workers.
    let core = ctx.core.clone();
    let outcome = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let conn = core.open_db()?;
        Ok(auth::login(&core, &conn, &request.email, &request.password)?)
    })
    .await??;
    Ok(Json(LoginResponse {
        token: outcome.token,
        user: outcome.user,
    }))
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<LogoutResponse>, ApiError> {
    let success = auth::logout(&ctx.core, &caller.token)?;
    Ok(Json(LogoutResponse { success }))
}

pub async fn me(Extension(caller): Extension<AuthUser>) -> Json<User> {
    Json(caller.user)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WsTicketResponse {
    pub ticket: String,
    pub expires_in: u64,
}

pub async fn ws_ticket(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<WsTicketResponse>, ApiError> {
    require_staff(&Viewer::from(&caller.user))?;
    let ticket = ctx
        .ws_tickets
        .lock()
        .map_err(|_| ApiError::Internal("ws ticket lock".into()))?
        .issue(caller.user);

    Ok(Json(WsTicketResponse {
        ticket,
        expires_in: WS_TICKET_TTL.as_secs(),
    }))
}
