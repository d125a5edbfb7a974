//! Audit logging middleware.
//!
//! Logs every authenticated API request with user id, role, method, path,
//! and response status. Runs innermost, after auth has injected `AuthUser`.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::AuthUser;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let caller = req
        .extensions()
        .get::<AuthUser>()
        .map(|a| (a.user.id, a.user.role));

    let response = next.run(req).await;

    if let Some((user_id, role)) = caller {
        tracing::info!(
            user_id = %user_id,
            role = %role,
            method = %method,
            path,
            status = response.status().as_u16(),
            "API access"
        );
    }
    response
}
