//! API endpoint handlers, one module per resource.
//!
//! Handlers open a connection, call into the domain modules, and drop the
//! connection before any `.await`.

pub mod auth;
pub mod dashboard;
pub mod doctors;
pub mod health;
pub mod patients;
pub mod records;
pub mod schedules;

use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;

/// Body returned by every delete endpoint.
#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: Uuid,
    pub deleted: bool,
}

impl Deleted {
    pub fn new(id: Uuid) -> Self {
        Self { id, deleted: true }
    }
}

/// Parse a path id, rejecting malformed values with 400.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid ID format: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_rejects_garbage() {
        assert!(matches!(parse_id("abc"), Err(ApiError::BadRequest(_))));
        assert!(parse_id(&Uuid::new_v4().to_string()).is_ok());
    }
}
