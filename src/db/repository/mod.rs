//! Repository layer: collection-scoped database operations.
//!
//! One sub-module per collection; all public functions are re-exported here.

mod consumption;
mod doctor;
mod patient;
mod schedule;
mod user;

use uuid::Uuid;

use super::DatabaseError;

pub use consumption::*;
pub use doctor::*;
pub use patient::*;
pub use schedule::*;
pub use user::*;

pub(crate) fn parse_id(raw: &str) -> Result<Uuid, DatabaseError> {
    Ok(Uuid::parse_str(raw)?)
}

pub(crate) fn parse_enum<T>(raw: &str) -> Result<T, DatabaseError>
where
    T: std::str::FromStr<Err = DatabaseError>,
{
    raw.parse()
}

pub(crate) fn decode_list(raw: &str) -> Result<Vec<String>, DatabaseError> {
    Ok(serde_json::from_str(raw)?)
}

pub(crate) fn encode_list(items: &[String]) -> Result<String, DatabaseError> {
    Ok(serde_json::to_string(items)?)
}

/// `NotFound` when an UPDATE/DELETE touched no row.
pub(crate) fn expect_changed(
    changed: usize,
    entity_type: &str,
    id: &Uuid,
) -> Result<(), DatabaseError> {
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        });
    }
    Ok(())
}
