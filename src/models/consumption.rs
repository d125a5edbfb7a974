use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::RecordStatus;

/// Marker stored in `recorded_by` for generated records.
pub const SYSTEM_RECORDER: &str = "system";

/// One expected dose derived from a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub medication_name: String,
    pub schedule_id: Uuid,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: String,
    pub scheduled_date_time: NaiveDateTime,
    pub actual_time: Option<DateTime<Utc>>,
    pub dosage: String,
    pub status: RecordStatus,
    pub notes: String,
    pub side_effects_reported: Vec<String>,
    pub recorded_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Manual status edit.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordStatusUpdate {
    pub status: RecordStatus,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub side_effects_reported: Vec<String>,
}
