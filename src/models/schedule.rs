use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A prescribed regimen: one medication for one patient over a date range,
/// taken at fixed times of day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationSchedule {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub medication_name: String,
    pub dosage: String,
    pub frequency: String,
    /// "HH:MM" strings, in the order they were entered.
    pub times: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub prescribed_by: Uuid,
    pub prescribed_by_name: String,
    pub instructions: String,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MedicationSchedule {
    /// Days in the inclusive range; zero for an inverted range.
    pub fn total_days(&self) -> u32 {
        let days = (self.end_date - self.start_date).num_days() + 1;
        u32::try_from(days.max(0)).unwrap_or(0)
    }

    /// Doses the schedule should produce over its whole range.
    pub fn total_doses(&self) -> u32 {
        self.total_days() * self.times.len() as u32
    }

    /// Active and covering `day`.
    pub fn is_current_on(&self, day: NaiveDate) -> bool {
        self.is_active && self.start_date <= day && self.end_date >= day
    }
}

/// Outbound shape of a schedule: the stored fields plus derived totals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleView {
    #[serde(flatten)]
    pub schedule: MedicationSchedule,
    pub total_days: u32,
    pub total_doses: u32,
}

impl From<MedicationSchedule> for ScheduleView {
    fn from(schedule: MedicationSchedule) -> Self {
        Self {
            total_days: schedule.total_days(),
            total_doses: schedule.total_doses(),
            schedule,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleInput {
    pub patient_id: Uuid,
    pub medication_name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub times: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}
