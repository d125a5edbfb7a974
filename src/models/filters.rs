use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use super::enums::{Gender, RecordStatus};

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorFilter {
    pub search: Option<String>,
    pub specialization: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientFilter {
    pub search: Option<String>,
    pub gender: Option<Gender>,
    pub doctor_id: Option<Uuid>,
}

/// `status` is "active" or "inactive"; anything else is ignored.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleFilter {
    pub search: Option<String>,
    pub patient_id: Option<Uuid>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFilter {
    pub search: Option<String>,
    pub status: Option<RecordStatus>,
    pub patient_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
}

/// Case-insensitive containment used by every list search box.
pub(crate) fn matches_search(needle: Option<&str>, haystacks: &[&str]) -> bool {
    match needle.map(str::trim) {
        None | Some("") => true,
        Some(term) => {
            let term = term.to_lowercase();
            haystacks.iter().any(|h| h.to_lowercase().contains(&term))
        }
    }
}
