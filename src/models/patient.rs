use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Gender;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub email: String,
    pub phone: String,
    pub condition: String,
    pub doctor_id: Uuid,
    pub allergies: Vec<String>,
    pub emergency_contact: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Allergies arrive either as a list or as one comma-separated string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AllergiesInput {
    List(Vec<String>),
    Text(String),
}

impl Default for AllergiesInput {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl AllergiesInput {
    /// Trimmed, non-empty entries.
    pub fn normalize(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            Self::List(items) => items.iter().map(String::as_str).collect(),
            Self::Text(text) => text.split(',').collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientInput {
    pub name: String,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub age: u32,
    pub gender: Gender,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub condition: String,
    pub doctor_id: Uuid,
    #[serde(default)]
    pub allergies: AllergiesInput,
    #[serde(default)]
    pub emergency_contact: String,
    #[serde(default)]
    pub address: String,
}
