use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Role {
    Operator => "operator",
    Doctor => "doctor",
    Patient => "patient",
});

str_enum!(Gender {
    Male => "male",
    Female => "female",
});

str_enum!(RecordStatus {
    Pending => "pending",
    Taken => "taken",
    Missed => "missed",
    Late => "late",
});

str_enum!(ChangeAction {
    Create => "create",
    Update => "update",
    Delete => "delete",
});

str_enum!(Collection {
    Users => "users",
    Doctors => "doctors",
    Patients => "patients",
    MedicationSchedules => "medication_schedules",
    ConsumptionRecords => "consumption_records",
});

impl RecordStatus {
    /// Taken and late doses carry the moment the status was recorded.
    pub fn stamps_actual_time(&self) -> bool {
        matches!(self, Self::Taken | Self::Late)
    }
}
