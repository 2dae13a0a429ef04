use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

entity_id!(EmployeeId);
entity_id!(KeyId);
entity_id!(TransactionId);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Enums that travel as fixed external strings (database columns, JSON bodies).
macro_rules! wire_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(EmploymentCategory, "employment category", {
    Cao => "CAO",
    Mbv => "MBV",
});

wire_enum!(KeyType, "key type", {
    A => "A",
    B => "B",
    C => "C",
});

wire_enum!(KeyLength, "key length", {
    Short => "kort",
    Long => "lang",
});

wire_enum!(KeyStatus, "key status", {
    Available => "available",
    Issued => "issued",
});

wire_enum!(TransactionAction, "transaction action", {
    Issue => "issue",
    Return => "return",
});

/// Calendar-year difference between the start date and `today`.
pub fn years_of_service(start_date: Date, today: Date) -> i32 {
    today.year() - start_date.year()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub employee_number: String,
    #[serde(rename = "type")]
    pub category: EmploymentCategory,
    #[serde(with = "iso_date")]
    pub start_date: Date,
    pub years_of_service: i32,
}

impl Employee {
    pub fn with_years_as_of(mut self, today: Date) -> Self {
        self.years_of_service = years_of_service(self.start_date, today);
        self
    }
}

/// Who holds a key. `Issued` always carries the holder, so a key can never be
/// issued without an assignment or assigned while available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Custody {
    Available,
    Issued(EmployeeId),
}

impl Custody {
    pub fn from_parts(
        status: KeyStatus,
        assigned_to: Option<EmployeeId>,
    ) -> Result<Self, InconsistentCustody> {
        match (status, assigned_to) {
            (KeyStatus::Available, None) => Ok(Custody::Available),
            (KeyStatus::Issued, Some(holder)) => Ok(Custody::Issued(holder)),
            (status, assigned_to) => Err(InconsistentCustody {
                status,
                assigned_to,
            }),
        }
    }

    pub fn status(&self) -> KeyStatus {
        match self {
            Custody::Available => KeyStatus::Available,
            Custody::Issued(_) => KeyStatus::Issued,
        }
    }

    pub fn holder(&self) -> Option<EmployeeId> {
        match self {
            Custody::Available => None,
            Custody::Issued(holder) => Some(*holder),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("key status {status} does not match assignment {assigned_to:?}")]
pub struct InconsistentCustody {
    pub status: KeyStatus,
    pub assigned_to: Option<EmployeeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "KeyItemBody")]
pub struct KeyItem {
    pub id: KeyId,
    pub key_number: String,
    pub key_type: KeyType,
    pub length: KeyLength,
    pub custody: Custody,
    pub note: Option<String>,
}

impl KeyItem {
    pub fn status(&self) -> KeyStatus {
        self.custody.status()
    }

    pub fn assigned_to(&self) -> Option<EmployeeId> {
        self.custody.holder()
    }

    pub fn is_held_by(&self, employee_id: EmployeeId) -> bool {
        self.assigned_to() == Some(employee_id)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyItemBody {
    id: KeyId,
    key_number: String,
    #[serde(rename = "type")]
    key_type: KeyType,
    length: KeyLength,
    status: KeyStatus,
    assigned_to: Option<EmployeeId>,
    note: Option<String>,
}

impl From<KeyItem> for KeyItemBody {
    fn from(key: KeyItem) -> Self {
        Self {
            id: key.id,
            status: key.status(),
            assigned_to: key.assigned_to(),
            key_number: key.key_number,
            key_type: key.key_type,
            length: key.length,
            note: key.note,
        }
    }
}

/// One immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub employee_id: EmployeeId,
    pub key_id: KeyId,
    pub action: TransactionAction,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub notes: Option<String>,
    pub handled_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeInput {
    pub name: String,
    pub employee_number: String,
    pub category: EmploymentCategory,
    pub start_date: Date,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInput {
    pub key_number: String,
    pub key_type: KeyType,
    pub length: KeyLength,
    pub note: Option<String>,
}

/// Full replacement of a key's descriptive fields. Custody is replaced only
/// when given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyUpdate {
    pub key_number: String,
    pub key_type: KeyType,
    pub length: KeyLength,
    pub note: Option<String>,
    /// `None` keeps whatever custody the key has when the edit is applied.
    pub custody: Option<Custody>,
    /// Recorded on the ledger entries a custody change produces.
    pub handled_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn years_of_service_is_a_calendar_year_difference() {
        assert_eq!(years_of_service(date!(2020 - 01 - 15), date!(2025 - 01 - 01)), 5);
        assert_eq!(years_of_service(date!(2020 - 12 - 31), date!(2020 - 12 - 31)), 0);
    }

    #[test]
    fn wire_enums_use_external_strings() {
        assert_eq!("kort".parse::<KeyLength>().unwrap(), KeyLength::Short);
        assert_eq!(KeyLength::Long.as_str(), "lang");
        assert_eq!("MBV".parse::<EmploymentCategory>().unwrap(), EmploymentCategory::Mbv);
        let err = "D".parse::<KeyType>().unwrap_err();
        assert_eq!(err.kind, "key type");
        assert_eq!(
            serde_json::to_value(TransactionAction::Return).unwrap(),
            serde_json::json!("return")
        );
    }

    #[test]
    fn custody_rejects_mismatched_parts() {
        let holder = EmployeeId(Uuid::now_v7());
        assert_eq!(
            Custody::from_parts(KeyStatus::Issued, Some(holder)).unwrap(),
            Custody::Issued(holder)
        );
        assert!(Custody::from_parts(KeyStatus::Issued, None).is_err());
        assert!(Custody::from_parts(KeyStatus::Available, Some(holder)).is_err());
    }

    #[test]
    fn key_item_serializes_status_and_assignment() {
        let holder = EmployeeId(Uuid::now_v7());
        let key = KeyItem {
            id: KeyId(Uuid::now_v7()),
            key_number: "A001".to_string(),
            key_type: KeyType::A,
            length: KeyLength::Short,
            custody: Custody::Issued(holder),
            note: None,
        };
        let json = serde_json::to_value(&key).unwrap();
        assert_eq!(json["status"], "issued");
        assert_eq!(json["assignedTo"], holder.to_string());
        assert_eq!(json["type"], "A");
        assert_eq!(json["length"], "kort");
    }

    #[test]
    fn employee_serializes_start_date_as_iso_date() {
        let employee = Employee {
            id: EmployeeId(Uuid::now_v7()),
            name: "Jan Janssen".to_string(),
            employee_number: "EMP001".to_string(),
            category: EmploymentCategory::Cao,
            start_date: date!(2020 - 01 - 15),
            years_of_service: 0,
        };
        let json = serde_json::to_value(&employee).unwrap();
        assert_eq!(json["startDate"], "2020-01-15");
        assert_eq!(json["employeeNumber"], "EMP001");
        assert_eq!(json["type"], "CAO");
    }
}
