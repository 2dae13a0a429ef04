use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::entities;

/// `keys.status` value for a key in the inventory pool.
pub const KEY_STATUS_AVAILABLE: &str = "available";

#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeRow {
    pub id: Uuid,
    pub name: String,
    pub employee_number: String,
    pub kind: String,
    pub start_date: Date,
    pub years_of_service: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyRow {
    pub id: Uuid,
    pub key_number: String,
    pub kind: String,
    pub length: String,
    pub status: String,
    pub assigned_to: Option<Uuid>,
    pub opmerking: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRow {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub key_id: Uuid,
    pub action: String,
    pub timestamp: OffsetDateTime,
    pub notes: Option<String>,
    pub handled_by: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Column values for an employee insert or update. Id and timestamps are
/// assigned by the storage.
#[derive(Debug, Clone)]
pub struct EmployeeWrite {
    pub name: String,
    pub employee_number: String,
    pub kind: String,
    pub start_date: Date,
    pub years_of_service: i32,
}

#[derive(Debug, Clone)]
pub struct KeyWrite {
    pub key_number: String,
    pub kind: String,
    pub length: String,
    pub status: String,
    pub assigned_to: Option<Uuid>,
    pub opmerking: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TransactionWrite {
    pub employee_id: Uuid,
    pub key_id: Uuid,
    pub action: String,
    pub timestamp: OffsetDateTime,
    pub notes: Option<String>,
    pub handled_by: Option<String>,
}

/// Expected `(status, assigned_to)` of a key; the write only applies when
/// the stored row still matches.
#[derive(Debug, Clone, PartialEq)]
pub struct CustodyGuard {
    pub status: String,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct KeyChange {
    pub key: KeyRow,
    pub transactions: Vec<TransactionRow>,
}

/// All three relations, each newest first.
#[derive(Debug, Clone, Default)]
pub struct StorageSnapshot {
    pub employees: Vec<EmployeeRow>,
    pub keys: Vec<KeyRow>,
    pub transactions: Vec<TransactionRow>,
}

impl From<entities::employees::Model> for EmployeeRow {
    fn from(m: entities::employees::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            employee_number: m.employee_number,
            kind: m.kind,
            start_date: m.start_date,
            years_of_service: m.years_of_service,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

impl From<entities::keys::Model> for KeyRow {
    fn from(m: entities::keys::Model) -> Self {
        Self {
            id: m.id,
            key_number: m.key_number,
            kind: m.kind,
            length: m.length,
            status: m.status,
            assigned_to: m.assigned_to,
            opmerking: m.opmerking,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

impl From<entities::transactions::Model> for TransactionRow {
    fn from(m: entities::transactions::Model) -> Self {
        Self {
            id: m.id,
            employee_id: m.employee_id,
            key_id: m.key_id,
            action: m.action,
            timestamp: m.timestamp,
            notes: m.notes,
            handled_by: m.handled_by,
            created_at: m.created_at,
        }
    }
}
