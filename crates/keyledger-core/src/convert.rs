//! Translation between the storage's external schema and the domain model.

use std::str::FromStr;

use keyledger_common::{
    Custody, Employee, EmployeeId, EmployeeInput, EmploymentCategory, KeyId, KeyItem, KeyLength,
    KeyStatus, KeyType, Transaction, TransactionAction, TransactionId, years_of_service,
};
use keyledger_storage::{
    CustodyGuard, EmployeeRow, EmployeeWrite, KeyRow, KeyWrite, TransactionRow, TransactionWrite,
};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

pub(crate) fn employee_from_row(row: EmployeeRow, today: Date) -> StoreResult<Employee> {
    let category = decode::<EmploymentCategory>("employees", row.id, &row.kind)?;
    Ok(Employee {
        id: EmployeeId(row.id),
        years_of_service: years_of_service(row.start_date, today),
        name: row.name,
        employee_number: row.employee_number,
        category,
        start_date: row.start_date,
    })
}

pub(crate) fn key_from_row(row: KeyRow) -> StoreResult<KeyItem> {
    let key_type = decode::<KeyType>("keys", row.id, &row.kind)?;
    let length = decode::<KeyLength>("keys", row.id, &row.length)?;
    let status = decode::<KeyStatus>("keys", row.id, &row.status)?;
    let custody = Custody::from_parts(status, row.assigned_to.map(EmployeeId))
        .map_err(|err| StoreError::Persistence(format!("keys row {}: {err}", row.id)))?;
    Ok(KeyItem {
        id: KeyId(row.id),
        key_number: row.key_number,
        key_type,
        length,
        custody,
        note: row.opmerking,
    })
}

pub(crate) fn transaction_from_row(row: TransactionRow) -> StoreResult<Transaction> {
    let action = decode::<TransactionAction>("transactions", row.id, &row.action)?;
    Ok(Transaction {
        id: TransactionId(row.id),
        employee_id: EmployeeId(row.employee_id),
        key_id: KeyId(row.key_id),
        action,
        timestamp: row.timestamp,
        notes: row.notes,
        handled_by: row.handled_by,
    })
}

pub(crate) fn employee_write(input: &EmployeeInput, today: Date) -> EmployeeWrite {
    EmployeeWrite {
        name: input.name.clone(),
        employee_number: input.employee_number.clone(),
        kind: input.category.as_str().to_string(),
        start_date: input.start_date,
        years_of_service: years_of_service(input.start_date, today),
    }
}

pub(crate) fn key_write(key: &KeyItem) -> KeyWrite {
    KeyWrite {
        key_number: key.key_number.clone(),
        kind: key.key_type.as_str().to_string(),
        length: key.length.as_str().to_string(),
        status: key.status().as_str().to_string(),
        assigned_to: key.assigned_to().map(|id| id.as_uuid()),
        opmerking: key.note.clone(),
    }
}

pub(crate) fn custody_guard(custody: Custody) -> CustodyGuard {
    CustodyGuard {
        status: custody.status().as_str().to_string(),
        assigned_to: custody.holder().map(|id| id.as_uuid()),
    }
}

pub(crate) fn ledger_entry(
    employee_id: EmployeeId,
    key_id: KeyId,
    action: TransactionAction,
    timestamp: OffsetDateTime,
    notes: Option<String>,
    handled_by: Option<String>,
) -> TransactionWrite {
    TransactionWrite {
        employee_id: employee_id.as_uuid(),
        key_id: key_id.as_uuid(),
        action: action.as_str().to_string(),
        timestamp,
        notes,
        handled_by,
    }
}

fn decode<T>(relation: &str, id: Uuid, value: &str) -> StoreResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|err| StoreError::Persistence(format!("{relation} row {id}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn key_row(status: &str, assigned_to: Option<Uuid>) -> KeyRow {
        KeyRow {
            id: Uuid::now_v7(),
            key_number: "A001".to_string(),
            kind: "A".to_string(),
            length: "lang".to_string(),
            status: status.to_string(),
            assigned_to,
            opmerking: Some("front door".to_string()),
            created_at: datetime!(2024-05-01 10:00 UTC),
            updated_at: datetime!(2024-05-01 10:00 UTC),
        }
    }

    #[test]
    fn employee_rows_recompute_years_of_service() {
        let row = EmployeeRow {
            id: Uuid::now_v7(),
            name: "Jan Janssen".to_string(),
            employee_number: "EMP001".to_string(),
            kind: "MBV".to_string(),
            start_date: date!(2020 - 01 - 15),
            years_of_service: 1,
            created_at: datetime!(2024-05-01 10:00 UTC),
            updated_at: datetime!(2024-05-01 10:00 UTC),
        };
        let employee = employee_from_row(row, date!(2026 - 10 - 19)).unwrap();
        assert_eq!(employee.years_of_service, 6);
        assert_eq!(employee.category, EmploymentCategory::Mbv);
    }

    #[test]
    fn key_rows_decode_custody() {
        let holder = Uuid::now_v7();
        let key = key_from_row(key_row("issued", Some(holder))).unwrap();
        assert_eq!(key.custody, Custody::Issued(EmployeeId(holder)));
        assert_eq!(key.length, KeyLength::Long);
        assert_eq!(key.note.as_deref(), Some("front door"));

        let write = key_write(&key);
        assert_eq!(write.status, "issued");
        assert_eq!(write.assigned_to, Some(holder));
        assert_eq!(write.opmerking.as_deref(), Some("front door"));
    }

    #[test]
    fn inconsistent_or_unknown_rows_are_persistence_errors() {
        let err = key_from_row(key_row("issued", None)).unwrap_err();
        assert_eq!(err.kind(), "persistence");

        let err = key_from_row(key_row("lost", None)).unwrap_err();
        assert!(err.to_string().contains("lost"));
    }
}
