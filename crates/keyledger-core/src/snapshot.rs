use keyledger_common::{Employee, EmployeeId, KeyId, KeyItem, Transaction};
use keyledger_storage::StorageSnapshot;
use time::Date;

use crate::convert::{employee_from_row, key_from_row, transaction_from_row};
use crate::error::StoreResult;

/// Immutable view of all three collections, each newest first.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub employees: Vec<Employee>,
    pub keys: Vec<KeyItem>,
    pub transactions: Vec<Transaction>,
}

impl Snapshot {
    pub(crate) fn decode(raw: StorageSnapshot, today: Date) -> StoreResult<Self> {
        Ok(Self {
            employees: raw
                .employees
                .into_iter()
                .map(|row| employee_from_row(row, today))
                .collect::<StoreResult<_>>()?,
            keys: raw
                .keys
                .into_iter()
                .map(key_from_row)
                .collect::<StoreResult<_>>()?,
            transactions: raw
                .transactions
                .into_iter()
                .map(transaction_from_row)
                .collect::<StoreResult<_>>()?,
        })
    }

    pub fn employee(&self, id: EmployeeId) -> Option<&Employee> {
        self.employees.iter().find(|employee| employee.id == id)
    }

    pub fn key(&self, id: KeyId) -> Option<&KeyItem> {
        self.keys.iter().find(|key| key.id == id)
    }

    pub fn keys_held_by(&self, id: EmployeeId) -> impl Iterator<Item = &KeyItem> {
        self.keys.iter().filter(move |key| key.is_held_by(id))
    }

    pub fn transactions_of(&self, id: EmployeeId) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(move |tx| tx.employee_id == id)
    }

    pub(crate) fn put_employee(&mut self, employee: Employee) {
        match self.employees.iter_mut().find(|e| e.id == employee.id) {
            Some(slot) => *slot = employee,
            None => self.employees.insert(0, employee),
        }
    }

    pub(crate) fn put_key(&mut self, key: KeyItem) {
        match self.keys.iter_mut().find(|k| k.id == key.id) {
            Some(slot) => *slot = key,
            None => self.keys.insert(0, key),
        }
    }

    /// `entries` arrive oldest first; each lands at the head of the ledger.
    pub(crate) fn record(&mut self, entries: impl IntoIterator<Item = Transaction>) {
        for entry in entries {
            self.transactions.insert(0, entry);
        }
    }
}
