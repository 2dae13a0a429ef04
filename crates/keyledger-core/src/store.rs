use std::sync::Arc;

use arc_swap::ArcSwap;
use keyledger_common::{
    Custody, Employee, EmployeeId, EmployeeInput, KeyId, KeyInput, KeyItem, KeyUpdate,
    Transaction, TransactionAction,
};
use keyledger_storage::{KEY_STATUS_AVAILABLE, KeyChange, KeyWrite, Storage, TransactionWrite};
use time::{Date, OffsetDateTime};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::convert::{
    custody_guard, employee_from_row, employee_write, key_from_row, key_write, ledger_entry,
    transaction_from_row,
};
use crate::error::{StoreError, StoreResult};
use crate::snapshot::Snapshot;

const KEY_EDIT_NOTE: &str = "custody changed by key edit";

/// The single reader/writer of employees, keys and the transaction ledger.
///
/// Reads are served from an in-memory [`Snapshot`]. Every mutation runs under
/// one write gate, persists first and only then publishes a new snapshot, so a
/// failed call leaves the visible state exactly as it was.
pub struct EntityStore {
    storage: Arc<dyn Storage>,
    snapshot: ArcSwap<Snapshot>,
    write_gate: Mutex<()>,
}

impl EntityStore {
    pub async fn load(storage: Arc<dyn Storage>) -> StoreResult<Self> {
        let raw = storage.load_snapshot().await?;
        let snapshot = Snapshot::decode(raw, today())?;
        info!(
            employees = snapshot.employees.len(),
            keys = snapshot.keys.len(),
            transactions = snapshot.transactions.len(),
            "entity store loaded"
        );
        Ok(Self {
            storage,
            snapshot: ArcSwap::from_pointee(snapshot),
            write_gate: Mutex::new(()),
        })
    }

    /// Re-fetches all three relations and replaces the snapshot.
    pub async fn refresh(&self) -> StoreResult<()> {
        let _gate = self.write_gate.lock().await;
        let raw = self.storage.load_snapshot().await?;
        let snapshot = Snapshot::decode(raw, today())?;
        info!(
            employees = snapshot.employees.len(),
            keys = snapshot.keys.len(),
            transactions = snapshot.transactions.len(),
            "snapshot refreshed"
        );
        self.snapshot.store(Arc::new(snapshot));
        Ok(())
    }

    pub async fn health(&self) -> StoreResult<()> {
        Ok(self.storage.health().await?)
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    pub fn list_employees(&self) -> Vec<Employee> {
        let today = today();
        self.snapshot
            .load()
            .employees
            .iter()
            .cloned()
            .map(|employee| employee.with_years_as_of(today))
            .collect()
    }

    pub fn list_keys(&self) -> Vec<KeyItem> {
        self.snapshot.load().keys.clone()
    }

    pub fn list_transactions(&self) -> Vec<Transaction> {
        self.snapshot.load().transactions.clone()
    }

    pub fn employee(&self, id: EmployeeId) -> StoreResult<Employee> {
        self.snapshot
            .load()
            .employee(id)
            .cloned()
            .map(|employee| employee.with_years_as_of(today()))
            .ok_or_else(|| employee_not_found(id))
    }

    pub fn key(&self, id: KeyId) -> StoreResult<KeyItem> {
        self.snapshot
            .load()
            .key(id)
            .cloned()
            .ok_or_else(|| key_not_found(id))
    }

    pub async fn add_employee(&self, input: EmployeeInput) -> StoreResult<Employee> {
        let input = normalize_employee(input)?;
        let _gate = self.write_gate.lock().await;
        let current = self.snapshot.load_full();
        if current
            .employees
            .iter()
            .any(|employee| employee.employee_number == input.employee_number)
        {
            warn!(
                employee_number = %input.employee_number,
                "employee number already registered"
            );
        }

        let today = today();
        let row = self
            .storage
            .insert_employee(employee_write(&input, today))
            .await?;
        let employee = employee_from_row(row, today)?;
        self.publish(&current, |next| next.employees.insert(0, employee.clone()));
        info!(employee_id = %employee.id, "employee added");
        Ok(employee)
    }

    pub async fn update_employee(
        &self,
        id: EmployeeId,
        input: EmployeeInput,
    ) -> StoreResult<Employee> {
        let input = normalize_employee(input)?;
        let _gate = self.write_gate.lock().await;
        let current = self.snapshot.load_full();
        if current.employee(id).is_none() {
            return Err(employee_not_found(id));
        }

        let today = today();
        let row = self
            .storage
            .update_employee(id.as_uuid(), employee_write(&input, today))
            .await?;
        let employee = employee_from_row(row, today)?;
        self.publish(&current, |next| next.put_employee(employee.clone()));
        info!(employee_id = %id, "employee updated");
        Ok(employee)
    }

    /// Removes the employee and returns every key it held, now available.
    pub async fn delete_employee(&self, id: EmployeeId) -> StoreResult<Vec<KeyItem>> {
        let _gate = self.write_gate.lock().await;
        let current = self.snapshot.load_full();
        if current.employee(id).is_none() {
            return Err(employee_not_found(id));
        }

        let rows = self.storage.delete_employee(id.as_uuid()).await?;
        let released = rows
            .into_iter()
            .map(key_from_row)
            .collect::<StoreResult<Vec<_>>>()?;
        self.publish(&current, |next| {
            next.employees.retain(|employee| employee.id != id);
            for key in &released {
                next.put_key(key.clone());
            }
            for key in next.keys.iter_mut().filter(|key| key.is_held_by(id)) {
                key.custody = Custody::Available;
            }
        });
        info!(employee_id = %id, released = released.len(), "employee deleted");
        Ok(released)
    }

    /// Registers a key. New keys always start out available.
    pub async fn add_key(&self, input: KeyInput) -> StoreResult<KeyItem> {
        let key_number = required("key_number", &input.key_number)?;
        let _gate = self.write_gate.lock().await;
        let current = self.snapshot.load_full();
        if current.keys.iter().any(|key| key.key_number == key_number) {
            warn!(key_number = %key_number, "key number already registered");
        }

        let row = self
            .storage
            .insert_key(KeyWrite {
                key_number,
                kind: input.key_type.as_str().to_string(),
                length: input.length.as_str().to_string(),
                status: KEY_STATUS_AVAILABLE.to_string(),
                assigned_to: None,
                opmerking: optional_text(input.note),
            })
            .await?;
        let key = key_from_row(row)?;
        self.publish(&current, |next| next.keys.insert(0, key.clone()));
        info!(key_id = %key.id, key_number = %key.key_number, "key added");
        Ok(key)
    }

    /// Overwrites every field of the key, and its custody when the update
    /// carries one. A custody change is recorded on the ledger as a return
    /// from the previous holder and/or an issue to the new one.
    pub async fn update_key(&self, id: KeyId, update: KeyUpdate) -> StoreResult<KeyItem> {
        let key_number = required("key_number", &update.key_number)?;
        let handled_by = optional_text(update.handled_by);
        let _gate = self.write_gate.lock().await;
        let current = self.snapshot.load_full();
        let existing = current.key(id).ok_or_else(|| key_not_found(id))?;
        let custody = update.custody.unwrap_or(existing.custody);
        if let Some(holder) = custody.holder()
            && current.employee(holder).is_none()
        {
            return Err(employee_not_found(holder));
        }

        let desired = KeyItem {
            id,
            key_number,
            key_type: update.key_type,
            length: update.length,
            custody,
            note: optional_text(update.note),
        };
        let ledger = custody_transitions(
            id,
            existing.custody,
            desired.custody,
            handled_by,
            OffsetDateTime::now_utc(),
        );
        let (key, recorded) = self.write_key(existing.custody, &desired, ledger).await?;
        self.publish(&current, |next| {
            next.put_key(key.clone());
            next.record(recorded.iter().cloned());
        });
        if recorded.is_empty() {
            info!(key_id = %id, "key updated");
        } else {
            info!(
                key_id = %id,
                status = %key.status(),
                ledger_entries = recorded.len(),
                "key updated with custody change"
            );
        }
        Ok(key)
    }

    /// Removes the key. Ledger entries that reference it are kept.
    pub async fn delete_key(&self, id: KeyId) -> StoreResult<()> {
        let _gate = self.write_gate.lock().await;
        let current = self.snapshot.load_full();
        if current.key(id).is_none() {
            return Err(key_not_found(id));
        }

        self.storage.delete_key(id.as_uuid()).await?;
        self.publish(&current, |next| next.keys.retain(|key| key.id != id));
        info!(key_id = %id, "key deleted");
        Ok(())
    }

    pub async fn issue_key(
        &self,
        key_id: KeyId,
        employee_id: EmployeeId,
        handled_by: &str,
        notes: Option<String>,
    ) -> StoreResult<Transaction> {
        let handled_by = required("handled_by", handled_by)?;
        let notes = optional_text(notes);
        let _gate = self.write_gate.lock().await;
        let current = self.snapshot.load_full();
        let key = current.key(key_id).ok_or_else(|| key_not_found(key_id))?;
        if current.employee(employee_id).is_none() {
            return Err(employee_not_found(employee_id));
        }
        if let Custody::Issued(holder) = key.custody {
            return Err(StoreError::InvalidState(format!(
                "key {} is already issued to employee {holder}",
                key.key_number
            )));
        }

        let desired = KeyItem {
            custody: Custody::Issued(employee_id),
            ..key.clone()
        };
        let entry = ledger_entry(
            employee_id,
            key_id,
            TransactionAction::Issue,
            OffsetDateTime::now_utc(),
            notes,
            Some(handled_by.clone()),
        );
        let (key, transaction) = self.write_single(key.custody, &desired, entry).await?;
        self.publish(&current, |next| {
            next.put_key(key);
            next.record([transaction.clone()]);
        });
        info!(
            key_id = %key_id,
            employee_id = %employee_id,
            handled_by = %handled_by,
            "key issued"
        );
        Ok(transaction)
    }

    /// Returns the key to the pool. The ledger entry names the employee that
    /// held it; an already available key is left alone and yields `None`.
    pub async fn return_key(
        &self,
        key_id: KeyId,
        handled_by: &str,
        notes: Option<String>,
    ) -> StoreResult<Option<Transaction>> {
        let handled_by = required("handled_by", handled_by)?;
        let notes = optional_text(notes);
        let _gate = self.write_gate.lock().await;
        let current = self.snapshot.load_full();
        let key = current.key(key_id).ok_or_else(|| key_not_found(key_id))?;
        let Custody::Issued(holder) = key.custody else {
            debug!(key_id = %key_id, "return of an available key ignored");
            return Ok(None);
        };

        let desired = KeyItem {
            custody: Custody::Available,
            ..key.clone()
        };
        let entry = ledger_entry(
            holder,
            key_id,
            TransactionAction::Return,
            OffsetDateTime::now_utc(),
            notes,
            Some(handled_by.clone()),
        );
        let (key, transaction) = self.write_single(key.custody, &desired, entry).await?;
        self.publish(&current, |next| {
            next.put_key(key);
            next.record([transaction.clone()]);
        });
        info!(
            key_id = %key_id,
            employee_id = %holder,
            handled_by = %handled_by,
            "key returned"
        );
        Ok(Some(transaction))
    }

    /// Persists `desired` only if the stored custody still equals `expected`.
    async fn write_key(
        &self,
        expected: Custody,
        desired: &KeyItem,
        ledger: Vec<TransactionWrite>,
    ) -> StoreResult<(KeyItem, Vec<Transaction>)> {
        let KeyChange { key, transactions } = self
            .storage
            .update_key(
                desired.id.as_uuid(),
                Some(custody_guard(expected)),
                key_write(desired),
                ledger,
            )
            .await?;
        let key = key_from_row(key)?;
        let transactions = transactions
            .into_iter()
            .map(transaction_from_row)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok((key, transactions))
    }

    async fn write_single(
        &self,
        expected: Custody,
        desired: &KeyItem,
        entry: TransactionWrite,
    ) -> StoreResult<(KeyItem, Transaction)> {
        let (key, transactions) = self.write_key(expected, desired, vec![entry]).await?;
        let transaction = transactions.into_iter().next().ok_or_else(|| {
            StoreError::Persistence(format!("key {} stored without its ledger entry", key.id))
        })?;
        Ok((key, transaction))
    }

    fn publish(&self, current: &Snapshot, apply: impl FnOnce(&mut Snapshot)) {
        let mut next = current.clone();
        apply(&mut next);
        self.snapshot.store(Arc::new(next));
    }
}

fn custody_transitions(
    key_id: KeyId,
    from: Custody,
    to: Custody,
    handled_by: Option<String>,
    at: OffsetDateTime,
) -> Vec<TransactionWrite> {
    if from == to {
        return Vec::new();
    }
    let mut ledger = Vec::with_capacity(2);
    if let Some(previous) = from.holder() {
        ledger.push(ledger_entry(
            previous,
            key_id,
            TransactionAction::Return,
            at,
            Some(KEY_EDIT_NOTE.to_string()),
            handled_by.clone(),
        ));
    }
    if let Some(holder) = to.holder() {
        ledger.push(ledger_entry(
            holder,
            key_id,
            TransactionAction::Issue,
            at,
            Some(KEY_EDIT_NOTE.to_string()),
            handled_by,
        ));
    }
    ledger
}

fn normalize_employee(input: EmployeeInput) -> StoreResult<EmployeeInput> {
    Ok(EmployeeInput {
        name: required("name", &input.name)?,
        employee_number: required("employee_number", &input.employee_number)?,
        ..input
    })
}

fn required(field: &'static str, value: &str) -> StoreResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(StoreError::validation(field, "must not be blank"));
    }
    Ok(value.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn employee_not_found(id: EmployeeId) -> StoreError {
    StoreError::NotFound {
        entity: "employee",
        id: id.as_uuid(),
    }
}

fn key_not_found(id: KeyId) -> StoreError {
    StoreError::NotFound {
        entity: "key",
        id: id.as_uuid(),
    }
}

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}
