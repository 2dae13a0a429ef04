use async_trait::async_trait;
use uuid::Uuid;

use crate::snapshot::{
    CustodyGuard, EmployeeRow, EmployeeWrite, KeyChange, KeyRow, KeyWrite, StorageSnapshot,
    TransactionRow, TransactionWrite,
};

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("db error: {0}")]
    Db(#[from] sea_orm::DbErr),
    #[error("{relation} row {id} not found")]
    NotFound { relation: &'static str, id: Uuid },
    #[error("{relation} row {id} changed concurrently")]
    Conflict { relation: &'static str, id: Uuid },
}

/// The persistence collaborator behind the entity store.
///
/// Every method is one round-trip; the multi-row operations (`delete_employee`,
/// `update_key`) run inside a single database transaction and either commit
/// all of their effects or none.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Entity-first schema sync (SeaORM 2.0).
    async fn sync(&self) -> StorageResult<()>;

    async fn health(&self) -> StorageResult<()>;

    // Employees
    async fn select_employees(&self) -> StorageResult<Vec<EmployeeRow>>;
    async fn insert_employee(&self, write: EmployeeWrite) -> StorageResult<EmployeeRow>;
    async fn update_employee(&self, id: Uuid, write: EmployeeWrite) -> StorageResult<EmployeeRow>;
    /// Deletes the employee and releases every key assigned to it. Returns the
    /// released keys.
    async fn delete_employee(&self, id: Uuid) -> StorageResult<Vec<KeyRow>>;

    // Keys
    async fn select_keys(&self) -> StorageResult<Vec<KeyRow>>;
    async fn insert_key(&self, write: KeyWrite) -> StorageResult<KeyRow>;
    /// Writes the key and appends `ledger`. With a guard, fails with
    /// `Conflict` unless the stored custody matches it.
    async fn update_key(
        &self,
        id: Uuid,
        guard: Option<CustodyGuard>,
        write: KeyWrite,
        ledger: Vec<TransactionWrite>,
    ) -> StorageResult<KeyChange>;
    async fn delete_key(&self, id: Uuid) -> StorageResult<()>;

    // Ledger
    async fn select_transactions(&self) -> StorageResult<Vec<TransactionRow>>;

    async fn load_snapshot(&self) -> StorageResult<StorageSnapshot> {
        Ok(StorageSnapshot {
            employees: self.select_employees().await?,
            keys: self.select_keys().await?,
            transactions: self.select_transactions().await?,
        })
    }
}
