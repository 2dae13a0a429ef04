pub mod entities;
pub mod seaorm;
pub mod snapshot;
pub mod storage;

pub use sea_orm::DbErr;
pub use seaorm::SeaOrmStorage;
pub use snapshot::{
    CustodyGuard, EmployeeRow, EmployeeWrite, KEY_STATUS_AVAILABLE, KeyChange, KeyRow, KeyWrite,
    StorageSnapshot, TransactionRow, TransactionWrite,
};
pub use storage::{Storage, StorageError, StorageResult};
