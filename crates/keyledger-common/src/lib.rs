pub mod config;
pub mod model;

pub use config::{GlobalConfig, GlobalConfigError, GlobalConfigPatch};
pub use model::{
    Custody, Employee, EmployeeId, EmployeeInput, EmploymentCategory, InconsistentCustody,
    KeyId, KeyInput, KeyItem, KeyLength, KeyStatus, KeyType, KeyUpdate, ParseEnumError,
    Transaction, TransactionAction, TransactionId, years_of_service,
};
