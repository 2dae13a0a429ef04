use keyledger_storage::StorageError;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Missing or malformed input, rejected before any persistence call.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
    /// The operation does not fit the key's current custody.
    #[error("{0}")]
    InvalidState(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl StoreError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Stable machine-readable name of the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Validation { .. } => "validation",
            StoreError::NotFound { .. } => "not_found",
            StoreError::InvalidState(_) => "invalid_state",
            StoreError::Persistence(_) => "persistence",
        }
    }
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { relation, id } => StoreError::NotFound {
                entity: entity_name(relation),
                id,
            },
            StorageError::Conflict { relation, id } => StoreError::InvalidState(format!(
                "{} {id} was changed by another writer",
                entity_name(relation)
            )),
            StorageError::Db(err) => StoreError::Persistence(err.to_string()),
        }
    }
}

fn entity_name(relation: &'static str) -> &'static str {
    match relation {
        "employees" => "employee",
        "keys" => "key",
        "transactions" => "transaction",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_map_onto_store_taxonomy() {
        let id = Uuid::now_v7();
        let err = StoreError::from(StorageError::NotFound {
            relation: "keys",
            id,
        });
        assert!(matches!(err, StoreError::NotFound { entity: "key", id: got } if got == id));

        let err = StoreError::from(StorageError::Conflict {
            relation: "keys",
            id,
        });
        assert_eq!(err.kind(), "invalid_state");

        let err = StoreError::from(StorageError::Db(keyledger_storage::DbErr::Custom("boom".into())));
        assert_eq!(err.kind(), "persistence");
        assert!(err.to_string().contains("boom"));
    }
}
