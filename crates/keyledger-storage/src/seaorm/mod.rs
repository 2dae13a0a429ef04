#![allow(clippy::needless_update)]

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectOptions, ConnectionTrait, Database,
    DatabaseBackend, DatabaseConnection, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    Schema, TransactionError, TransactionTrait,
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::entities;
use crate::snapshot::{
    CustodyGuard, EmployeeRow, EmployeeWrite, KEY_STATUS_AVAILABLE, KeyChange, KeyRow, KeyWrite,
    TransactionRow, TransactionWrite,
};
use crate::storage::{Storage, StorageError, StorageResult};

#[derive(Clone)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
}

impl SeaOrmStorage {
    pub async fn connect(dsn: &str) -> StorageResult<Self> {
        let mut options = ConnectOptions::new(dsn);
        // Every pooled connection to `:memory:` would open its own database.
        if dsn.starts_with("sqlite:") && dsn.contains(":memory:") {
            options.max_connections(1);
        }
        let db = Database::connect(options).await?;
        if db.get_database_backend() == DatabaseBackend::Sqlite {
            db.execute_unprepared("PRAGMA foreign_keys = ON").await?;
        }
        Ok(Self { db })
    }
}

#[async_trait::async_trait]
impl Storage for SeaOrmStorage {
    async fn sync(&self) -> StorageResult<()> {
        Schema::new(self.db.get_database_backend())
            .builder()
            .register(entities::Employees)
            .register(entities::Keys)
            .register(entities::Transactions)
            .sync(&self.db)
            .await?;
        Ok(())
    }

    async fn health(&self) -> StorageResult<()> {
        entities::Employees::find().one(&self.db).await?;
        Ok(())
    }

    async fn select_employees(&self) -> StorageResult<Vec<EmployeeRow>> {
        use entities::employees::Column;
        let rows = entities::Employees::find()
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(EmployeeRow::from).collect())
    }

    async fn insert_employee(&self, write: EmployeeWrite) -> StorageResult<EmployeeRow> {
        use entities::employees::ActiveModel as EmployeeActive;

        let now = OffsetDateTime::now_utc();
        let active = EmployeeActive {
            id: ActiveValue::Set(Uuid::now_v7()),
            name: ActiveValue::Set(write.name),
            employee_number: ActiveValue::Set(write.employee_number),
            kind: ActiveValue::Set(write.kind),
            start_date: ActiveValue::Set(write.start_date),
            years_of_service: ActiveValue::Set(write.years_of_service),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            ..Default::default()
        };
        let model = active.insert(&self.db).await?;
        Ok(model.into())
    }

    async fn update_employee(&self, id: Uuid, write: EmployeeWrite) -> StorageResult<EmployeeRow> {
        use entities::employees::ActiveModel as EmployeeActive;

        let existing = entities::Employees::find_by_id(id).one(&self.db).await?;
        let Some(model) = existing else {
            return Err(StorageError::NotFound {
                relation: "employees",
                id,
            });
        };
        let mut active: EmployeeActive = model.into();
        active.name = ActiveValue::Set(write.name);
        active.employee_number = ActiveValue::Set(write.employee_number);
        active.kind = ActiveValue::Set(write.kind);
        active.start_date = ActiveValue::Set(write.start_date);
        active.years_of_service = ActiveValue::Set(write.years_of_service);
        active.updated_at = ActiveValue::Set(OffsetDateTime::now_utc());
        let updated = active.update(&self.db).await?;
        Ok(updated.into())
    }

    async fn delete_employee(&self, id: Uuid) -> StorageResult<Vec<KeyRow>> {
        let result = self
            .db
            .transaction::<_, Vec<KeyRow>, StorageError>(move |txn| {
                Box::pin(async move {
                    use entities::keys::{ActiveModel as KeyActive, Column as KeyColumn};

                    if entities::Employees::find_by_id(id).one(txn).await?.is_none() {
                        return Err(StorageError::NotFound {
                            relation: "employees",
                            id,
                        });
                    }

                    let held = entities::Keys::find()
                        .filter(KeyColumn::AssignedTo.eq(id))
                        .all(txn)
                        .await?;
                    let now = OffsetDateTime::now_utc();
                    let mut released = Vec::with_capacity(held.len());
                    for model in held {
                        let mut active: KeyActive = model.into();
                        active.status = ActiveValue::Set(KEY_STATUS_AVAILABLE.to_string());
                        active.assigned_to = ActiveValue::Set(None);
                        active.updated_at = ActiveValue::Set(now);
                        released.push(KeyRow::from(active.update(txn).await?));
                    }

                    entities::Employees::delete_by_id(id).exec(txn).await?;
                    Ok(released)
                })
            })
            .await;
        flatten(result)
    }

    async fn select_keys(&self) -> StorageResult<Vec<KeyRow>> {
        use entities::keys::Column;
        let rows = entities::Keys::find()
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(KeyRow::from).collect())
    }

    async fn insert_key(&self, write: KeyWrite) -> StorageResult<KeyRow> {
        use entities::keys::ActiveModel as KeyActive;

        let now = OffsetDateTime::now_utc();
        let active = KeyActive {
            id: ActiveValue::Set(Uuid::now_v7()),
            key_number: ActiveValue::Set(write.key_number),
            kind: ActiveValue::Set(write.kind),
            length: ActiveValue::Set(write.length),
            status: ActiveValue::Set(write.status),
            assigned_to: ActiveValue::Set(write.assigned_to),
            opmerking: ActiveValue::Set(write.opmerking),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            ..Default::default()
        };
        let model = active.insert(&self.db).await?;
        Ok(model.into())
    }

    async fn update_key(
        &self,
        id: Uuid,
        guard: Option<CustodyGuard>,
        write: KeyWrite,
        ledger: Vec<TransactionWrite>,
    ) -> StorageResult<KeyChange> {
        let result = self
            .db
            .transaction::<_, KeyChange, StorageError>(move |txn| {
                Box::pin(async move {
                    if let Some(holder) = write.assigned_to
                        && entities::Employees::find_by_id(holder).one(txn).await?.is_none()
                    {
                        return Err(StorageError::NotFound {
                            relation: "employees",
                            id: holder,
                        });
                    }

                    compare_and_set_key(txn, id, guard.as_ref(), write).await?;
                    let key = entities::Keys::find_by_id(id)
                        .one(txn)
                        .await?
                        .map(KeyRow::from)
                        .ok_or(StorageError::NotFound {
                            relation: "keys",
                            id,
                        })?;

                    let mut transactions = Vec::with_capacity(ledger.len());
                    for entry in ledger {
                        transactions.push(insert_transaction(txn, entry).await?);
                    }
                    Ok(KeyChange { key, transactions })
                })
            })
            .await;
        flatten(result)
    }

    async fn delete_key(&self, id: Uuid) -> StorageResult<()> {
        let result = entities::Keys::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(StorageError::NotFound {
                relation: "keys",
                id,
            });
        }
        Ok(())
    }

    async fn select_transactions(&self) -> StorageResult<Vec<TransactionRow>> {
        use entities::transactions::Column;
        let rows = entities::Transactions::find()
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(TransactionRow::from).collect())
    }
}

/// Single conditional UPDATE; zero affected rows means the key is gone or its
/// custody no longer matches `guard`.
async fn compare_and_set_key(
    txn: &DatabaseTransaction,
    id: Uuid,
    guard: Option<&CustodyGuard>,
    write: KeyWrite,
) -> StorageResult<()> {
    use entities::keys::Column;

    let mut update = entities::Keys::update_many()
        .col_expr(Column::KeyNumber, Expr::value(write.key_number))
        .col_expr(Column::Kind, Expr::value(write.kind))
        .col_expr(Column::Length, Expr::value(write.length))
        .col_expr(Column::Status, Expr::value(write.status))
        .col_expr(Column::AssignedTo, Expr::value(write.assigned_to))
        .col_expr(Column::Opmerking, Expr::value(write.opmerking))
        .col_expr(Column::UpdatedAt, Expr::value(OffsetDateTime::now_utc()))
        .filter(Column::Id.eq(id));
    if let Some(guard) = guard {
        update = update.filter(Column::Status.eq(guard.status.clone()));
        update = match guard.assigned_to {
            Some(holder) => update.filter(Column::AssignedTo.eq(holder)),
            None => update.filter(Column::AssignedTo.is_null()),
        };
    }

    let result = update.exec(txn).await?;
    if result.rows_affected > 0 {
        return Ok(());
    }
    if entities::Keys::find_by_id(id).one(txn).await?.is_none() {
        return Err(StorageError::NotFound {
            relation: "keys",
            id,
        });
    }
    Err(StorageError::Conflict {
        relation: "keys",
        id,
    })
}

async fn insert_transaction(
    txn: &DatabaseTransaction,
    entry: TransactionWrite,
) -> StorageResult<TransactionRow> {
    use entities::transactions::ActiveModel as TransactionActive;

    let active = TransactionActive {
        id: ActiveValue::Set(Uuid::now_v7()),
        employee_id: ActiveValue::Set(entry.employee_id),
        key_id: ActiveValue::Set(entry.key_id),
        action: ActiveValue::Set(entry.action),
        timestamp: ActiveValue::Set(entry.timestamp),
        notes: ActiveValue::Set(entry.notes),
        handled_by: ActiveValue::Set(entry.handled_by),
        created_at: ActiveValue::Set(OffsetDateTime::now_utc()),
        ..Default::default()
    };
    Ok(active.insert(txn).await?.into())
}

fn flatten<T>(result: Result<T, TransactionError<StorageError>>) -> StorageResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Connection(err)) => Err(err.into()),
        Err(TransactionError::Transaction(err)) => Err(err),
    }
}
