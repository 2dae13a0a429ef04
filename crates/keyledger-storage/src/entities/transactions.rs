use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// Ledger rows keep their employee/key ids after those rows are deleted,
/// so neither reference is declared as a relation.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub employee_id: Uuid,
    pub key_id: Uuid,
    pub action: String,
    pub timestamp: OffsetDateTime,
    pub notes: Option<String>,
    pub handled_by: Option<String>,
    pub created_at: OffsetDateTime,
}

impl ActiveModelBehavior for ActiveModel {}
