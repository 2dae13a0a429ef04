use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "keys")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub key_number: String,
    #[sea_orm(column_name = "type")]
    pub kind: String,
    pub length: String,
    pub status: String,
    /// Plain column, not a foreign key: the store clears it before an
    /// employee row goes away.
    pub assigned_to: Option<Uuid>,
    pub opmerking: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ActiveModelBehavior for ActiveModel {}
