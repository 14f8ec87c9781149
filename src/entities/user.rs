//! User entity - a person who may attend events or plan them.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Login email
    #[sea_orm(unique)]
    pub email: String,
    /// Display name
    pub name: String,
    /// Soft delete marker; set rows are ignored by every accessor
    pub deleted_at: Option<DateTimeUtc>,
}

/// `User` is referenced by members, attendees and audit rows; it owns nothing here
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
