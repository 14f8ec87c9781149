//! Organization entity - the tenant that owns events and employs planners.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Organization database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "organizations")]
pub struct Model {
    /// Unique identifier for the organization
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// When the organization was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Organization and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One organization runs many events
    #[sea_orm(has_many = "super::event::Entity")]
    Events,
    /// One organization has many members
    #[sea_orm(has_many = "super::organization_member::Entity")]
    Members,
}

impl Related<super::event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Events.def()
    }
}

impl Related<super::organization_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
