//! Event group entity - a named sub-allocation of an event's flight budget.
//!
//! Group allocations are advisory: nothing forces them to sum to the event's
//! flight budget. They bound single-itinerary cost through the threshold.

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Event group database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "event_groups")]
pub struct Model {
    /// Unique identifier for the group
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Parent event
    #[sea_orm(indexed)]
    pub event_id: i64,
    /// Name, unique among the event's active groups
    pub name: String,
    /// Flight allocation for this group
    pub flight_budget: Decimal,
    /// Soft delete marker
    pub deleted_at: Option<DateTimeUtc>,
}

/// Defines relationships between `EventGroup` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each group belongs to one event
    #[sea_orm(
        belongs_to = "super::event::Entity",
        from = "Column::EventId",
        to = "super::event::Column::Id"
    )]
    Event,
}

impl Related<super::event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Event.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
