//! Event entity - an organization's event with its travel budget.
//!
//! The three budget fields are only ever written through the budget ledger,
//! which bumps `budget_revision` on every write. Approvals bump it too, so the
//! revision doubles as the optimistic lock guarding approved spend.

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Event database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "events")]
pub struct Model {
    /// Unique identifier for the event
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning organization
    #[sea_orm(indexed)]
    pub organization_id: i64,
    /// Display name
    pub name: String,
    /// First day of the event
    pub start_date: Date,
    /// Last day of the event
    pub end_date: Date,
    /// Overall event budget
    pub total_budget: Decimal,
    /// Portion of the total budget reserved for flights
    pub flight_budget: Decimal,
    /// Percent (0-100) of a group allocation a single itinerary may consume
    pub flight_budget_threshold: Decimal,
    /// Registration cap
    pub max_attendees: i32,
    /// Bumped on every budget write and every approval
    pub budget_revision: i64,
    /// When the event was created
    pub created_at: DateTimeUtc,
    /// Soft delete marker
    pub deleted_at: Option<DateTimeUtc>,
}

/// Defines relationships between Event and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each event belongs to one organization
    #[sea_orm(
        belongs_to = "super::organization::Entity",
        from = "Column::OrganizationId",
        to = "super::organization::Column::Id"
    )]
    Organization,
    /// One event has many groups
    #[sea_orm(has_many = "super::event_group::Entity")]
    Groups,
    /// One event has many attendees
    #[sea_orm(has_many = "super::attendee::Entity")]
    Attendees,
    /// One event has many itineraries
    #[sea_orm(has_many = "super::itinerary::Entity")]
    Itineraries,
    /// One event has many budget audit rows
    #[sea_orm(has_many = "super::event_budget_audit_log::Entity")]
    BudgetAuditLogs,
}

impl Related<super::organization::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organization.def()
    }
}

impl Related<super::event_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl Related<super::attendee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attendees.def()
    }
}

impl Related<super::itinerary::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Itineraries.def()
    }
}

impl Related<super::event_budget_audit_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BudgetAuditLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
