//! Attendee entity - a user's registration for one event.
//!
//! Attendees are never hard-deleted; itineraries and audit rows keep pointing
//! at them after `deleted_at` is set.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Attendee database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attendees")]
pub struct Model {
    /// Unique identifier for the attendee
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Registered user
    pub user_id: i64,
    /// Event registered for
    #[sea_orm(indexed)]
    pub event_id: i64,
    /// Group assignment, absent until a planner places the attendee
    pub event_group_id: Option<i64>,
    /// Whether the invitation was accepted
    pub confirmed: bool,
    /// When the registration was created
    pub created_at: DateTimeUtc,
    /// Soft delete marker
    pub deleted_at: Option<DateTimeUtc>,
}

/// Defines relationships between Attendee and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each attendee belongs to one event
    #[sea_orm(
        belongs_to = "super::event::Entity",
        from = "Column::EventId",
        to = "super::event::Column::Id"
    )]
    Event,
    /// Each attendee is one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    /// One attendee has many itineraries (rebooking history)
    #[sea_orm(has_many = "super::itinerary::Entity")]
    Itineraries,
}

impl Related<super::event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Event.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::itinerary::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Itineraries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
