//! Itinerary entity - one attendee's flight booking attempt.
//!
//! An itinerary is created `pending` when a fare is held and ends in exactly
//! one of `approved`, `denied` or `expired`. The `*_on_book` columns are
//! frozen at hold time and never rewritten.

use std::fmt;

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle state of an itinerary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    /// Fare held, awaiting a planner decision
    Pending,
    /// Planner denied; hold released
    Denied,
    /// Planner approved; order captured
    Approved,
    /// Hold lapsed without a decision
    Expired,
}

impl ApprovalStatus {
    /// Value stored in the `approval_status` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Denied => "denied",
            Self::Approved => "approved",
            Self::Expired => "expired",
        }
    }

    /// Parses a stored `approval_status` value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "denied" => Some(Self::Denied),
            "approved" => Some(Self::Approved),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Terminal states admit no outgoing transition.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Validates a move to `to`. Only `pending` may move, and never back to
    /// `pending`.
    pub fn transition(self, to: Self) -> crate::errors::Result<Self> {
        if self.is_terminal() || matches!(to, Self::Pending) {
            return Err(crate::errors::Error::InvalidTransition { from: self, to });
        }
        Ok(to)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Itinerary database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "itineraries")]
pub struct Model {
    /// Unique identifier for the itinerary
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Traveller
    #[sea_orm(indexed)]
    pub attendee_id: i64,
    /// Event the travel is for
    #[sea_orm(indexed)]
    pub event_id: i64,
    /// Group whose allocation the itinerary draws on
    pub event_group_id: i64,
    /// Provider offer that was held
    pub offer_id: String,
    /// Provider order created by the hold; the hold reference for cancel/capture
    pub order_id: String,
    /// Optional provider pass / loyalty reference from the quote
    pub pass_id: Option<String>,
    /// Base fare
    pub base_cost: Decimal,
    /// Taxes and fees
    pub tax_cost: Decimal,
    /// `base_cost + tax_cost`
    pub total_cost: Decimal,
    /// Event threshold percent when the fare was held
    pub threshold_on_book: Decimal,
    /// Remaining event flight budget when the fare was held
    pub budget_on_book: Decimal,
    /// One of `pending`, `denied`, `approved`, `expired`
    #[sea_orm(indexed)]
    pub approval_status: String,
    /// Reason recorded with a denial
    pub denial_reason: Option<String>,
    /// When the fare was held
    pub held_at: Option<DateTimeUtc>,
    /// When a planner denied the itinerary
    pub cancelled_at: Option<DateTimeUtc>,
    /// When a planner approved the itinerary
    pub approved_at: Option<DateTimeUtc>,
    /// When the hold lapses
    pub expires_at: Option<DateTimeUtc>,
    /// Last state change
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Typed status. Unknown stored values are reported as `expired` so that
    /// they are never treated as decidable.
    #[must_use]
    pub fn status(&self) -> ApprovalStatus {
        ApprovalStatus::parse(&self.approval_status).unwrap_or(ApprovalStatus::Expired)
    }
}

/// Defines relationships between Itinerary and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each itinerary belongs to one attendee
    #[sea_orm(
        belongs_to = "super::attendee::Entity",
        from = "Column::AttendeeId",
        to = "super::attendee::Column::Id"
    )]
    Attendee,
    /// Each itinerary belongs to one event
    #[sea_orm(
        belongs_to = "super::event::Entity",
        from = "Column::EventId",
        to = "super::event::Column::Id"
    )]
    Event,
    /// Each itinerary draws on one group allocation
    #[sea_orm(
        belongs_to = "super::event_group::Entity",
        from = "Column::EventGroupId",
        to = "super::event_group::Column::Id"
    )]
    EventGroup,
}

impl Related<super::attendee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attendee.def()
    }
}

impl Related<super::event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Event.def()
    }
}

impl Related<super::event_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EventGroup.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
