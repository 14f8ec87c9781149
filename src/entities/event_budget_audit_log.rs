//! Event budget audit log - one immutable row per budget field write.
//!
//! Rows are append-only. `revision` is the event's `budget_revision` produced by
//! the write, which orders a given event's rows by commit order.

use std::fmt;

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Budget field named by an audit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BudgetColumn {
    /// `events.total_budget`
    EventTotalBudget,
    /// `events.flight_budget`
    EventFlightBudget,
    /// `events.flight_budget_threshold`
    FlightBudgetThreshold,
}

impl BudgetColumn {
    /// All budget fields, in a fixed order.
    pub const ALL: [Self; 3] = [
        Self::EventTotalBudget,
        Self::EventFlightBudget,
        Self::FlightBudgetThreshold,
    ];

    /// Value stored in the `column_name` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EventTotalBudget => "EventTotalBudget",
            Self::EventFlightBudget => "EventFlightBudget",
            Self::FlightBudgetThreshold => "FlightBudgetThreshold",
        }
    }

    /// Parses a stored `column_name` value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }

    /// The `events` column this field is persisted in.
    #[must_use]
    pub const fn event_column(self) -> super::event::Column {
        match self {
            Self::EventTotalBudget => super::event::Column::TotalBudget,
            Self::EventFlightBudget => super::event::Column::FlightBudget,
            Self::FlightBudgetThreshold => super::event::Column::FlightBudgetThreshold,
        }
    }
}

impl fmt::Display for BudgetColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Budget audit database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "event_budget_audit_logs")]
pub struct Model {
    /// Unique identifier for the audit row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User who made the change
    pub editor_user_id: i64,
    /// Event whose budget changed
    #[sea_orm(indexed)]
    pub event_id: i64,
    /// One of `EventTotalBudget`, `EventFlightBudget`, `FlightBudgetThreshold`
    pub column_name: String,
    /// Value before the write
    pub previous_value: Decimal,
    /// Value after the write
    pub current_value: Decimal,
    /// Event budget revision produced by the write
    pub revision: i64,
    /// When the write committed
    pub changed_at: DateTimeUtc,
}

impl Model {
    /// Typed column name.
    #[must_use]
    pub fn column(&self) -> Option<BudgetColumn> {
        BudgetColumn::parse(&self.column_name)
    }
}

/// Defines relationships between audit rows and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each audit row belongs to one event
    #[sea_orm(
        belongs_to = "super::event::Entity",
        from = "Column::EventId",
        to = "super::event::Column::Id"
    )]
    Event,
    /// Each audit row names its editor
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::EditorUserId",
        to = "super::user::Column::Id"
    )]
    Editor,
}

impl Related<super::event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Event.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Editor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
