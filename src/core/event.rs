//! Event business logic - creating events and their groups.
//!
//! Events start from an all-zero budget in the audit trail: creation appends one
//! audit row per non-zero initial budget field so the full budget history can be
//! replayed from audit rows alone.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

use crate::{
    core::{
        access::ensure_organization_planner,
        ledger::{BudgetSnapshot, append_audit_row, check_amount},
    },
    entities::{
        Event, EventGroup, event, event_budget_audit_log::BudgetColumn, event_group,
    },
    errors::{Error, Result},
};

/// Input for [`create_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    /// Owning organization
    pub organization_id: i64,
    /// Display name
    pub name: String,
    /// First day
    pub start_date: NaiveDate,
    /// Last day
    pub end_date: NaiveDate,
    /// Overall budget
    pub total_budget: Decimal,
    /// Flight budget, at most `total_budget`
    pub flight_budget: Decimal,
    /// Per-itinerary threshold percent, 0-100
    pub flight_budget_threshold: Decimal,
    /// Registration cap
    pub max_attendees: i32,
}

/// Creates an event on behalf of a planner of its organization.
#[instrument(skip(db, new_event), fields(name = %new_event.name))]
pub async fn create_event(
    db: &DatabaseConnection,
    new_event: NewEvent,
    creator_user_id: i64,
    now: DateTime<Utc>,
) -> Result<event::Model> {
    let name = new_event.name.trim().to_string();
    if name.is_empty() {
        return Err(Error::validation("Event name cannot be empty"));
    }
    if new_event.end_date < new_event.start_date {
        return Err(Error::validation("Event cannot end before it starts"));
    }
    if new_event.max_attendees <= 0 {
        return Err(Error::validation("max_attendees must be positive"));
    }

    let initial = BudgetSnapshot {
        event_id: 0,
        total_budget: new_event.total_budget,
        flight_budget: new_event.flight_budget,
        flight_budget_threshold: new_event.flight_budget_threshold,
        revision: 0,
    };
    initial.validate()?;

    let txn = db.begin().await?;
    ensure_organization_planner(&txn, creator_user_id, new_event.organization_id).await?;

    let inserted = event::ActiveModel {
        organization_id: Set(new_event.organization_id),
        name: Set(name),
        start_date: Set(new_event.start_date),
        end_date: Set(new_event.end_date),
        total_budget: Set(new_event.total_budget),
        flight_budget: Set(new_event.flight_budget),
        flight_budget_threshold: Set(new_event.flight_budget_threshold),
        max_attendees: Set(new_event.max_attendees),
        budget_revision: Set(0),
        created_at: Set(now),
        deleted_at: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut revision = 0;
    for column in BudgetColumn::ALL {
        let value = initial.value(column);
        if value.is_zero() {
            continue;
        }
        revision += 1;
        append_audit_row(
            &txn,
            inserted.id,
            creator_user_id,
            column,
            Decimal::ZERO,
            value,
            revision,
            now,
        )
        .await?;
    }

    let mut active: event::ActiveModel = inserted.into();
    active.budget_revision = Set(revision);
    let created = active.update(&txn).await?;

    txn.commit().await?;
    info!(event_id = created.id, "Event created");
    Ok(created)
}

/// Finds an active event by id.
pub async fn get_event<C>(db: &C, event_id: i64) -> Result<Option<event::Model>>
where
    C: ConnectionTrait,
{
    Event::find_by_id(event_id)
        .filter(event::Column::DeletedAt.is_null())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a named group with its own flight allocation.
///
/// Names are trimmed and must be unique among the event's active groups.
pub async fn create_event_group(
    db: &DatabaseConnection,
    event_id: i64,
    name: &str,
    flight_budget: Decimal,
) -> Result<event_group::Model> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("Group name cannot be empty"));
    }
    if flight_budget < Decimal::ZERO {
        return Err(Error::validation("Group flight budget must not be negative"));
    }
    check_amount("Group flight budget", flight_budget)?;

    get_event(db, event_id)
        .await?
        .ok_or_else(|| Error::not_found("event", event_id))?;

    if get_event_group_by_name(db, event_id, name).await?.is_some() {
        return Err(Error::validation(format!(
            "Group '{name}' already exists for event {event_id}"
        )));
    }

    let group = event_group::ActiveModel {
        event_id: Set(event_id),
        name: Set(name.to_string()),
        flight_budget: Set(flight_budget),
        deleted_at: Set(None),
        ..Default::default()
    };
    Ok(group.insert(db).await?)
}

/// Finds an active group of an event by name.
pub async fn get_event_group_by_name<C>(
    db: &C,
    event_id: i64,
    name: &str,
) -> Result<Option<event_group::Model>>
where
    C: ConnectionTrait,
{
    EventGroup::find()
        .filter(event_group::Column::EventId.eq(event_id))
        .filter(event_group::Column::Name.eq(name.trim()))
        .filter(event_group::Column::DeletedAt.is_null())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists an event's active groups alphabetically.
pub async fn list_event_groups<C>(db: &C, event_id: i64) -> Result<Vec<event_group::Model>>
where
    C: ConnectionTrait,
{
    EventGroup::find()
        .filter(event_group::Column::EventId.eq(event_id))
        .filter(event_group::Column::DeletedAt.is_null())
        .order_by_asc(event_group::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}
