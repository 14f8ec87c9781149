//! Attendee business logic - registration, confirmation and soft deletion.
//!
//! Attendees are never hard-deleted. Every accessor filters on `deleted_at`
//! explicitly.

use chrono::{DateTime, Utc};
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

use crate::{
    core::event::get_event,
    entities::{Attendee, EventGroup, User, attendee, event_group, user},
    errors::{Error, Result},
};

/// Finds an active attendee by id.
pub async fn get_active_attendee<C>(db: &C, attendee_id: i64) -> Result<Option<attendee::Model>>
where
    C: ConnectionTrait,
{
    Attendee::find_by_id(attendee_id)
        .filter(attendee::Column::DeletedAt.is_null())
        .one(db)
        .await
        .map_err(Into::into)
}

async fn require_active_attendee<C>(db: &C, attendee_id: i64) -> Result<attendee::Model>
where
    C: ConnectionTrait,
{
    get_active_attendee(db, attendee_id)
        .await?
        .ok_or_else(|| Error::not_found("attendee", attendee_id))
}

async fn require_group_of_event<C>(db: &C, group_id: i64, event_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    EventGroup::find_by_id(group_id)
        .filter(event_group::Column::EventId.eq(event_id))
        .filter(event_group::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .map(|_| ())
        .ok_or_else(|| Error::not_found("event group", group_id))
}

/// Registers a user for an event, unconfirmed.
///
/// A user may hold one active registration per event, and registrations stop
/// at the event's `max_attendees`.
#[instrument(skip(db))]
pub async fn register_attendee(
    db: &DatabaseConnection,
    user_id: i64,
    event_id: i64,
    event_group_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<attendee::Model> {
    let txn = db.begin().await?;

    let event = get_event(&txn, event_id)
        .await?
        .ok_or_else(|| Error::not_found("event", event_id))?;

    User::find_by_id(user_id)
        .filter(user::Column::DeletedAt.is_null())
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;

    if let Some(group_id) = event_group_id {
        require_group_of_event(&txn, group_id, event_id).await?;
    }

    let active = Attendee::find()
        .filter(attendee::Column::EventId.eq(event_id))
        .filter(attendee::Column::DeletedAt.is_null());

    if active
        .clone()
        .filter(attendee::Column::UserId.eq(user_id))
        .one(&txn)
        .await?
        .is_some()
    {
        return Err(Error::validation(format!(
            "User {user_id} is already registered for event {event_id}"
        )));
    }

    let registered = active.count(&txn).await?;
    if registered >= u64::try_from(event.max_attendees).unwrap_or(0) {
        return Err(Error::validation(format!(
            "Event {event_id} is full ({} attendees)",
            event.max_attendees
        )));
    }

    let created = attendee::ActiveModel {
        user_id: Set(user_id),
        event_id: Set(event_id),
        event_group_id: Set(event_group_id),
        confirmed: Set(false),
        created_at: Set(now),
        deleted_at: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(attendee_id = created.id, "Attendee registered");
    Ok(created)
}

/// Marks an attendee's invitation as accepted.
pub async fn confirm_attendee(db: &DatabaseConnection, attendee_id: i64) -> Result<attendee::Model> {
    let found = require_active_attendee(db, attendee_id).await?;
    if found.confirmed {
        return Ok(found);
    }
    let mut active: attendee::ActiveModel = found.into();
    active.confirmed = Set(true);
    Ok(active.update(db).await?)
}

/// Places an attendee in one of their event's groups.
pub async fn assign_attendee_group(
    db: &DatabaseConnection,
    attendee_id: i64,
    event_group_id: i64,
) -> Result<attendee::Model> {
    let found = require_active_attendee(db, attendee_id).await?;
    require_group_of_event(db, event_group_id, found.event_id).await?;

    let mut active: attendee::ActiveModel = found.into();
    active.event_group_id = Set(Some(event_group_id));
    Ok(active.update(db).await?)
}

/// Soft-deletes an attendee. Itineraries keep referencing the row.
pub async fn soft_delete_attendee(
    db: &DatabaseConnection,
    attendee_id: i64,
    now: DateTime<Utc>,
) -> Result<attendee::Model> {
    let found = require_active_attendee(db, attendee_id).await?;
    let mut active: attendee::ActiveModel = found.into();
    active.deleted_at = Set(Some(now));
    let deleted = active.update(db).await?;
    info!(attendee_id, "Attendee soft-deleted");
    Ok(deleted)
}

/// Lists an event's active attendees in registration order.
pub async fn list_active_attendees<C>(db: &C, event_id: i64) -> Result<Vec<attendee::Model>>
where
    C: ConnectionTrait,
{
    Attendee::find()
        .filter(attendee::Column::EventId.eq(event_id))
        .filter(attendee::Column::DeletedAt.is_null())
        .order_by_asc(attendee::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
