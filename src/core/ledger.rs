//! Budget ledger - the only path that writes an event's budget fields.
//!
//! Every write updates the `events` row and appends an
//! `event_budget_audit_logs` row in the same database transaction. Concurrent
//! writers are serialized through `events.budget_revision`: a write only lands
//! if the revision it read is still current, so two editors can never both
//! record the same `previous_value`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::{
    core::access::ensure_event_planner,
    entities::{
        Event, EventBudgetAuditLog, Itinerary, event,
        event_budget_audit_log::{self, BudgetColumn},
        itinerary::{self, ApprovalStatus},
    },
    errors::{Error, Result},
};

/// Attempts made by [`update_budget_field`] before reporting a conflict.
pub const DEFAULT_WRITE_ATTEMPTS: u32 = 3;

/// Exclusive upper bound on any money amount: 100 000 000 000.
///
/// Decimal columns are stored as `REAL` on `SQLite`. An amount below this bound
/// with at most [`MAX_AMOUNT_SCALE`] decimal places has no more than 15
/// significant digits, which a double keeps exactly.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_215_752_192, 23, 0, false, 0);

/// Decimal places allowed in a money amount.
pub const MAX_AMOUNT_SCALE: u32 = 4;

/// Whether `value` survives a round trip through storage unchanged.
#[must_use]
pub fn is_storable_amount(value: Decimal) -> bool {
    value.abs() < MAX_AMOUNT && value.normalize().scale() <= MAX_AMOUNT_SCALE
}

/// [`is_storable_amount`] as a validation error naming the offending field.
pub fn check_amount(label: impl std::fmt::Display, value: Decimal) -> Result<()> {
    if is_storable_amount(value) {
        return Ok(());
    }
    Err(Error::validation(format!(
        "{label} {value} must be below {MAX_AMOUNT} with at most {MAX_AMOUNT_SCALE} decimal places"
    )))
}

/// Budget fields of one event at one revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BudgetSnapshot {
    /// Event the figures belong to
    pub event_id: i64,
    /// Overall budget
    pub total_budget: Decimal,
    /// Flight budget
    pub flight_budget: Decimal,
    /// Per-itinerary threshold percent
    pub flight_budget_threshold: Decimal,
    /// Revision these figures were read or replayed at
    pub revision: i64,
}

impl BudgetSnapshot {
    fn zero(event_id: i64) -> Self {
        Self {
            event_id,
            total_budget: Decimal::ZERO,
            flight_budget: Decimal::ZERO,
            flight_budget_threshold: Decimal::ZERO,
            revision: 0,
        }
    }

    /// Value of one field.
    #[must_use]
    pub const fn value(&self, column: BudgetColumn) -> Decimal {
        match column {
            BudgetColumn::EventTotalBudget => self.total_budget,
            BudgetColumn::EventFlightBudget => self.flight_budget,
            BudgetColumn::FlightBudgetThreshold => self.flight_budget_threshold,
        }
    }

    /// Copy with one field replaced.
    #[must_use]
    pub fn with_value(mut self, column: BudgetColumn, value: Decimal) -> Self {
        match column {
            BudgetColumn::EventTotalBudget => self.total_budget = value,
            BudgetColumn::EventFlightBudget => self.flight_budget = value,
            BudgetColumn::FlightBudgetThreshold => self.flight_budget_threshold = value,
        }
        self
    }

    /// Checks ranges, storage bounds and the `flight_budget <= total_budget`
    /// invariant.
    pub fn validate(&self) -> Result<()> {
        for column in BudgetColumn::ALL {
            if self.value(column) < Decimal::ZERO {
                return Err(Error::validation(format!("{column} must not be negative")));
            }
            check_amount(column, self.value(column))?;
        }
        if self.flight_budget_threshold > Decimal::ONE_HUNDRED {
            return Err(Error::validation(format!(
                "FlightBudgetThreshold must be between 0 and 100, got {}",
                self.flight_budget_threshold
            )));
        }
        if self.flight_budget > self.total_budget {
            return Err(Error::validation(format!(
                "flight budget {} exceeds total budget {}",
                self.flight_budget, self.total_budget
            )));
        }
        Ok(())
    }
}

impl From<&event::Model> for BudgetSnapshot {
    fn from(event: &event::Model) -> Self {
        Self {
            event_id: event.id,
            total_budget: event.total_budget,
            flight_budget: event.flight_budget,
            flight_budget_threshold: event.flight_budget_threshold,
            revision: event.budget_revision,
        }
    }
}

/// Appends one audit row. Callers run this inside the transaction that wrote
/// the event row.
pub(crate) async fn append_audit_row<C>(
    db: &C,
    event_id: i64,
    editor_user_id: i64,
    column: BudgetColumn,
    previous_value: Decimal,
    current_value: Decimal,
    revision: i64,
    now: DateTime<Utc>,
) -> Result<event_budget_audit_log::Model>
where
    C: ConnectionTrait,
{
    let row = event_budget_audit_log::ActiveModel {
        editor_user_id: Set(editor_user_id),
        event_id: Set(event_id),
        column_name: Set(column.as_str().to_string()),
        previous_value: Set(previous_value),
        current_value: Set(current_value),
        revision: Set(revision),
        changed_at: Set(now),
        ..Default::default()
    };
    Ok(row.insert(db).await?)
}

/// Moves `events.budget_revision` from `expected` to `expected + 1`.
///
/// Returns [`Error::Conflict`] if another writer got there first.
pub(crate) async fn advance_revision<C>(db: &C, event_id: i64, expected: i64) -> Result<i64>
where
    C: ConnectionTrait,
{
    let next = expected + 1;
    let result = Event::update_many()
        .col_expr(event::Column::BudgetRevision, Expr::value(next))
        .filter(event::Column::Id.eq(event_id))
        .filter(event::Column::BudgetRevision.eq(expected))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::Conflict {
            resource: format!("event {event_id} budget"),
        });
    }
    Ok(next)
}

/// Sets one budget field of an event, auditing the change.
///
/// Retries up to [`DEFAULT_WRITE_ATTEMPTS`] times when a concurrent write moves
/// the revision underneath it.
///
/// # Errors
/// * [`Error::NotFound`] - the event does not exist or is deleted
/// * [`Error::Forbidden`] - the editor may not manage the event
/// * [`Error::Validation`] - negative value, threshold outside 0-100, or a
///   flight budget above the total budget
/// * [`Error::Conflict`] - lost every optimistic-lock race
pub async fn update_budget_field(
    db: &DatabaseConnection,
    event_id: i64,
    column: BudgetColumn,
    new_value: Decimal,
    editor_user_id: i64,
    now: DateTime<Utc>,
) -> Result<BudgetSnapshot> {
    update_budget_field_with_attempts(
        db,
        event_id,
        column,
        new_value,
        editor_user_id,
        now,
        DEFAULT_WRITE_ATTEMPTS,
    )
    .await
}

/// [`update_budget_field`] with an explicit attempt limit.
#[instrument(skip(db))]
pub async fn update_budget_field_with_attempts(
    db: &DatabaseConnection,
    event_id: i64,
    column: BudgetColumn,
    new_value: Decimal,
    editor_user_id: i64,
    now: DateTime<Utc>,
    attempts: u32,
) -> Result<BudgetSnapshot> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match try_update_budget_field(db, event_id, column, new_value, editor_user_id, now).await {
            Err(Error::Conflict { resource }) if attempt < attempts => {
                warn!(attempt, %resource, "Budget write lost a race, retrying");
                attempt += 1;
            }
            other => return other,
        }
    }
}

async fn try_update_budget_field(
    db: &DatabaseConnection,
    event_id: i64,
    column: BudgetColumn,
    new_value: Decimal,
    editor_user_id: i64,
    now: DateTime<Utc>,
) -> Result<BudgetSnapshot> {
    let txn = db.begin().await?;

    let event = ensure_event_planner(&txn, editor_user_id, event_id).await?;
    let current = BudgetSnapshot::from(&event);
    let updated = current.with_value(column, new_value);
    updated.validate()?;

    let previous_value = current.value(column);
    if previous_value == new_value {
        return Ok(current);
    }

    let revision = advance_revision(&txn, event_id, event.budget_revision).await?;
    Event::update_many()
        .col_expr(column.event_column(), Expr::value(new_value))
        .filter(event::Column::Id.eq(event_id))
        .exec(&txn)
        .await?;
    append_audit_row(
        &txn,
        event_id,
        editor_user_id,
        column,
        previous_value,
        new_value,
        revision,
        now,
    )
    .await?;

    txn.commit().await?;

    info!(
        event_id,
        %column,
        previous = %previous_value,
        current = %new_value,
        revision,
        "Budget field updated"
    );
    Ok(BudgetSnapshot {
        revision,
        ..updated
    })
}

/// Current budget figures of an active event.
pub async fn get_budget_snapshot<C>(db: &C, event_id: i64) -> Result<BudgetSnapshot>
where
    C: ConnectionTrait,
{
    Event::find_by_id(event_id)
        .filter(event::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .map(|e| BudgetSnapshot::from(&e))
        .ok_or_else(|| Error::not_found("event", event_id))
}

/// Audit rows of an event in commit order.
pub async fn get_audit_history<C>(
    db: &C,
    event_id: i64,
) -> Result<Vec<event_budget_audit_log::Model>>
where
    C: ConnectionTrait,
{
    EventBudgetAuditLog::find()
        .filter(event_budget_audit_log::Column::EventId.eq(event_id))
        .order_by_asc(event_budget_audit_log::Column::Revision)
        .order_by_asc(event_budget_audit_log::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Rebuilds an event's budget history from its audit rows alone.
///
/// Starts from all-zero figures and applies each row in commit order, returning
/// the figures after every row. Fails with [`Error::Validation`] if a row's
/// `previous_value` does not match the value the prior row left behind.
pub async fn replay_budget_history<C>(db: &C, event_id: i64) -> Result<Vec<BudgetSnapshot>>
where
    C: ConnectionTrait,
{
    let rows = get_audit_history(db, event_id).await?;
    replay_rows(event_id, &rows)
}

fn replay_rows(
    event_id: i64,
    rows: &[event_budget_audit_log::Model],
) -> Result<Vec<BudgetSnapshot>> {
    let mut state = BudgetSnapshot::zero(event_id);
    let mut history = Vec::with_capacity(rows.len());

    for row in rows {
        let column = row.column().ok_or_else(|| {
            Error::validation(format!(
                "audit row {} names unknown column {}",
                row.id, row.column_name
            ))
        })?;
        if state.value(column) != row.previous_value {
            return Err(Error::validation(format!(
                "audit chain broken at row {}: {column} previous value {} but replay has {}",
                row.id,
                row.previous_value,
                state.value(column)
            )));
        }
        state = state.with_value(column, row.current_value);
        state.revision = row.revision;
        history.push(state);
    }

    Ok(history)
}

async fn approved_spend<C>(db: &C, column: itinerary::Column, id: i64) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    let approved = Itinerary::find()
        .filter(column.eq(id))
        .filter(itinerary::Column::ApprovalStatus.eq(ApprovalStatus::Approved.as_str()))
        .all(db)
        .await?;
    Ok(approved.iter().map(|i| i.total_cost).sum())
}

/// Sum of `total_cost` over an event's approved itineraries.
pub async fn approved_spend_for_event<C>(db: &C, event_id: i64) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    approved_spend(db, itinerary::Column::EventId, event_id).await
}

/// Sum of `total_cost` over a group's approved itineraries.
pub async fn approved_spend_for_group<C>(db: &C, event_group_id: i64) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    approved_spend(db, itinerary::Column::EventGroupId, event_group_id).await
}
