//! Itinerary workflow - hold, approve, deny and expire flight bookings.
//!
//! Every state change is a compare-and-set on `approval_status = 'pending'`, so
//! when `approve`, `deny` and the expiry sweep race on the same row exactly one
//! of them moves it. Approvals additionally advance the event's
//! `budget_revision` inside the same transaction as the live budget check, which
//! serializes approvals competing for the same remaining budget.
//!
//! Provider cancel and capture calls happen after the local commit and never
//! undo it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{error, info, instrument, warn};

use crate::{
    config::WorkflowSettings,
    core::{
        access::ensure_event_planner,
        attendee::get_active_attendee,
        event::{get_event, get_event_group_by_name},
        fare_hold::{CostBreakdown, FareHold, is_expired, release},
        ledger::{advance_revision, approved_spend_for_event, approved_spend_for_group},
        policy::PolicyInput,
        provider::BookingProvider,
    },
    entities::{
        EventGroup, Itinerary, event, event_group,
        itinerary::{self, ApprovalStatus},
    },
    errors::{Error, Result},
};

/// An offer as quoted to the attendee, before it is held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferQuote {
    /// Provider offer id
    pub offer_id: String,
    /// Optional pass / loyalty reference carried onto the itinerary
    pub pass_id: Option<String>,
    /// Quoted price
    pub cost: CostBreakdown,
}

/// Result of one [`ItineraryWorkflow::sweep_expired`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Itineraries this run moved to `expired`
    pub expired: Vec<i64>,
    /// Candidates another writer decided first
    pub skipped: usize,
}

enum ApprovalOutcome {
    Approved(itinerary::Model),
    AlreadyApproved(itinerary::Model),
    Lapsed(itinerary::Model),
}

/// Drives itineraries through `pending -> {approved, denied, expired}`.
///
/// Cloning is cheap: the connection and the provider are shared.
#[derive(Clone)]
pub struct ItineraryWorkflow {
    db: Arc<DatabaseConnection>,
    provider: Arc<dyn BookingProvider>,
    settings: WorkflowSettings,
}

impl ItineraryWorkflow {
    /// Creates a workflow over a shared database handle and a booking provider.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        provider: Arc<dyn BookingProvider>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            db,
            provider,
            settings,
        }
    }

    /// Database the workflow writes to.
    #[must_use]
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Tunables in effect.
    #[must_use]
    pub const fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Holds `quote` with the provider and records a pending itinerary.
    ///
    /// The event's current threshold and remaining flight budget are frozen onto
    /// the row. If anything fails after the provider accepted the hold, the hold
    /// is released again and no row is left behind. A previous pending
    /// itinerary whose hold lapsed by `now` is expired first instead of blocking.
    ///
    /// # Errors
    /// * [`Error::NotFound`] - event, attendee or group missing
    /// * [`Error::Validation`] - attendee unconfirmed, registered elsewhere or
    ///   assigned to a different group
    /// * [`Error::DuplicatePending`] - the attendee already has a live pending itinerary here
    /// * [`Error::InvalidCost`] / [`Error::Provider`] - from the fare hold
    #[instrument(skip(self, quote), fields(offer_id = %quote.offer_id))]
    pub async fn hold(
        &self,
        attendee_id: i64,
        event_id: i64,
        quote: &OfferQuote,
        group_name: &str,
        now: DateTime<Utc>,
    ) -> Result<itinerary::Model> {
        let group = self
            .check_hold_request(attendee_id, event_id, group_name)
            .await?;

        if let Some(lapsed) = expire_lapsed_pending(self.db(), attendee_id, event_id, now).await? {
            info!(itinerary_id = lapsed.id, "Lapsed hold expired before re-hold");
            release(self.provider.as_ref(), &lapsed.order_id).await;
        }

        let fare = FareHold::create(
            self.provider.as_ref(),
            &quote.offer_id,
            quote.cost,
            self.settings.hold_duration_seconds,
            now,
        )
        .await?;

        match self
            .persist_hold(attendee_id, event_id, &group, quote, &fare, now)
            .await
        {
            Ok((created, lapsed)) => {
                info!(
                    itinerary_id = created.id,
                    attendee_id,
                    event_id,
                    total = %created.total_cost,
                    "Itinerary held"
                );
                if let Some(lapsed) = lapsed {
                    release(self.provider.as_ref(), &lapsed.order_id).await;
                }
                Ok(created)
            }
            Err(e) => {
                warn!(error = %e, hold_reference = %fare.hold_reference, "Could not record hold");
                release(self.provider.as_ref(), &fare.hold_reference).await;
                Err(e)
            }
        }
    }

    async fn check_hold_request(
        &self,
        attendee_id: i64,
        event_id: i64,
        group_name: &str,
    ) -> Result<event_group::Model> {
        get_event(self.db(), event_id)
            .await?
            .ok_or_else(|| Error::not_found("event", event_id))?;

        let attendee = get_active_attendee(self.db(), attendee_id)
            .await?
            .ok_or_else(|| Error::not_found("attendee", attendee_id))?;
        if attendee.event_id != event_id {
            return Err(Error::validation(format!(
                "Attendee {attendee_id} is not registered for event {event_id}"
            )));
        }
        if !attendee.confirmed {
            return Err(Error::validation(format!(
                "Attendee {attendee_id} has not confirmed their invitation"
            )));
        }

        let group = get_event_group_by_name(self.db(), event_id, group_name)
            .await?
            .ok_or_else(|| Error::not_found("event group", group_name))?;
        if attendee
            .event_group_id
            .is_some_and(|assigned| assigned != group.id)
        {
            return Err(Error::validation(format!(
                "Attendee {attendee_id} is not a member of group {group_name}"
            )));
        }
        Ok(group)
    }

    async fn persist_hold(
        &self,
        attendee_id: i64,
        event_id: i64,
        group: &event_group::Model,
        quote: &OfferQuote,
        fare: &FareHold,
        now: DateTime<Utc>,
    ) -> Result<(itinerary::Model, Option<itinerary::Model>)> {
        let txn = self.db.begin().await?;

        let lapsed = expire_lapsed_pending(&txn, attendee_id, event_id, now).await?;

        let event = get_event(&txn, event_id)
            .await?
            .ok_or_else(|| Error::not_found("event", event_id))?;
        let spent = approved_spend_for_event(&txn, event_id).await?;

        let created = itinerary::ActiveModel {
            attendee_id: Set(attendee_id),
            event_id: Set(event_id),
            event_group_id: Set(group.id),
            offer_id: Set(fare.offer_id.clone()),
            order_id: Set(fare.hold_reference.clone()),
            pass_id: Set(quote.pass_id.clone()),
            base_cost: Set(fare.cost.base),
            tax_cost: Set(fare.cost.tax),
            total_cost: Set(fare.cost.total),
            threshold_on_book: Set(event.flight_budget_threshold),
            budget_on_book: Set(event.flight_budget - spent),
            approval_status: Set(fare.status.as_str().to_string()),
            denial_reason: Set(None),
            held_at: Set(Some(fare.held_at)),
            cancelled_at: Set(None),
            approved_at: Set(None),
            expires_at: Set(fare.expires_at),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok((created, lapsed))
    }

    /// Approves a pending itinerary and captures its order.
    ///
    /// Re-approving an approved itinerary succeeds without touching it or the
    /// provider. A lapsed hold is moved to `expired` before [`Error::Expired`]
    /// is returned.
    ///
    /// # Errors
    /// * [`Error::NotFound`] / [`Error::Forbidden`]
    /// * [`Error::NotPending`] - denied or expired
    /// * [`Error::Expired`] - the hold lapsed before this call
    /// * [`Error::OverBudget`] / [`Error::OverThreshold`] - live policy check failed
    /// * [`Error::Conflict`] - lost every race for the event budget
    #[instrument(skip(self))]
    pub async fn approve(
        &self,
        itinerary_id: i64,
        editor_user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<itinerary::Model> {
        let attempts = self.settings.conflict_retry_limit.max(1);
        let mut attempt = 1;
        loop {
            match self.try_approve(itinerary_id, editor_user_id, now).await {
                Err(Error::Conflict { resource }) if attempt < attempts => {
                    warn!(attempt, %resource, "Approval lost a race, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
                Ok(ApprovalOutcome::AlreadyApproved(current)) => return Ok(current),
                Ok(ApprovalOutcome::Lapsed(lapsed)) => {
                    info!(itinerary_id, "Itinerary expired before approval");
                    release(self.provider.as_ref(), &lapsed.order_id).await;
                    return Err(Error::Expired { itinerary_id });
                }
                Ok(ApprovalOutcome::Approved(approved)) => {
                    info!(itinerary_id, editor_user_id, total = %approved.total_cost, "Itinerary approved");
                    if let Err(e) = self.provider.capture_order(&approved.order_id).await {
                        error!(
                            itinerary_id,
                            hold_reference = %approved.order_id,
                            error = %e,
                            "Order capture failed after approval"
                        );
                    }
                    return Ok(approved);
                }
            }
        }
    }

    async fn try_approve(
        &self,
        itinerary_id: i64,
        editor_user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ApprovalOutcome> {
        let txn = self.db.begin().await?;

        let current = require_itinerary(&txn, itinerary_id).await?;
        let event = ensure_event_planner(&txn, editor_user_id, current.event_id).await?;

        match current.status() {
            ApprovalStatus::Pending => {}
            ApprovalStatus::Approved => return Ok(ApprovalOutcome::AlreadyApproved(current)),
            status => {
                return Err(Error::NotPending {
                    itinerary_id,
                    status,
                });
            }
        }

        if is_expired(current.status(), current.expires_at, now) {
            if !transition_pending(&txn, itinerary_id, ApprovalStatus::Expired, now, None).await? {
                return settled_elsewhere(&txn, itinerary_id).await;
            }
            let lapsed = require_itinerary(&txn, itinerary_id).await?;
            txn.commit().await?;
            return Ok(ApprovalOutcome::Lapsed(lapsed));
        }

        live_policy_input(&txn, &event, &current).await?.check()?;

        advance_revision(&txn, event.id, event.budget_revision).await?;
        if !transition_pending(&txn, itinerary_id, ApprovalStatus::Approved, now, None).await? {
            return settled_elsewhere(&txn, itinerary_id).await;
        }

        let approved = require_itinerary(&txn, itinerary_id).await?;
        txn.commit().await?;
        Ok(ApprovalOutcome::Approved(approved))
    }

    /// Denies a pending itinerary and releases its hold.
    ///
    /// A pending itinerary whose hold has already lapsed is still denied.
    ///
    /// # Errors
    /// * [`Error::NotFound`] / [`Error::Forbidden`]
    /// * [`Error::NotPending`] - already decided or expired
    #[instrument(skip(self, reason))]
    pub async fn deny(
        &self,
        itinerary_id: i64,
        editor_user_id: i64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<itinerary::Model> {
        let txn = self.db.begin().await?;

        let current = require_itinerary(&txn, itinerary_id).await?;
        ensure_event_planner(&txn, editor_user_id, current.event_id).await?;

        let status = current.status();
        if status != ApprovalStatus::Pending {
            return Err(Error::NotPending {
                itinerary_id,
                status,
            });
        }

        let reason = reason.trim();
        let reason = (!reason.is_empty()).then_some(reason);
        if !transition_pending(&txn, itinerary_id, ApprovalStatus::Denied, now, reason).await? {
            let current = require_itinerary(&txn, itinerary_id).await?;
            return Err(Error::NotPending {
                itinerary_id,
                status: current.status(),
            });
        }

        let denied = require_itinerary(&txn, itinerary_id).await?;
        txn.commit().await?;

        info!(itinerary_id, editor_user_id, "Itinerary denied");
        release(self.provider.as_ref(), &denied.order_id).await;
        Ok(denied)
    }

    /// Moves every pending itinerary whose hold lapsed by `now` to `expired` and
    /// releases the holds.
    ///
    /// Rows decided concurrently are skipped, never overwritten.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let candidates = Itinerary::find()
            .filter(itinerary::Column::ApprovalStatus.eq(ApprovalStatus::Pending.as_str()))
            .filter(itinerary::Column::ExpiresAt.lte(now))
            .order_by_asc(itinerary::Column::Id)
            .all(self.db())
            .await?;

        let mut report = SweepReport::default();
        for candidate in candidates {
            if transition_pending(self.db(), candidate.id, ApprovalStatus::Expired, now, None)
                .await?
            {
                release(self.provider.as_ref(), &candidate.order_id).await;
                report.expired.push(candidate.id);
            } else {
                report.skipped += 1;
            }
        }

        if !report.expired.is_empty() || report.skipped > 0 {
            info!(
                expired = report.expired.len(),
                skipped = report.skipped,
                "Expiry sweep finished"
            );
        }
        Ok(report)
    }

    /// Reads an itinerary, expiring it first if its hold has lapsed.
    pub async fn refresh(&self, itinerary_id: i64, now: DateTime<Utc>) -> Result<itinerary::Model> {
        let current = require_itinerary(self.db(), itinerary_id).await?;
        if !is_expired(current.status(), current.expires_at, now) {
            return Ok(current);
        }

        if transition_pending(self.db(), itinerary_id, ApprovalStatus::Expired, now, None).await? {
            info!(itinerary_id, "Itinerary expired on read");
            release(self.provider.as_ref(), &current.order_id).await;
        }
        require_itinerary(self.db(), itinerary_id).await
    }
}

/// Figures for the approval guard: live budget and spend, frozen threshold.
async fn live_policy_input<C>(
    db: &C,
    event: &event::Model,
    current: &itinerary::Model,
) -> Result<PolicyInput>
where
    C: ConnectionTrait,
{
    let group = EventGroup::find_by_id(current.event_group_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("event group", current.event_group_id))?;

    Ok(PolicyInput {
        event_flight_budget: event.flight_budget,
        threshold: current.threshold_on_book,
        already_spent: approved_spend_for_event(db, event.id).await?,
        group_allocation: group.flight_budget,
        group_spent: approved_spend_for_group(db, group.id).await?,
        proposed_cost: current.total_cost,
    })
}

/// Moves a row out of `pending` if, and only if, it is still pending.
///
/// Returns whether this call performed the move.
async fn transition_pending<C>(
    db: &C,
    itinerary_id: i64,
    to: ApprovalStatus,
    now: DateTime<Utc>,
    reason: Option<&str>,
) -> Result<bool>
where
    C: ConnectionTrait,
{
    let to = ApprovalStatus::Pending.transition(to)?;

    let mut update = Itinerary::update_many()
        .col_expr(itinerary::Column::ApprovalStatus, Expr::value(to.as_str()))
        .col_expr(itinerary::Column::UpdatedAt, Expr::value(now));
    match to {
        ApprovalStatus::Approved => {
            update = update.col_expr(itinerary::Column::ApprovedAt, Expr::value(Some(now)));
        }
        ApprovalStatus::Denied => {
            update = update
                .col_expr(itinerary::Column::CancelledAt, Expr::value(Some(now)))
                .col_expr(
                    itinerary::Column::DenialReason,
                    Expr::value(reason.map(str::to_string)),
                );
        }
        ApprovalStatus::Expired | ApprovalStatus::Pending => {}
    }

    let result = update
        .filter(itinerary::Column::Id.eq(itinerary_id))
        .filter(itinerary::Column::ApprovalStatus.eq(ApprovalStatus::Pending.as_str()))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Resolves a lost compare-and-set: another writer decided the row first.
async fn settled_elsewhere<C>(db: &C, itinerary_id: i64) -> Result<ApprovalOutcome>
where
    C: ConnectionTrait,
{
    let current = require_itinerary(db, itinerary_id).await?;
    match current.status() {
        ApprovalStatus::Approved => Ok(ApprovalOutcome::AlreadyApproved(current)),
        status => Err(Error::NotPending {
            itinerary_id,
            status,
        }),
    }
}

async fn require_itinerary<C>(db: &C, itinerary_id: i64) -> Result<itinerary::Model>
where
    C: ConnectionTrait,
{
    get_itinerary(db, itinerary_id)
        .await?
        .ok_or_else(|| Error::not_found("itinerary", itinerary_id))
}

async fn find_pending<C>(db: &C, attendee_id: i64, event_id: i64) -> Result<Option<itinerary::Model>>
where
    C: ConnectionTrait,
{
    Itinerary::find()
        .filter(itinerary::Column::AttendeeId.eq(attendee_id))
        .filter(itinerary::Column::EventId.eq(event_id))
        .filter(itinerary::Column::ApprovalStatus.eq(ApprovalStatus::Pending.as_str()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Makes room for a new hold by the attendee.
///
/// A pending itinerary whose hold lapsed by `now` is moved to `expired` and
/// returned so the caller can release it; a live one is a duplicate.
async fn expire_lapsed_pending<C>(
    db: &C,
    attendee_id: i64,
    event_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<itinerary::Model>>
where
    C: ConnectionTrait,
{
    let Some(pending) = find_pending(db, attendee_id, event_id).await? else {
        return Ok(None);
    };
    if !is_expired(pending.status(), pending.expires_at, now) {
        return Err(Error::DuplicatePending {
            attendee_id,
            event_id,
        });
    }

    // A lost race means another writer already decided the row.
    let moved = transition_pending(db, pending.id, ApprovalStatus::Expired, now, None).await?;
    Ok(moved.then_some(pending))
}

/// Finds an itinerary by id, in any state.
pub async fn get_itinerary<C>(db: &C, itinerary_id: i64) -> Result<Option<itinerary::Model>>
where
    C: ConnectionTrait,
{
    Itinerary::find_by_id(itinerary_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// An attendee's itineraries, newest hold first.
pub async fn list_itineraries_for_attendee<C>(
    db: &C,
    attendee_id: i64,
) -> Result<Vec<itinerary::Model>>
where
    C: ConnectionTrait,
{
    Itinerary::find()
        .filter(itinerary::Column::AttendeeId.eq(attendee_id))
        .order_by_desc(itinerary::Column::HeldAt)
        .order_by_desc(itinerary::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Pending itineraries of an event, soonest deadline first.
pub async fn list_pending_for_event<C>(db: &C, event_id: i64) -> Result<Vec<itinerary::Model>>
where
    C: ConnectionTrait,
{
    Itinerary::find()
        .filter(itinerary::Column::EventId.eq(event_id))
        .filter(itinerary::Column::ApprovalStatus.eq(ApprovalStatus::Pending.as_str()))
        .order_by_asc(itinerary::Column::ExpiresAt)
        .order_by_asc(itinerary::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
