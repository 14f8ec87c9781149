//! Shared test utilities.
//!
//! This module provides an in-memory database, fixture builders with sensible
//! defaults and a recording [`MockProvider`] standing in for the flight API.
#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use tracing_subscriber::EnvFilter;

use crate::{
    config::WorkflowSettings,
    core::{
        attendee::{confirm_attendee, register_attendee},
        event::{NewEvent, create_event, create_event_group},
        fare_hold::CostBreakdown,
        itinerary::{ItineraryWorkflow, OfferQuote},
        provider::{BookingProvider, HeldOffer},
    },
    entities::{
        attendee, event, event_group, itinerary, itinerary::ApprovalStatus, organization,
        organization_member::{self, MemberRole},
        user,
    },
    errors::{Error, Result},
};

static NEXT_USER: AtomicU64 = AtomicU64::new(1);

/// Installs a test-writer subscriber. Later calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Fixed clock used throughout the tests: 2026-03-01 12:00 UTC.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// Creates an active user.
pub async fn create_test_user(db: &DatabaseConnection, email: &str) -> Result<user::Model> {
    let name = email.split('@').next().unwrap_or(email).to_string();
    let created = user::ActiveModel {
        email: Set(email.to_string()),
        name: Set(name),
        deleted_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(created)
}

/// Creates a fresh user holding `role` in the organization.
pub async fn create_member(
    db: &DatabaseConnection,
    organization_id: i64,
    role: MemberRole,
) -> Result<user::Model> {
    let n = NEXT_USER.fetch_add(1, Ordering::Relaxed);
    let user = create_test_user(db, &format!("{}-{n}@example.com", role.as_str())).await?;
    organization_member::ActiveModel {
        organization_id: Set(organization_id),
        user_id: Set(user.id),
        role: Set(role.as_str().to_string()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(user)
}

/// A valid event for `organization_id`.
///
/// # Defaults
/// * total budget 5000, flight budget 2000, threshold 50%
/// * 100 attendees, 2026-05-10 to 2026-05-12
pub fn new_event(organization_id: i64) -> NewEvent {
    NewEvent {
        organization_id,
        name: "Spring Summit".to_string(),
        start_date: NaiveDate::from_ymd_opt(2026, 5, 10).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2026, 5, 12).unwrap(),
        total_budget: dec!(5000),
        flight_budget: dec!(2000),
        flight_budget_threshold: dec!(50),
        max_attendees: 100,
    }
}

/// Everything most tests start from.
pub struct Fixture {
    /// In-memory database, shared with any workflow built from the fixture
    pub db: Arc<DatabaseConnection>,
    /// Owning organization
    pub organization: organization::Model,
    /// User with the planner role
    pub planner: user::Model,
    /// Event built from [`new_event`]
    pub event: event::Model,
    /// Group "Speakers" with a 2000 flight allocation
    pub group: event_group::Model,
}

/// Sets up an organization, a planner, an event and its "Speakers" group.
pub async fn setup_with_event() -> Result<Fixture> {
    setup_with_event_capacity(100).await
}

/// [`setup_with_event`] with a custom registration cap.
pub async fn setup_with_event_capacity(max_attendees: i32) -> Result<Fixture> {
    let db = setup_test_db().await?;
    let organization = organization::ActiveModel {
        name: Set("Acme Events".to_string()),
        created_at: Set(t0()),
        ..Default::default()
    }
    .insert(&db)
    .await?;
    let planner = create_member(&db, organization.id, MemberRole::Planner).await?;

    let event = create_event(
        &db,
        NewEvent {
            max_attendees,
            ..new_event(organization.id)
        },
        planner.id,
        t0(),
    )
    .await?;
    let group = create_event_group(&db, event.id, "Speakers", dec!(2000)).await?;

    Ok(Fixture {
        db: Arc::new(db),
        organization,
        planner,
        event,
        group,
    })
}

/// A second event in the fixture's organization.
pub async fn setup_second_event(fx: &Fixture) -> Result<event::Model> {
    create_event(
        &*fx.db,
        NewEvent {
            name: "Autumn Retreat".to_string(),
            ..new_event(fx.organization.id)
        },
        fx.planner.id,
        t0(),
    )
    .await
}

/// Registers a new user for the fixture event in "Speakers" and confirms them.
pub async fn create_confirmed_attendee(fx: &Fixture, email: &str) -> Result<attendee::Model> {
    let user = create_test_user(&*fx.db, email).await?;
    let registered =
        register_attendee(&*fx.db, user.id, fx.event.id, Some(fx.group.id), t0()).await?;
    confirm_attendee(&*fx.db, registered.id).await
}

/// A quote without a pass.
pub fn quote(offer_id: &str, base: Decimal, tax: Decimal) -> OfferQuote {
    OfferQuote {
        offer_id: offer_id.to_string(),
        pass_id: None,
        cost: CostBreakdown::new(base, tax),
    }
}

/// A workflow over the fixture database with default settings.
pub fn test_workflow(fx: &Fixture, provider: &Arc<MockProvider>) -> ItineraryWorkflow {
    ItineraryWorkflow::new(
        Arc::clone(&fx.db),
        Arc::clone(provider) as Arc<dyn BookingProvider>,
        WorkflowSettings::default(),
    )
}

/// An approved itinerary row, for mock query results.
pub fn approved_itinerary_model(id: i64, total_cost: Decimal) -> itinerary::Model {
    itinerary::Model {
        id,
        attendee_id: id,
        event_id: 1,
        event_group_id: 1,
        offer_id: format!("off_{id}"),
        order_id: format!("hold_off_{id}"),
        pass_id: None,
        base_cost: total_cost,
        tax_cost: Decimal::ZERO,
        total_cost,
        threshold_on_book: dec!(50),
        budget_on_book: dec!(2000),
        approval_status: ApprovalStatus::Approved.as_str().to_string(),
        denial_reason: None,
        held_at: Some(t0()),
        cancelled_at: None,
        approved_at: Some(t0()),
        expires_at: Some(t0()),
        updated_at: t0(),
    }
}

/// Recording booking provider with switchable failures.
///
/// Offers must be priced with [`MockProvider::price_offer`] before they can be
/// reserved. Hold references are `hold_{offer_id}`.
#[derive(Default)]
pub struct MockProvider {
    prices: Mutex<HashMap<String, (Decimal, Decimal)>>,
    remote_expiry: Mutex<Option<DateTime<Utc>>>,
    fail_reserve: AtomicBool,
    fail_cancel: AtomicBool,
    fail_capture: AtomicBool,
    reserved: Mutex<Vec<String>>,
    cancelled: Mutex<Vec<String>>,
    captured: Mutex<Vec<String>>,
}

impl MockProvider {
    /// Sets the price the provider will reserve `offer_id` at.
    pub fn price_offer(&self, offer_id: &str, base: Decimal, tax: Decimal) {
        self.prices
            .lock()
            .unwrap()
            .insert(offer_id.to_string(), (base, tax));
    }

    /// Deadline reported with every reservation.
    pub fn set_remote_expiry(&self, expires_at: Option<DateTime<Utc>>) {
        *self.remote_expiry.lock().unwrap() = expires_at;
    }

    /// Makes `reserve_offer` fail.
    pub fn fail_reserve(&self, fail: bool) {
        self.fail_reserve.store(fail, Ordering::SeqCst);
    }

    /// Makes `cancel_hold` fail after recording the attempt.
    pub fn fail_cancel(&self, fail: bool) {
        self.fail_cancel.store(fail, Ordering::SeqCst);
    }

    /// Makes `capture_order` fail after recording the attempt.
    pub fn fail_capture(&self, fail: bool) {
        self.fail_capture.store(fail, Ordering::SeqCst);
    }

    /// Offers reserved successfully, in call order.
    pub fn reserved(&self) -> Vec<String> {
        self.reserved.lock().unwrap().clone()
    }

    /// Hold references a cancel was attempted for.
    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    /// Hold references a capture was attempted for.
    pub fn captured(&self) -> Vec<String> {
        self.captured.lock().unwrap().clone()
    }
}

#[async_trait]
impl BookingProvider for MockProvider {
    async fn reserve_offer(&self, offer_id: &str) -> Result<HeldOffer> {
        if self.fail_reserve.load(Ordering::SeqCst) {
            return Err(Error::Provider {
                message: "reservation refused".to_string(),
            });
        }
        let (base_cost, tax_cost) = self
            .prices
            .lock()
            .unwrap()
            .get(offer_id)
            .copied()
            .ok_or_else(|| Error::Provider {
                message: format!("unknown offer {offer_id}"),
            })?;

        self.reserved.lock().unwrap().push(offer_id.to_string());
        Ok(HeldOffer {
            hold_reference: format!("hold_{offer_id}"),
            expires_at: *self.remote_expiry.lock().unwrap(),
            base_cost,
            tax_cost,
        })
    }

    async fn cancel_hold(&self, hold_reference: &str) -> Result<()> {
        self.cancelled
            .lock()
            .unwrap()
            .push(hold_reference.to_string());
        if self.fail_cancel.load(Ordering::SeqCst) {
            return Err(Error::Provider {
                message: "cancel timed out".to_string(),
            });
        }
        Ok(())
    }

    async fn capture_order(&self, hold_reference: &str) -> Result<()> {
        self.captured
            .lock()
            .unwrap()
            .push(hold_reference.to_string());
        if self.fail_capture.load(Ordering::SeqCst) {
            return Err(Error::Provider {
                message: "payment declined".to_string(),
            });
        }
        Ok(())
    }
}
