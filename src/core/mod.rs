//! Core business logic - framework-agnostic budget ledger and itinerary workflow.
//! Functions here take a database handle and an explicit `now`; nothing reads
//! the wall clock except the background sweeper.

pub mod access;
pub mod attendee;
pub mod event;
pub mod fare_hold;
pub mod itinerary;
pub mod ledger;
pub mod policy;
pub mod provider;
pub mod sweeper;

pub use fare_hold::{CostBreakdown, FareHold};
pub use itinerary::{ItineraryWorkflow, OfferQuote, SweepReport};
pub use ledger::{BudgetSnapshot, update_budget_field};
pub use policy::{PolicyInput, Verdict, evaluate};
pub use provider::{BookingProvider, HeldOffer};
pub use sweeper::spawn_expiry_sweeper;
