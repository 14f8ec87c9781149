//! Booking provider seam - the narrow contract consumed from the flight API.
//!
//! Only three calls are needed: reserve an offer, cancel a hold, capture an
//! order. Cancellation and capture are best-effort from the workflow's point of
//! view; local state is authoritative.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::errors::Result;

/// A reservation returned by [`BookingProvider::reserve_offer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeldOffer {
    /// Provider reference used for later cancel / capture calls
    pub hold_reference: String,
    /// Provider-side deadline, if the provider reports one
    pub expires_at: Option<DateTime<Utc>>,
    /// Base fare as priced by the provider
    pub base_cost: Decimal,
    /// Taxes and fees as priced by the provider
    pub tax_cost: Decimal,
}

/// External flight booking capability.
///
/// Implementations map any non-success response to
/// [`Error::Provider`](crate::errors::Error::Provider).
#[async_trait]
pub trait BookingProvider: Send + Sync {
    /// Places a time-boxed hold on a priced offer.
    async fn reserve_offer(&self, offer_id: &str) -> Result<HeldOffer>;

    /// Releases a hold. Failures are logged by the caller and never block a
    /// local state change.
    async fn cancel_hold(&self, hold_reference: &str) -> Result<()>;

    /// Pays for a held order once its itinerary is approved.
    async fn capture_order(&self, hold_reference: &str) -> Result<()>;
}
