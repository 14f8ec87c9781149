//! Fare holds - priced offers reserved with the provider for a bounded window.
//!
//! A hold keeps no timer of its own. Expiry is noticed by whoever next reads the
//! itinerary, or by the periodic sweep.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};

use crate::core::ledger::is_storable_amount;
use crate::core::provider::BookingProvider;
use crate::entities::itinerary::ApprovalStatus;
use crate::errors::{Error, Result};

/// Quoted price of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostBreakdown {
    /// Base fare
    pub base: Decimal,
    /// Taxes and fees
    pub tax: Decimal,
    /// Amount charged; must equal `base + tax`
    pub total: Decimal,
}

impl CostBreakdown {
    /// Builds a breakdown whose total is the sum of its parts.
    #[must_use]
    pub fn new(base: Decimal, tax: Decimal) -> Self {
        Self {
            base,
            tax,
            total: base + tax,
        }
    }

    /// Rejects negative components, totals that do not add up and amounts
    /// outside [`MAX_AMOUNT`](crate::core::ledger::MAX_AMOUNT).
    pub fn validate(&self) -> Result<()> {
        if self.base.is_sign_negative()
            || self.tax.is_sign_negative()
            || self.base + self.tax != self.total
            || ![self.base, self.tax, self.total]
                .into_iter()
                .all(is_storable_amount)
        {
            return Err(Error::InvalidCost {
                base: self.base,
                tax: self.tax,
                total: self.total,
            });
        }
        Ok(())
    }
}

/// A held fare, ready to be persisted as a pending itinerary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FareHold {
    /// Offer that was reserved
    pub offer_id: String,
    /// Provider reference for cancel / capture
    pub hold_reference: String,
    /// Price of the hold
    pub cost: CostBreakdown,
    /// When the hold was placed
    pub held_at: DateTime<Utc>,
    /// When the hold lapses
    pub expires_at: Option<DateTime<Utc>>,
    /// Always `pending` for a fresh hold
    pub status: ApprovalStatus,
}

impl FareHold {
    /// Reserves `offer_id` with the provider.
    ///
    /// The hold expires after `hold_duration_seconds`, or earlier if the provider
    /// reports an earlier deadline. A reservation priced differently from the
    /// quote is released again and reported as a provider error.
    #[instrument(skip(provider, cost))]
    pub async fn create(
        provider: &dyn BookingProvider,
        offer_id: &str,
        cost: CostBreakdown,
        hold_duration_seconds: i64,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        cost.validate()?;
        if hold_duration_seconds <= 0 {
            return Err(Error::validation("hold duration must be positive"));
        }

        let held = provider.reserve_offer(offer_id).await?;

        if held.base_cost != cost.base || held.tax_cost != cost.tax {
            warn!(
                offer_id,
                quoted_base = %cost.base,
                quoted_tax = %cost.tax,
                held_base = %held.base_cost,
                held_tax = %held.tax_cost,
                "Offer repriced during reservation; releasing hold"
            );
            release(provider, &held.hold_reference).await;
            return Err(Error::Provider {
                message: format!("offer {offer_id} was repriced during reservation"),
            });
        }

        let local_deadline = now + Duration::seconds(hold_duration_seconds);
        let expires_at = held
            .expires_at
            .map_or(local_deadline, |remote| remote.min(local_deadline));

        debug!(offer_id, hold_reference = %held.hold_reference, %expires_at, "Fare held");
        Ok(Self {
            offer_id: offer_id.to_string(),
            hold_reference: held.hold_reference,
            cost,
            held_at: now,
            expires_at: Some(expires_at),
            status: ApprovalStatus::Pending,
        })
    }
}

/// Whether a hold in `status` with deadline `expires_at` has lapsed at `now`.
#[must_use]
pub fn is_expired(
    status: ApprovalStatus,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    status == ApprovalStatus::Pending && expires_at.is_some_and(|deadline| now >= deadline)
}

/// Cancels a hold upstream, logging instead of propagating failure.
pub async fn release(provider: &dyn BookingProvider, hold_reference: &str) {
    if let Err(e) = provider.cancel_hold(hold_reference).await {
        warn!(hold_reference, error = %e, "Failed to cancel hold upstream");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::MockProvider;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_cost_validation() {
        assert!(CostBreakdown::new(dec!(100), dec!(20)).validate().is_ok());

        let mismatched = CostBreakdown {
            base: dec!(100),
            tax: dec!(20),
            total: dec!(121),
        };
        assert!(matches!(
            mismatched.validate(),
            Err(Error::InvalidCost { .. })
        ));

        let negative = CostBreakdown::new(dec!(-1), dec!(20));
        assert!(matches!(negative.validate(), Err(Error::InvalidCost { .. })));

        let huge = CostBreakdown::new(dec!(99999999999), dec!(1));
        assert!(matches!(huge.validate(), Err(Error::InvalidCost { .. })));

        let fractional = CostBreakdown::new(dec!(100.00001), dec!(0));
        assert!(matches!(fractional.validate(), Err(Error::InvalidCost { .. })));
    }

    #[tokio::test]
    async fn test_create_sets_clock() -> Result<()> {
        let provider = MockProvider::default();
        provider.price_offer("off_1", dec!(400), dec!(50));
        let hold = FareHold::create(
            &provider,
            "off_1",
            CostBreakdown::new(dec!(400), dec!(50)),
            600,
            t0(),
        )
        .await?;

        assert_eq!(hold.held_at, t0());
        assert_eq!(hold.expires_at, Some(t0() + Duration::seconds(600)));
        assert_eq!(hold.status, ApprovalStatus::Pending);
        assert_eq!(hold.cost.total, dec!(450));
        assert_eq!(provider.reserved(), vec!["off_1".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_provider_deadline_wins_when_earlier() -> Result<()> {
        let provider = MockProvider::default();
        provider.price_offer("off_1", dec!(400), dec!(50));
        provider.set_remote_expiry(Some(t0() + Duration::seconds(60)));

        let hold = FareHold::create(
            &provider,
            "off_1",
            CostBreakdown::new(dec!(400), dec!(50)),
            600,
            t0(),
        )
        .await?;
        assert_eq!(hold.expires_at, Some(t0() + Duration::seconds(60)));
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_cost_never_reaches_provider() {
        let provider = MockProvider::default();
        let cost = CostBreakdown {
            base: dec!(100),
            tax: dec!(20),
            total: dec!(100),
        };
        let result = FareHold::create(&provider, "off_1", cost, 600, t0()).await;
        assert!(matches!(result, Err(Error::InvalidCost { .. })));
        assert!(provider.reserved().is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let provider = MockProvider::default();
        provider.price_offer("off_1", dec!(100), dec!(20));
        provider.fail_reserve(true);
        let result = FareHold::create(
            &provider,
            "off_1",
            CostBreakdown::new(dec!(100), dec!(20)),
            600,
            t0(),
        )
        .await;
        assert!(matches!(result, Err(Error::Provider { .. })));
    }

    #[tokio::test]
    async fn test_repriced_offer_is_released() {
        let provider = MockProvider::default();
        provider.price_offer("off_1", dec!(150), dec!(20));
        let result = FareHold::create(
            &provider,
            "off_1",
            CostBreakdown::new(dec!(100), dec!(20)),
            600,
            t0(),
        )
        .await;
        assert!(matches!(result, Err(Error::Provider { .. })));
        assert_eq!(provider.cancelled(), vec!["hold_off_1".to_string()]);
    }

    #[test]
    fn test_is_expired() {
        let deadline = Some(t0());
        assert!(!is_expired(
            ApprovalStatus::Pending,
            deadline,
            t0() - Duration::seconds(1)
        ));
        assert!(is_expired(ApprovalStatus::Pending, deadline, t0()));
        assert!(!is_expired(ApprovalStatus::Approved, deadline, t0()));
        assert!(!is_expired(ApprovalStatus::Pending, None, t0()));
    }
}
