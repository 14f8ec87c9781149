//! Approval policy - decides whether approving an itinerary is admissible.
//!
//! Pure and deterministic: the verdict depends only on the figures passed in, so
//! a decision can be replayed from the values recorded at the time.

use rust_decimal::Decimal;

use crate::errors::{Error, Result};

/// Outcome of [`evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Both the event budget and the group threshold allow the cost
    Admissible,
    /// Event flight budget would be overspent
    OverBudget,
    /// The cost exceeds the group's per-itinerary cap
    OverThreshold,
}

/// Figures an approval decision is made from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyInput {
    /// Event flight budget
    pub event_flight_budget: Decimal,
    /// Percent (0-100) of the remaining group allocation one itinerary may use
    pub threshold: Decimal,
    /// Approved spend across the whole event
    pub already_spent: Decimal,
    /// Flight allocation of the itinerary's group
    pub group_allocation: Decimal,
    /// Approved spend within that group
    pub group_spent: Decimal,
    /// Total cost of the itinerary under decision
    pub proposed_cost: Decimal,
}

impl PolicyInput {
    /// Largest cost a single itinerary may have in this group.
    ///
    /// An exhausted or overdrawn group yields a cap of zero.
    ///
    /// # Errors
    /// [`Error::Validation`] if the figures overflow `Decimal`.
    pub fn threshold_cap(&self) -> Result<Decimal> {
        let remaining = self
            .group_allocation
            .checked_sub(self.group_spent)
            .ok_or_else(|| overflow("group remaining allocation"))?
            .max(Decimal::ZERO);
        remaining
            .checked_mul(self.threshold)
            .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
            .ok_or_else(|| overflow("threshold cap"))
    }

    /// Maps the verdict to the crate's error type.
    pub fn check(&self) -> Result<()> {
        match evaluate(self)? {
            Verdict::Admissible => Ok(()),
            Verdict::OverBudget => Err(Error::OverBudget {
                budget: self.event_flight_budget,
                spent: self.already_spent,
                proposed: self.proposed_cost,
            }),
            Verdict::OverThreshold => Err(Error::OverThreshold {
                cap: self.threshold_cap()?,
                proposed: self.proposed_cost,
            }),
        }
    }
}

fn overflow(what: &str) -> Error {
    Error::validation(format!("{what} is out of range"))
}

/// Evaluates an approval. The event budget is checked before the group
/// threshold; both bounds are inclusive.
///
/// # Errors
/// [`Error::Validation`] if the figures overflow `Decimal`.
pub fn evaluate(input: &PolicyInput) -> Result<Verdict> {
    let committed = input
        .already_spent
        .checked_add(input.proposed_cost)
        .ok_or_else(|| overflow("committed spend"))?;
    if committed > input.event_flight_budget {
        return Ok(Verdict::OverBudget);
    }
    if input.proposed_cost > input.threshold_cap()? {
        return Ok(Verdict::OverThreshold);
    }
    Ok(Verdict::Admissible)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use rust_decimal_macros::dec;

    fn input(proposed_cost: Decimal) -> PolicyInput {
        PolicyInput {
            event_flight_budget: dec!(1000),
            threshold: dec!(50),
            already_spent: dec!(0),
            group_allocation: dec!(1000),
            group_spent: dec!(0),
            proposed_cost,
        }
    }

    #[test]
    fn test_exact_threshold_is_admissible() {
        assert_eq!(evaluate(&input(dec!(500))).unwrap(), Verdict::Admissible);
    }

    #[test]
    fn test_one_cent_over_threshold() {
        assert_eq!(evaluate(&input(dec!(500.01))).unwrap(), Verdict::OverThreshold);
    }

    #[test]
    fn test_over_budget_takes_precedence() {
        let mut over = input(dec!(600));
        over.already_spent = dec!(600);
        assert_eq!(evaluate(&over).unwrap(), Verdict::OverBudget);
    }

    #[test]
    fn test_exact_budget_is_admissible() {
        let exact = PolicyInput {
            threshold: dec!(100),
            already_spent: dec!(400),
            ..input(dec!(600))
        };
        assert_eq!(evaluate(&exact).unwrap(), Verdict::Admissible);
    }

    #[test]
    fn test_group_spend_reduces_cap() {
        let spent = PolicyInput {
            group_spent: dec!(600),
            ..input(dec!(200.01))
        };
        assert_eq!(spent.threshold_cap().unwrap(), dec!(200));
        assert_eq!(evaluate(&spent).unwrap(), Verdict::OverThreshold);
    }

    #[test]
    fn test_overdrawn_group_caps_at_zero() {
        let overdrawn = PolicyInput {
            group_spent: dec!(1200),
            ..input(dec!(1))
        };
        assert_eq!(overdrawn.threshold_cap().unwrap(), Decimal::ZERO);
        assert_eq!(evaluate(&overdrawn).unwrap(), Verdict::OverThreshold);
    }

    #[test]
    fn test_check_maps_errors() {
        assert!(input(dec!(10)).check().is_ok());

        let err = input(dec!(500.01)).check();
        assert!(matches!(
            err,
            Err(Error::OverThreshold { cap, .. }) if cap == dec!(500)
        ));

        let err = input(dec!(1000.01)).check();
        assert!(matches!(err, Err(Error::OverBudget { .. })));
    }

    #[test]
    fn test_evaluation_is_repeatable() {
        let figures = input(dec!(321.45));
        let first = evaluate(&figures).unwrap();
        for _ in 0..10 {
            assert_eq!(evaluate(&figures).unwrap(), first);
        }
    }

    #[test]
    fn test_overflowing_figures_are_rejected() {
        let huge = PolicyInput {
            threshold: dec!(100),
            group_allocation: Decimal::MAX,
            event_flight_budget: Decimal::MAX,
            ..input(dec!(1))
        };
        assert!(matches!(huge.threshold_cap(), Err(Error::Validation { .. })));
        assert!(matches!(huge.check(), Err(Error::Validation { .. })));

        let spent = PolicyInput {
            already_spent: Decimal::MAX,
            ..input(Decimal::MAX)
        };
        assert!(matches!(evaluate(&spent), Err(Error::Validation { .. })));
    }
}
