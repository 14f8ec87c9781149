//! Unified error type for the itinerary workflow and budget ledger.
//!
//! Variants are grouped the way callers react to them: input problems,
//! missing rows, state-machine contract violations, policy rejections and
//! failures of the external booking provider.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::entities::itinerary::ApprovalStatus;

/// All errors produced by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad input shape or range
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable explanation
        message: String,
    },

    /// Cost components do not add up or are negative
    #[error("Invalid cost: base {base} + tax {tax} must equal total {total} and be non-negative")]
    InvalidCost {
        /// Base fare
        base: Decimal,
        /// Taxes and fees
        tax: Decimal,
        /// Quoted total
        total: Decimal,
    },

    /// A referenced row does not exist (or is soft-deleted)
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record looked up
        entity: &'static str,
        /// Identifier used for the lookup
        id: String,
    },

    /// Attempted to move an itinerary along an edge the state machine lacks
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current state
        from: ApprovalStatus,
        /// Requested state
        to: ApprovalStatus,
    },

    /// The itinerary has already left `pending`
    #[error("Itinerary {itinerary_id} is not pending (status: {status})")]
    NotPending {
        /// Itinerary id
        itinerary_id: i64,
        /// Status found at decision time
        status: ApprovalStatus,
    },

    /// The attendee already holds a pending itinerary for the event
    #[error("Attendee {attendee_id} already has a pending itinerary for event {event_id}")]
    DuplicatePending {
        /// Attendee id
        attendee_id: i64,
        /// Event id
        event_id: i64,
    },

    /// The fare hold lapsed before a decision was made
    #[error("Itinerary {itinerary_id} expired before approval")]
    Expired {
        /// Itinerary id
        itinerary_id: i64,
    },

    /// Approving would overspend the event flight budget
    #[error("Over budget: spent {spent} + proposed {proposed} exceeds flight budget {budget}")]
    OverBudget {
        /// Event flight budget
        budget: Decimal,
        /// Already approved spend
        spent: Decimal,
        /// Cost being approved
        proposed: Decimal,
    },

    /// A single itinerary would exceed its share of the group allocation
    #[error("Over threshold: proposed {proposed} exceeds per-itinerary cap {cap}")]
    OverThreshold {
        /// Largest admissible cost
        cap: Decimal,
        /// Cost being approved
        proposed: Decimal,
    },

    /// The booking provider rejected or failed a call
    #[error("Provider error: {message}")]
    Provider {
        /// Provider-supplied or local explanation
        message: String,
    },

    /// The user may not manage the organization's events
    #[error("User {user_id} may not manage events of organization {organization_id}")]
    Forbidden {
        /// Acting user
        user_id: i64,
        /// Organization owning the target event
        organization_id: i64,
    },

    /// Optimistic lock kept losing to concurrent writers
    #[error("Concurrent update conflict on {resource}")]
    Conflict {
        /// What was contended
        resource: String,
    },

    /// Configuration could not be read or is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable explanation
        message: String,
    },

    /// Storage failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl Error {
    /// Shorthand for a [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a [`Error::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether the caller may reasonably retry the same request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider { .. } | Self::Conflict { .. })
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(
            Error::Provider {
                message: "timeout".to_string()
            }
            .is_retryable()
        );
        assert!(
            Error::Conflict {
                resource: "event 1".to_string()
            }
            .is_retryable()
        );
        assert!(!Error::validation("bad").is_retryable());
        assert!(!Error::Expired { itinerary_id: 1 }.is_retryable());
    }

    #[test]
    fn test_display_messages() {
        let err = Error::not_found("event", 42);
        assert_eq!(err.to_string(), "event not found: 42");

        let err = Error::NotPending {
            itinerary_id: 7,
            status: ApprovalStatus::Denied,
        };
        assert_eq!(err.to_string(), "Itinerary 7 is not pending (status: denied)");
    }
}
