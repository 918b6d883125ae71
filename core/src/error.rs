//! Error taxonomy for registry operations.
//!
//! Every validation error is detected before any state is touched, so a
//! returned error always means "nothing changed". `PersistenceFailure` is the
//! one error raised after the mutation was attempted; the registry discards
//! the mutation before returning it.

use crate::ids::{EventName, ParticipantId};
use crate::persistence::PersistenceError;
use thiserror::Error;

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, LuckyDrawError>;

/// Errors returned by [`EventRegistry`](crate::registry::EventRegistry) operations.
#[derive(Error, Debug)]
pub enum LuckyDrawError {
    /// No live event with this name.
    #[error("Event not found: {0}")]
    EventNotFound(EventName),

    /// An event with this name is already open.
    #[error("Event already exists: {0}")]
    EventAlreadyExists(EventName),

    /// Malformed request (bad counts, empty or out-of-range numbers).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A requested number is already held in the event.
    #[error("Number {number} is already taken in event {event}")]
    NumberAlreadyTaken {
        /// Event the conflict occurred in
        event: EventName,
        /// First conflicting number of the request
        number: u32,
    },

    /// Accepting the request would exceed the participant's quota.
    #[error(
        "Quota exceeded for {participant}: holds {held}, requested {requested}, quota {quota}"
    )]
    QuotaExceeded {
        /// Participant making the request
        participant: ParticipantId,
        /// Numbers already held in the event
        held: usize,
        /// Numbers in the rejected request
        requested: usize,
        /// Resolved quota
        quota: u32,
    },

    /// Only the creator may draw or cancel an event.
    #[error("{requester} is not the creator of event {event}")]
    NotCreator {
        /// Event the request targeted
        event: EventName,
        /// Identity that attempted the operation
        requester: ParticipantId,
    },

    /// Fewer claimed pairs than winners to draw.
    #[error("Event {event} has {available} entries, {required} needed to draw")]
    InsufficientEntries {
        /// Event being drawn
        event: EventName,
        /// Claimed pairs in the event
        available: usize,
        /// Configured winner count
        required: u32,
    },

    /// Durable storage rejected the commit; the in-memory mutation was discarded.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[from] PersistenceError),
}

impl LuckyDrawError {
    /// Stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EventNotFound(_) => "EVENT_NOT_FOUND",
            Self::EventAlreadyExists(_) => "EVENT_ALREADY_EXISTS",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::NumberAlreadyTaken { .. } => "NUMBER_ALREADY_TAKEN",
            Self::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            Self::NotCreator { .. } => "NOT_CREATOR",
            Self::InsufficientEntries { .. } => "INSUFFICIENT_ENTRIES",
            Self::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
        }
    }

    /// Create an `InvalidArgument` error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_taken_display_names_the_number() {
        let error = LuckyDrawError::NumberAlreadyTaken {
            event: EventName::new("draw1"),
            number: 42,
        };
        let display = format!("{error}");
        assert!(display.contains("42"));
        assert!(display.contains("draw1"));
        assert_eq!(error.code(), "NUMBER_ALREADY_TAKEN");
    }

    #[test]
    fn persistence_errors_convert() {
        let error: LuckyDrawError = PersistenceError::Storage("disk full".to_string()).into();
        assert_eq!(error.code(), "PERSISTENCE_FAILURE");
        assert!(format!("{error}").contains("disk full"));
    }

    #[test]
    fn quota_display_includes_counts() {
        let error = LuckyDrawError::QuotaExceeded {
            participant: ParticipantId::new("P1"),
            held: 2,
            requested: 2,
            quota: 3,
        };
        assert_eq!(
            format!("{error}"),
            "Quota exceeded for P1: holds 2, requested 2, quota 3"
        );
    }
}
