//! Persistence contract for the event registry.
//!
//! The registry reconstructs its whole state with [`EventRepository::load`]
//! at startup and commits the complete post-mutation state with
//! [`EventRepository::save`] before acknowledging any mutation. `save` is an
//! idempotent full reconciliation: after it returns, the durable record equals
//! the given set, including the *absence* of events that were drawn or
//! cancelled.
//!
//! # Implementations
//!
//! - `FileSnapshotStore` (this crate): one JSON blob rewritten on every commit
//! - `PostgresEventRepository` (`lucky-draw-postgres`): relational rows with
//!   upsert plus delete-diff
//! - `InMemorySnapshotStore` / `InMemoryRelationalStore` (`lucky-draw-testing`)
//!
//! Both shapes satisfy `load(save(S)) == S`.
//!
//! # Row layout
//!
//! Relational backends store one [`EventRow`] per event and one [`EntryRow`]
//! per claimed number, keyed by `(event_name, number)`. [`RowSet`] converts
//! between that layout and an [`EventSet`].

use crate::ids::{EventName, ParticipantId};
use crate::types::{Entry, Event, EventSet};
use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by repository methods.
pub type RepositoryFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, PersistenceError>> + Send + 'a>>;

/// Errors raised by persistence backends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// The backend could not be reached or rejected the write.
    #[error("Storage error: {0}")]
    Storage(String),

    /// State could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored data violates a registry invariant.
    #[error("Corrupt state: {0}")]
    Corrupt(String),
}

/// Durable storage for the set of live events.
///
/// # Dyn Compatibility
///
/// Methods return boxed futures so the registry can hold an
/// `Arc<dyn EventRepository>` and the deployment can pick the backend at
/// startup.
pub trait EventRepository: Send + Sync {
    /// Short backend label used in logs and metrics.
    fn backend(&self) -> &'static str;

    /// Load every persisted event.
    ///
    /// An empty store loads as an empty set.
    ///
    /// # Errors
    ///
    /// - `Storage`: backend unreachable
    /// - `Serialization` / `Corrupt`: stored data unreadable or inconsistent
    fn load(&self) -> RepositoryFuture<'_, EventSet>;

    /// Make durable storage equal to `events`.
    ///
    /// Events missing from `events` must be removed from storage, otherwise a
    /// drawn or cancelled event would reappear on the next `load`.
    ///
    /// # Errors
    ///
    /// - `Storage`: write failed; the durable record is unchanged
    /// - `Serialization`: state could not be encoded
    fn save<'a>(&'a self, events: &'a EventSet) -> RepositoryFuture<'a, ()>;
}

/// Persisted event header.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventRow {
    /// Event name (primary key)
    pub name: String,
    /// Creator identity
    pub creator_id: String,
    /// Target winner count
    pub num_winners: u32,
}

/// One claimed number, keyed by `(event_name, number)`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntryRow {
    /// Owning event
    pub event_name: String,
    /// Claimed number
    pub number: u32,
    /// Participant holding the number
    pub participant_id: String,
    /// Participant display name
    pub display_name: String,
}

/// Relational image of an [`EventSet`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RowSet {
    /// One row per event, ordered by name
    pub events: Vec<EventRow>,
    /// One row per claimed number, ordered by `(event_name, number)`
    pub entries: Vec<EntryRow>,
}

impl RowSet {
    /// Flatten events into rows.
    #[must_use]
    pub fn from_events(events: &EventSet) -> Self {
        let mut rows = Self::default();
        for event in events.values() {
            rows.events.push(EventRow {
                name: event.name.as_str().to_string(),
                creator_id: event.creator_id.as_str().to_string(),
                num_winners: event.num_winners,
            });
            for (participant_id, entry) in &event.entries {
                for &number in &entry.numbers {
                    rows.entries.push(EntryRow {
                        event_name: event.name.as_str().to_string(),
                        number,
                        participant_id: participant_id.as_str().to_string(),
                        display_name: entry.display_name.clone(),
                    });
                }
            }
        }
        rows.entries.sort();
        rows
    }

    /// Rebuild events from rows, validating registry invariants.
    ///
    /// # Errors
    ///
    /// `Corrupt` if an entry references a missing event, a number is claimed
    /// twice within an event, or an event has a zero winner count.
    pub fn into_events(self) -> Result<EventSet, PersistenceError> {
        let mut events = EventSet::new();
        for row in self.events {
            let name = EventName::new(row.name);
            let event = Event::new(name.clone(), ParticipantId::new(row.creator_id), row.num_winners);
            if events.insert(name.clone(), event).is_some() {
                return Err(PersistenceError::Corrupt(format!("duplicate event row {name}")));
            }
        }

        for row in self.entries {
            let event = events.get_mut(row.event_name.as_str()).ok_or_else(|| {
                PersistenceError::Corrupt(format!(
                    "entry for number {} references missing event {}",
                    row.number, row.event_name
                ))
            })?;
            if event.holds(row.number) {
                return Err(PersistenceError::Corrupt(format!(
                    "number {} claimed twice in event {}",
                    row.number, row.event_name
                )));
            }
            event
                .entries
                .entry(ParticipantId::new(row.participant_id))
                .or_insert_with(|| Entry::new(row.display_name))
                .numbers
                .insert(row.number);
        }

        validate(&events)?;
        Ok(events)
    }
}

/// Check the invariants every loaded state must satisfy.
///
/// # Errors
///
/// `Corrupt` describing the first violation found.
pub fn validate(events: &EventSet) -> Result<(), PersistenceError> {
    for (key, event) in events {
        if key != &event.name {
            return Err(PersistenceError::Corrupt(format!(
                "event stored under {key} is named {}",
                event.name
            )));
        }
        if event.num_winners == 0 {
            return Err(PersistenceError::Corrupt(format!(
                "event {key} has no winners configured"
            )));
        }
        let mut seen = BTreeSet::new();
        for entry in event.entries.values() {
            for &number in &entry.numbers {
                if !seen.insert(number) {
                    return Err(PersistenceError::Corrupt(format!(
                        "number {number} claimed twice in event {key}"
                    )));
                }
            }
        }
    }
    Ok(())
}
