//! Domain types: events, entries and draw results.

use crate::ids::{EventName, ParticipantId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The full set of live events, keyed by name.
///
/// This is the unit the persistence layer loads and saves.
pub type EventSet = BTreeMap<EventName, Event>;

/// A participant's claim within one event.
///
/// Numbers only ever grow while the event is open. Across all entries of an
/// event every number is held at most once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Name shown when listing entries or announcing winners
    pub display_name: String,
    /// Claimed numbers
    pub numbers: BTreeSet<u32>,
}

impl Entry {
    /// Create an entry with no numbers yet.
    #[must_use]
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            numbers: BTreeSet::new(),
        }
    }

    /// Number of claimed numbers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    /// Whether the entry holds no numbers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }
}

/// One lottery instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event name
    pub name: EventName,
    /// Only this identity may draw or cancel the event
    pub creator_id: ParticipantId,
    /// How many (participant, number) pairs a draw selects, always >= 1
    pub num_winners: u32,
    /// Entries keyed by participant
    pub entries: BTreeMap<ParticipantId, Entry>,
}

impl Event {
    /// Create an open event with no entries.
    #[must_use]
    pub fn new(name: EventName, creator_id: ParticipantId, num_winners: u32) -> Self {
        Self {
            name,
            creator_id,
            num_winners,
            entries: BTreeMap::new(),
        }
    }

    /// Whether `number` is held by any participant in this event.
    #[must_use]
    pub fn holds(&self, number: u32) -> bool {
        self.entries.values().any(|entry| entry.numbers.contains(&number))
    }

    /// Count of numbers `participant` holds in this event.
    #[must_use]
    pub fn held_by(&self, participant: &ParticipantId) -> usize {
        self.entries.get(participant).map_or(0, Entry::len)
    }

    /// Total number of claimed (participant, number) pairs.
    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.entries.values().map(Entry::len).sum()
    }

    /// Flatten the entries into drawable pairs, ordered by participant then number.
    #[must_use]
    pub fn pairs(&self) -> Vec<Winner> {
        self.entries
            .iter()
            .flat_map(|(participant_id, entry)| {
                entry.numbers.iter().map(move |&number| Winner {
                    participant_id: participant_id.clone(),
                    display_name: entry.display_name.clone(),
                    number,
                })
            })
            .collect()
    }

    /// Summary row for event listings.
    #[must_use]
    pub fn summary(&self) -> EventSummary {
        EventSummary {
            name: self.name.clone(),
            creator_id: self.creator_id.clone(),
            num_winners: self.num_winners,
            participant_count: self.entries.len(),
            number_count: self.pair_count(),
        }
    }
}

/// A winning (participant, number) pair, also used for candidate pairs.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Winner {
    /// Participant holding the number
    pub participant_id: ParticipantId,
    /// Participant's display name at draw time
    pub display_name: String,
    /// The winning number
    pub number: u32,
}

/// Listing row returned by `list_events`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    /// Event name
    pub name: EventName,
    /// Event creator
    pub creator_id: ParticipantId,
    /// Target winner count
    pub num_winners: u32,
    /// Participants holding at least one number
    pub participant_count: usize,
    /// Total numbers claimed
    pub number_count: usize,
}

/// Listing row returned by `list_entries`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryView {
    /// Participant key
    pub participant_id: ParticipantId,
    /// Display name
    pub display_name: String,
    /// Claimed numbers, ascending
    pub numbers: Vec<u32>,
}
