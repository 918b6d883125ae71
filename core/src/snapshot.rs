//! Flat-snapshot backend: the whole event set as one JSON document.
//!
//! Layout, keyed by event name:
//!
//! ```json
//! {
//!   "draw1": {
//!     "creator": "1",
//!     "num_winners": 2,
//!     "entries": {
//!       "P1": { "name": "Alice", "numbers": [5] }
//!     }
//!   }
//! }
//! ```
//!
//! Older files stored the creator as an integer and each entry as a bare
//! list of numbers. Both shapes are accepted on load and normalised; saves
//! always write the record shape above.

use crate::ids::{EventName, ParticipantId};
use crate::persistence::{self, EventRepository, PersistenceError, RepositoryFuture};
use crate::types::{Entry, Event, EventSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize)]
struct StoredEvent {
    creator: StoredId,
    num_winners: u32,
    #[serde(default)]
    entries: BTreeMap<String, StoredEntry>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StoredId {
    Text(String),
    Number(u64),
}

impl StoredId {
    fn into_participant(self) -> ParticipantId {
        match self {
            Self::Text(id) => ParticipantId::new(id),
            Self::Number(id) => ParticipantId::new(id.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Record { name: String, numbers: Vec<u32> },
    Numbers(Vec<u32>),
}

/// Encode an event set as a snapshot document.
///
/// # Errors
///
/// `Serialization` if encoding fails.
pub fn encode(events: &EventSet) -> Result<Vec<u8>, PersistenceError> {
    let stored: BTreeMap<&str, StoredEvent> = events
        .values()
        .map(|event| {
            let entries = event
                .entries
                .iter()
                .map(|(participant, entry)| {
                    (
                        participant.as_str().to_string(),
                        StoredEntry::Record {
                            name: entry.display_name.clone(),
                            numbers: entry.numbers.iter().copied().collect(),
                        },
                    )
                })
                .collect();
            (
                event.name.as_str(),
                StoredEvent {
                    creator: StoredId::Text(event.creator_id.as_str().to_string()),
                    num_winners: event.num_winners,
                    entries,
                },
            )
        })
        .collect();

    serde_json::to_vec_pretty(&stored).map_err(|e| PersistenceError::Serialization(e.to_string()))
}

/// Decode a snapshot document, accepting both historical entry shapes.
///
/// Empty input decodes to an empty set.
///
/// # Errors
///
/// `Corrupt` for malformed JSON or content that violates registry invariants.
pub fn decode(bytes: &[u8]) -> Result<EventSet, PersistenceError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(EventSet::new());
    }

    let stored: BTreeMap<String, StoredEvent> =
        serde_json::from_slice(bytes)
            .map_err(|e| PersistenceError::Corrupt(format!("unreadable snapshot: {e}")))?;

    let mut events = EventSet::new();
    for (name, stored_event) in stored {
        let name = EventName::new(name);
        let mut event = Event::new(
            name.clone(),
            stored_event.creator.into_participant(),
            stored_event.num_winners,
        );
        for (participant, stored_entry) in stored_event.entries {
            let (display_name, numbers) = match stored_entry {
                StoredEntry::Record { name, numbers } => (name, numbers),
                StoredEntry::Numbers(numbers) => (participant.clone(), numbers),
            };
            let numbers: BTreeSet<u32> = numbers.into_iter().collect();
            if numbers.is_empty() {
                continue;
            }
            event.entries.insert(
                ParticipantId::new(participant),
                Entry {
                    display_name,
                    numbers,
                },
            );
        }
        events.insert(name, event);
    }

    persistence::validate(&events)?;
    Ok(events)
}

/// Snapshot backend writing one JSON file.
///
/// Each save writes a sibling temporary file and renames it over the target,
/// so a crash mid-write leaves the previous snapshot intact.
#[derive(Clone, Debug)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    /// Create a store for the snapshot at `path`. The file need not exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl EventRepository for FileSnapshotStore {
    fn backend(&self) -> &'static str {
        "snapshot"
    }

    fn load(&self) -> RepositoryFuture<'_, EventSet> {
        Box::pin(async move {
            match tokio::fs::read(&self.path).await {
                Ok(bytes) => {
                    let events = decode(&bytes)?;
                    tracing::debug!(
                        path = %self.path.display(),
                        events = events.len(),
                        "Snapshot loaded"
                    );
                    Ok(events)
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::info!(path = %self.path.display(), "No snapshot yet, starting empty");
                    Ok(EventSet::new())
                }
                Err(e) => Err(PersistenceError::Storage(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                ))),
            }
        })
    }

    fn save<'a>(&'a self, events: &'a EventSet) -> RepositoryFuture<'a, ()> {
        Box::pin(async move {
            let bytes = encode(events)?;
            let temp = self.temp_path();

            tokio::fs::write(&temp, &bytes).await.map_err(|e| {
                PersistenceError::Storage(format!("failed to write {}: {e}", temp.display()))
            })?;
            tokio::fs::rename(&temp, &self.path).await.map_err(|e| {
                PersistenceError::Storage(format!(
                    "failed to replace {}: {e}",
                    self.path.display()
                ))
            })?;

            tracing::debug!(path = %self.path.display(), events = events.len(), "Snapshot saved");
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample() -> EventSet {
        let mut event = Event::new(EventName::new("draw1"), ParticipantId::new("1"), 2);
        let mut alice = Entry::new("Alice");
        alice.numbers.extend([5, 9]);
        event.entries.insert(ParticipantId::new("P1"), alice);
        EventSet::from([(event.name.clone(), event)])
    }

    #[test]
    fn encode_decode_round_trip() {
        let events = sample();
        let bytes = encode(&events).unwrap();
        assert_eq!(decode(&bytes).unwrap(), events);
    }

    #[test]
    fn decodes_legacy_plain_number_lists() {
        let legacy = br#"{
            "tet": {
                "creator": 123456789,
                "num_winners": 1,
                "entries": { "555": [3, 4], "777": [] }
            }
        }"#;
        let events = decode(legacy).unwrap();
        let event = &events["tet"];

        assert_eq!(event.creator_id, ParticipantId::new("123456789"));
        assert_eq!(event.entries.len(), 1);
        let entry = &event.entries[&ParticipantId::new("555")];
        assert_eq!(entry.display_name, "555");
        assert_eq!(entry.numbers, BTreeSet::from([3, 4]));
    }

    #[test]
    fn decodes_record_entries() {
        let doc = br#"{"e":{"creator":"9","num_winners":3,"entries":{"P1":{"name":"Alice","numbers":[1]}}}}"#;
        let events = decode(doc).unwrap();
        assert_eq!(events["e"].entries[&ParticipantId::new("P1")].display_name, "Alice");
    }

    #[test]
    fn empty_document_is_empty_registry() {
        assert!(decode(b"").unwrap().is_empty());
        assert!(decode(b"  \n").unwrap().is_empty());
        assert!(decode(b"{}").unwrap().is_empty());
    }

    #[test]
    fn unparsable_document_is_corrupt() {
        assert!(matches!(decode(b"not json"), Err(PersistenceError::Corrupt(_))));
        assert!(matches!(decode(b"{\"e\": "), Err(PersistenceError::Corrupt(_))));
        assert!(matches!(
            decode(br#"{"e":{"creator":"9","num_winners":"two"}}"#),
            Err(PersistenceError::Corrupt(_))
        ));
    }

    #[test]
    fn shared_number_is_corrupt() {
        let doc = br#"{"e":{"creator":"9","num_winners":1,"entries":{"a":[1],"b":[1]}}}"#;
        assert!(matches!(decode(doc), Err(PersistenceError::Corrupt(_))));
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("events.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_round_trip_and_removal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("events.json"));

        let events = sample();
        store.save(&events).await.unwrap();
        assert_eq!(store.load().await.unwrap(), events);

        store.save(&EventSet::new()).await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
        assert!(!dir.path().join("events.json.tmp").exists());
    }

    #[tokio::test]
    async fn unwritable_location_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("missing").join("events.json"));
        let result = store.save(&sample()).await;
        assert!(matches!(result, Err(PersistenceError::Storage(_))));
    }
}
