//! In-memory persistence backends
//!
//! Fast, deterministic stand-ins for the two durable shapes:
//! - [`InMemorySnapshotStore`]: one encoded JSON blob, like `FileSnapshotStore`
//! - [`InMemoryRelationalStore`]: event and entry tables with upsert plus
//!   delete-diff, like `PostgresEventRepository`
//! - [`FlakyRepository`]: wraps any backend and fails loads or saves on demand

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Poisoned locks only happen after a test already failed

use lucky_draw_core::persistence::{
    EntryRow, EventRepository, EventRow, PersistenceError, RepositoryFuture, RowSet,
};
use lucky_draw_core::snapshot;
use lucky_draw_core::types::EventSet;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// Snapshot backend holding the encoded document in memory.
///
/// # Example
///
/// ```
/// use lucky_draw_testing::InMemorySnapshotStore;
/// use lucky_draw_core::persistence::EventRepository;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemorySnapshotStore::new();
/// assert!(store.load().await?.is_empty());
/// assert!(store.blob().is_none());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemorySnapshotStore {
    blob: Arc<RwLock<Option<Vec<u8>>>>,
}

impl InMemorySnapshotStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with a raw document (e.g. a legacy file)
    #[must_use]
    pub fn with_blob(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            blob: Arc::new(RwLock::new(Some(bytes.into()))),
        }
    }

    /// The last saved document, if any
    #[must_use]
    pub fn blob(&self) -> Option<Vec<u8>> {
        self.blob.read().unwrap().clone()
    }
}

impl EventRepository for InMemorySnapshotStore {
    fn backend(&self) -> &'static str {
        "memory-snapshot"
    }

    fn load(&self) -> RepositoryFuture<'_, EventSet> {
        Box::pin(async move {
            match self.blob.read().unwrap().as_deref() {
                Some(bytes) => snapshot::decode(bytes),
                None => Ok(EventSet::new()),
            }
        })
    }

    fn save<'a>(&'a self, events: &'a EventSet) -> RepositoryFuture<'a, ()> {
        Box::pin(async move {
            let bytes = snapshot::encode(events)?;
            *self.blob.write().unwrap() = Some(bytes);
            Ok(())
        })
    }
}

#[derive(Debug, Default)]
struct Tables {
    events: BTreeMap<String, EventRow>,
    entries: BTreeMap<(String, u32), EntryRow>,
}

/// Relational backend simulated with two ordered tables.
///
/// `save` mirrors the SQL reconciliation: delete event rows (and their entry
/// rows) for events no longer live, upsert every event row, delete entry rows
/// no longer claimed, upsert every entry row.
#[derive(Clone, Debug, Default)]
pub struct InMemoryRelationalStore {
    tables: Arc<RwLock<Tables>>,
    saves: Arc<AtomicUsize>,
}

impl InMemoryRelationalStore {
    /// Create empty tables
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create tables pre-populated with rows
    #[must_use]
    pub fn with_rows(rows: RowSet) -> Self {
        let store = Self::new();
        {
            let mut tables = store.tables.write().unwrap();
            for row in rows.events {
                tables.events.insert(row.name.clone(), row);
            }
            for row in rows.entries {
                tables
                    .entries
                    .insert((row.event_name.clone(), row.number), row);
            }
        }
        store
    }

    /// Current event rows, ordered by name
    #[must_use]
    pub fn event_rows(&self) -> Vec<EventRow> {
        self.tables.read().unwrap().events.values().cloned().collect()
    }

    /// Current entry rows, ordered by `(event_name, number)`
    #[must_use]
    pub fn entry_rows(&self) -> Vec<EntryRow> {
        self.tables.read().unwrap().entries.values().cloned().collect()
    }

    /// Entry rows belonging to one event
    #[must_use]
    pub fn entry_rows_for(&self, event_name: &str) -> Vec<EntryRow> {
        self.entry_rows()
            .into_iter()
            .filter(|row| row.event_name == event_name)
            .collect()
    }

    /// Number of successful saves
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl EventRepository for InMemoryRelationalStore {
    fn backend(&self) -> &'static str {
        "memory-relational"
    }

    fn load(&self) -> RepositoryFuture<'_, EventSet> {
        Box::pin(async move {
            let rows = RowSet {
                events: self.event_rows(),
                entries: self.entry_rows(),
            };
            rows.into_events()
        })
    }

    fn save<'a>(&'a self, events: &'a EventSet) -> RepositoryFuture<'a, ()> {
        Box::pin(async move {
            let desired = RowSet::from_events(events);
            let live: BTreeSet<String> = desired.events.iter().map(|r| r.name.clone()).collect();
            let claimed: BTreeSet<(String, u32)> = desired
                .entries
                .iter()
                .map(|r| (r.event_name.clone(), r.number))
                .collect();

            let mut tables = self.tables.write().unwrap();

            tables.events.retain(|name, _| live.contains(name));
            tables.entries.retain(|key, _| claimed.contains(key));

            for row in desired.events {
                tables.events.insert(row.name.clone(), row);
            }
            for row in desired.entries {
                tables
                    .entries
                    .insert((row.event_name.clone(), row.number), row);
            }

            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// Wraps a backend and injects failures.
///
/// # Example
///
/// ```
/// use lucky_draw_testing::{FlakyRepository, InMemoryRelationalStore};
/// use std::sync::Arc;
///
/// let flaky = FlakyRepository::new(Arc::new(InMemoryRelationalStore::new()));
/// flaky.fail_saves(true);
/// ```
#[derive(Clone)]
pub struct FlakyRepository {
    inner: Arc<dyn EventRepository>,
    fail_saves: Arc<AtomicBool>,
    fail_loads: Arc<AtomicBool>,
}

impl FlakyRepository {
    /// Wrap `inner`; nothing fails until switched on
    #[must_use]
    pub fn new(inner: Arc<dyn EventRepository>) -> Self {
        Self {
            inner,
            fail_saves: Arc::new(AtomicBool::new(false)),
            fail_loads: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make subsequent saves fail with a storage error
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent loads fail with a storage error
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }
}

impl EventRepository for FlakyRepository {
    fn backend(&self) -> &'static str {
        "flaky"
    }

    fn load(&self) -> RepositoryFuture<'_, EventSet> {
        Box::pin(async move {
            if self.fail_loads.load(Ordering::SeqCst) {
                return Err(PersistenceError::Storage("injected load failure".to_string()));
            }
            self.inner.load().await
        })
    }

    fn save<'a>(&'a self, events: &'a EventSet) -> RepositoryFuture<'a, ()> {
        Box::pin(async move {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(PersistenceError::Storage("injected save failure".to_string()));
            }
            self.inner.save(events).await
        })
    }
}
