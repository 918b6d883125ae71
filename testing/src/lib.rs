//! # Lucky Draw Testing
//!
//! Testing utilities for the lucky draw registry.
//!
//! This crate provides:
//! - In-memory implementations of both persistence shapes
//! - Failure injection for commit/rollback tests
//! - Fixtures for building seeded registries and registrations
//! - proptest strategies producing valid registry states
//!
//! ## Example
//!
//! ```
//! use lucky_draw_testing::{fixtures, InMemoryRelationalStore};
//! use lucky_draw_core::{EventName, ParticipantId};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), lucky_draw_core::LuckyDrawError> {
//! let store = Arc::new(InMemoryRelationalStore::new());
//! let registry = fixtures::registry(store.clone()).await?;
//!
//! registry.create_event(EventName::new("draw1"), ParticipantId::new("1"), 1).await?;
//! registry.register(fixtures::registration("draw1", "P1", 3, &[5])).await?;
//! assert_eq!(store.entry_rows().len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod stores;

pub use stores::{FlakyRepository, InMemoryRelationalStore, InMemorySnapshotStore};

/// Fixtures for registry tests.
pub mod fixtures {
    use lucky_draw_core::allocator::NumberAllocator;
    use lucky_draw_core::persistence::EventRepository;
    use lucky_draw_core::registry::{EventRegistry, Registration};
    use lucky_draw_core::{EventName, ParticipantId, Result};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Arc;

    /// Seed used by [`registry`] so draws are reproducible
    pub const TEST_SEED: u64 = 0x5EED;

    /// Load a registry over `repository` with the default pool and a fixed seed.
    ///
    /// # Errors
    ///
    /// Propagates load failures from the repository.
    pub async fn registry(repository: Arc<dyn EventRepository>) -> Result<EventRegistry> {
        EventRegistry::load_with_rng(
            repository,
            NumberAllocator::default(),
            StdRng::seed_from_u64(TEST_SEED),
        )
        .await
    }

    /// Build a registration whose display name is the participant id.
    #[must_use]
    pub fn registration(event: &str, participant: &str, quota: u32, numbers: &[u32]) -> Registration {
        named_registration(event, participant, participant, quota, numbers)
    }

    /// Build a registration with an explicit display name.
    #[must_use]
    pub fn named_registration(
        event: &str,
        participant: &str,
        display_name: &str,
        quota: u32,
        numbers: &[u32],
    ) -> Registration {
        Registration {
            event: EventName::new(event),
            participant_id: ParticipantId::new(participant),
            display_name: display_name.to_string(),
            quota,
            numbers: numbers.to_vec(),
        }
    }

    /// Install a test log subscriber (idempotent).
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("lucky_draw_core=debug")
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use lucky_draw_core::types::{Entry, Event, EventSet};
    use lucky_draw_core::{EventName, ParticipantId};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    /// One event whose numbers are unique by construction.
    ///
    /// Numbers are generated as keys of a map from number to participant
    /// index, so no number can be assigned twice.
    pub fn arb_event(name: String) -> impl Strategy<Value = Event> {
        (
            1u32..5,
            "[0-9]{1,4}",
            prop::collection::btree_map(1u32..=100, 0usize..5, 0..20),
        )
            .prop_map(move |(num_winners, creator, claims)| {
                let mut event =
                    Event::new(EventName::new(name.clone()), ParticipantId::new(creator), num_winners);
                for (number, participant) in claims {
                    event
                        .entries
                        .entry(ParticipantId::new(format!("P{participant}")))
                        .or_insert_with(|| Entry::new(format!("Player {participant}")))
                        .numbers
                        .insert(number);
                }
                event
            })
    }

    /// A registry state with up to four events.
    pub fn arb_event_set() -> impl Strategy<Value = EventSet> {
        prop::collection::btree_set("[a-z][a-z0-9-]{0,7}", 0..4).prop_flat_map(|names| {
            let events: Vec<_> = names.into_iter().map(arb_event).collect();
            events.prop_map(|events| {
                events
                    .into_iter()
                    .map(|event| (event.name.clone(), event))
                    .collect::<BTreeMap<_, _>>()
            })
        })
    }
}
