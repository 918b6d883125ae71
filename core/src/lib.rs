//! # Lucky Draw Core
//!
//! Event registry and draw engine for lottery-style "lucky number" events.
//!
//! A coordinator opens an event with a target winner count, participants
//! claim quota-limited sets of unique numbers, and the coordinator draws a
//! uniformly random sample of (participant, number) pairs, which retires the
//! event.
//!
//! ## Components
//!
//! - [`allocator::NumberAllocator`]: request validation, event-wide number
//!   uniqueness and per-participant quotas
//! - [`draw::DrawEngine`]: sampling without replacement
//! - [`registry::EventRegistry`]: lifecycle operations over shared state,
//!   committing every mutation before acknowledging it
//! - [`persistence::EventRepository`]: `load`/`save` contract with two
//!   shapes, the JSON [`snapshot::FileSnapshotStore`] here and a relational
//!   backend in `lucky-draw-postgres`
//!
//! Quotas are resolved by the caller; the core only sees the resulting integer.
//!
//! ## Example
//!
//! ```no_run
//! use lucky_draw_core::allocator::NumberAllocator;
//! use lucky_draw_core::ids::{EventName, ParticipantId};
//! use lucky_draw_core::registry::{EventRegistry, Registration};
//! use lucky_draw_core::snapshot::FileSnapshotStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), lucky_draw_core::LuckyDrawError> {
//! let store = Arc::new(FileSnapshotStore::new("events.json"));
//! let registry = EventRegistry::load(store, NumberAllocator::default()).await?;
//!
//! let creator = ParticipantId::new("1");
//! registry.create_event(EventName::new("draw1"), creator.clone(), 1).await?;
//! registry
//!     .register(Registration {
//!         event: EventName::new("draw1"),
//!         participant_id: ParticipantId::new("P1"),
//!         display_name: "Alice".to_string(),
//!         quota: 3,
//!         numbers: vec![5, 7],
//!     })
//!     .await?;
//!
//! let winners = registry.draw(&EventName::new("draw1"), &creator).await?;
//! assert_eq!(winners.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod allocator;
pub mod draw;
pub mod error;
pub mod ids;
pub mod persistence;
pub mod registry;
pub mod snapshot;
pub mod types;

pub use error::{LuckyDrawError, Result};
pub use ids::{EventName, ParticipantId};
pub use persistence::{EventRepository, PersistenceError};
pub use registry::{Claim, EventRegistry, Registration};
pub use types::{Entry, EntryView, Event, EventSet, EventSummary, Winner};
