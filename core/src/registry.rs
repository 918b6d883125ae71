//! The event registry: lifecycle, registration and draws over shared state.
//!
//! # Concurrency
//!
//! All live events sit behind a single `tokio::sync::Mutex`. Every mutating
//! operation holds it across validate, mutate and persist, so two concurrent
//! registrations for the same number serialize around the uniqueness check and
//! exactly one of them wins.
//!
//! # Commit protocol
//!
//! Mutations are applied to a copy of the event set. The copy is handed to
//! [`EventRepository::save`]; only when the save succeeds does it replace the
//! live state. A failed save leaves memory untouched and surfaces as
//! [`LuckyDrawError::PersistenceFailure`], so in-memory and durable state
//! never diverge.
//!
//! # Lifecycle
//!
//! ```text
//! create ──► Open ──draw──► (removed)
//!              └──cancel──► (removed)
//! ```

use crate::allocator::NumberAllocator;
use crate::draw::DrawEngine;
use crate::error::{LuckyDrawError, Result};
use crate::ids::{EventName, ParticipantId};
use crate::persistence::EventRepository;
use crate::types::{Entry, EntryView, Event, EventSet, EventSummary, Winner};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A batch of numbers a participant wants to claim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    /// Target event
    pub event: EventName,
    /// Claiming participant
    pub participant_id: ParticipantId,
    /// Display name used if this is the participant's first claim
    pub display_name: String,
    /// Resolved quota for this participant
    pub quota: u32,
    /// Requested numbers, accepted or rejected as a whole
    pub numbers: Vec<u32>,
}

/// Result of an accepted registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Claim {
    /// Accepted numbers, ascending
    pub numbers: Vec<u32>,
    /// How many more numbers the participant may claim under the same quota,
    /// as of the commit that accepted this claim
    pub remaining_quota: u32,
}

struct RegistryState {
    events: EventSet,
    rng: StdRng,
}

/// Owns the set of live events. Construct once at startup and share via `Arc`.
pub struct EventRegistry {
    state: Mutex<RegistryState>,
    repository: Arc<dyn EventRepository>,
    allocator: NumberAllocator,
}

impl EventRegistry {
    /// Load persisted events and build the registry.
    ///
    /// # Errors
    ///
    /// `PersistenceFailure` if the repository cannot be loaded. Callers should
    /// treat this as fatal.
    pub async fn load(
        repository: Arc<dyn EventRepository>,
        allocator: NumberAllocator,
    ) -> Result<Self> {
        Self::load_with_rng(repository, allocator, StdRng::from_entropy()).await
    }

    /// Like [`EventRegistry::load`] with a caller-supplied random source.
    ///
    /// # Errors
    ///
    /// `PersistenceFailure` if the repository cannot be loaded.
    pub async fn load_with_rng(
        repository: Arc<dyn EventRepository>,
        allocator: NumberAllocator,
        rng: StdRng,
    ) -> Result<Self> {
        let events = repository.load().await.map_err(|e| {
            tracing::error!(backend = repository.backend(), error = %e, "Failed to load events");
            LuckyDrawError::from(e)
        })?;

        tracing::info!(
            backend = repository.backend(),
            events = events.len(),
            "Event registry loaded"
        );

        Ok(Self {
            state: Mutex::new(RegistryState { events, rng }),
            repository,
            allocator,
        })
    }

    /// Allocation policy in use.
    #[must_use]
    pub const fn allocator(&self) -> NumberAllocator {
        self.allocator
    }

    /// Open a new event.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument`: blank name or `num_winners == 0`
    /// - `EventAlreadyExists`: the name is taken; the existing event is untouched
    /// - `PersistenceFailure`: commit failed, nothing created
    #[tracing::instrument(skip(self), fields(event = %name, creator = %creator_id))]
    pub async fn create_event(
        &self,
        name: EventName,
        creator_id: ParticipantId,
        num_winners: u32,
    ) -> Result<Event> {
        if name.as_str().trim().is_empty() {
            return Err(LuckyDrawError::invalid("event name cannot be empty"));
        }
        if num_winners == 0 {
            return Err(LuckyDrawError::invalid("num_winners must be at least 1"));
        }

        let mut state = self.state.lock().await;
        if state.events.contains_key(&name) {
            tracing::debug!("Event already exists");
            return Err(LuckyDrawError::EventAlreadyExists(name));
        }

        let event = Event::new(name.clone(), creator_id, num_winners);
        let mut candidate = state.events.clone();
        candidate.insert(name, event.clone());
        self.commit(&mut state, candidate).await?;

        metrics::counter!("lucky_draw.events.created").increment(1);
        tracing::info!(num_winners, "Event created");
        Ok(event)
    }

    /// Fetch a copy of an event.
    ///
    /// # Errors
    ///
    /// `EventNotFound` if absent.
    pub async fn get_event(&self, name: &EventName) -> Result<Event> {
        let state = self.state.lock().await;
        state
            .events
            .get(name)
            .cloned()
            .ok_or_else(|| LuckyDrawError::EventNotFound(name.clone()))
    }

    /// Summaries of all live events, ordered by name.
    pub async fn list_events(&self) -> Vec<EventSummary> {
        let state = self.state.lock().await;
        state.events.values().map(Event::summary).collect()
    }

    /// Entries of an event, ordered by participant id, numbers ascending.
    ///
    /// # Errors
    ///
    /// `EventNotFound` if absent.
    pub async fn list_entries(&self, name: &EventName) -> Result<Vec<EntryView>> {
        let state = self.state.lock().await;
        let event = Self::event(&state.events, name)?;
        Ok(event
            .entries
            .iter()
            .map(|(participant_id, entry)| EntryView {
                participant_id: participant_id.clone(),
                display_name: entry.display_name.clone(),
                numbers: entry.numbers.iter().copied().collect(),
            })
            .collect())
    }

    /// Pool numbers not yet claimed in an event.
    ///
    /// # Errors
    ///
    /// `EventNotFound` if absent.
    pub async fn available_numbers(&self, name: &EventName) -> Result<Vec<u32>> {
        let state = self.state.lock().await;
        let event = Self::event(&state.events, name)?;
        Ok(self.allocator.available(event))
    }

    /// How many more numbers `participant` may claim under `quota`.
    ///
    /// # Errors
    ///
    /// `EventNotFound` if absent.
    pub async fn remaining_quota(
        &self,
        name: &EventName,
        participant: &ParticipantId,
        quota: u32,
    ) -> Result<u32> {
        let state = self.state.lock().await;
        let event = Self::event(&state.events, name)?;
        let held = u32::try_from(event.held_by(participant)).unwrap_or(u32::MAX);
        Ok(quota.saturating_sub(held))
    }

    /// Claim numbers for a participant using their resolved quota.
    ///
    /// Returns the accepted numbers, ascending, with the quota left afterwards.
    ///
    /// # Errors
    ///
    /// - `EventNotFound`
    /// - `InvalidArgument`: empty batch, repeated or out-of-pool number
    /// - `NumberAlreadyTaken`: first requested number held by anyone, requester included
    /// - `QuotaExceeded`: held + requested > quota
    /// - `PersistenceFailure`: commit failed, nothing claimed
    #[tracing::instrument(
        skip(self, registration),
        fields(event = %registration.event, participant = %registration.participant_id)
    )]
    pub async fn register(&self, registration: Registration) -> Result<Claim> {
        self.allocate(registration, None).await
    }

    /// Operator path: claim numbers on behalf of a participant with a
    /// caller-supplied quota instead of the participant's resolved one.
    ///
    /// Only the event's creator may do this. The same uniqueness and quota
    /// checks apply.
    ///
    /// # Errors
    ///
    /// - `NotCreator`: `operator` is not the event's creator
    /// - otherwise the same as [`EventRegistry::register`]
    #[tracing::instrument(
        skip(self, registration),
        fields(
            event = %registration.event,
            operator = %operator,
            participant = %registration.participant_id,
            quota_override = registration.quota
        )
    )]
    pub async fn admin_add_entry(
        &self,
        operator: &ParticipantId,
        registration: Registration,
    ) -> Result<Claim> {
        self.allocate(registration, Some(operator)).await
    }

    async fn allocate(
        &self,
        registration: Registration,
        operator: Option<&ParticipantId>,
    ) -> Result<Claim> {
        let Registration {
            event: name,
            participant_id,
            display_name,
            quota,
            numbers,
        } = registration;

        let mut state = self.state.lock().await;
        let event = match operator {
            Some(operator) => Self::owned_event(&state.events, &name, operator)?,
            None => Self::event(&state.events, &name)?,
        };
        let held = event.held_by(&participant_id);

        let accepted = match self.allocator.check(event, &participant_id, &numbers, quota) {
            Ok(accepted) => accepted,
            Err(error) => {
                metrics::counter!("lucky_draw.registrations.rejected", "code" => error.code())
                    .increment(1);
                tracing::debug!(error = %error, "Registration rejected");
                return Err(error);
            }
        };

        let mut candidate = state.events.clone();
        if let Some(event) = candidate.get_mut(&name) {
            event
                .entries
                .entry(participant_id)
                .or_insert_with(|| Entry::new(display_name))
                .numbers
                .extend(accepted.iter().copied());
        }
        self.commit(&mut state, candidate).await?;

        let held = u32::try_from(held + accepted.len()).unwrap_or(u32::MAX);
        metrics::counter!("lucky_draw.numbers.claimed").increment(accepted.len() as u64);
        tracing::info!(numbers = ?accepted, "Numbers claimed");
        Ok(Claim {
            numbers: accepted.into_iter().collect(),
            remaining_quota: quota.saturating_sub(held),
        })
    }

    /// Draw the event's winners and retire it.
    ///
    /// Selects `num_winners` distinct pairs uniformly at random, then removes
    /// the event. No draw history is kept.
    ///
    /// # Errors
    ///
    /// - `EventNotFound`
    /// - `NotCreator`: requester is not the creator
    /// - `InsufficientEntries`: fewer pairs than winners; the event stays open
    /// - `PersistenceFailure`: commit failed, the event stays open
    #[tracing::instrument(skip(self), fields(event = %name, requester = %requester))]
    pub async fn draw(&self, name: &EventName, requester: &ParticipantId) -> Result<Vec<Winner>> {
        let mut state = self.state.lock().await;
        let RegistryState { events, rng } = &mut *state;
        let event = Self::owned_event(events, name, requester)?;
        let winners = DrawEngine::select(event, rng)?;

        let mut candidate = state.events.clone();
        candidate.remove(name);
        self.commit(&mut state, candidate).await?;

        metrics::counter!("lucky_draw.events.drawn").increment(1);
        tracing::info!(
            winners = ?winners.iter().map(|w| w.number).collect::<Vec<_>>(),
            "Event drawn"
        );
        Ok(winners)
    }

    /// Cancel an event without drawing. The event is removed permanently.
    ///
    /// # Errors
    ///
    /// - `EventNotFound`
    /// - `NotCreator`
    /// - `PersistenceFailure`: commit failed, the event stays open
    #[tracing::instrument(skip(self), fields(event = %name, requester = %requester))]
    pub async fn cancel(&self, name: &EventName, requester: &ParticipantId) -> Result<()> {
        let mut state = self.state.lock().await;
        Self::owned_event(&state.events, name, requester)?;

        let mut candidate = state.events.clone();
        candidate.remove(name);
        self.commit(&mut state, candidate).await?;

        metrics::counter!("lucky_draw.events.cancelled").increment(1);
        tracing::info!("Event cancelled");
        Ok(())
    }

    fn event<'a>(events: &'a EventSet, name: &EventName) -> Result<&'a Event> {
        events
            .get(name)
            .ok_or_else(|| LuckyDrawError::EventNotFound(name.clone()))
    }

    fn owned_event<'a>(
        events: &'a EventSet,
        name: &EventName,
        requester: &ParticipantId,
    ) -> Result<&'a Event> {
        let event = Self::event(events, name)?;
        if &event.creator_id != requester {
            tracing::warn!("Rejected request from non-creator");
            return Err(LuckyDrawError::NotCreator {
                event: name.clone(),
                requester: requester.clone(),
            });
        }
        Ok(event)
    }

    async fn commit(&self, state: &mut RegistryState, candidate: EventSet) -> Result<()> {
        if let Err(error) = self.repository.save(&candidate).await {
            metrics::counter!(
                "lucky_draw.persistence.failures",
                "backend" => self.repository.backend()
            )
            .increment(1);
            tracing::error!(
                backend = self.repository.backend(),
                error = %error,
                "Commit failed, mutation discarded"
            );
            return Err(error.into());
        }
        state.events = candidate;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::persistence::{PersistenceError, RepositoryFuture};
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct RecordingRepository {
        saved: StdMutex<Option<EventSet>>,
        fail: AtomicBool,
    }

    impl EventRepository for RecordingRepository {
        fn backend(&self) -> &'static str {
            "recording"
        }

        fn load(&self) -> RepositoryFuture<'_, EventSet> {
            Box::pin(async move { Ok(self.saved.lock().unwrap().clone().unwrap_or_default()) })
        }

        fn save<'a>(&'a self, events: &'a EventSet) -> RepositoryFuture<'a, ()> {
            Box::pin(async move {
                if self.fail.load(Ordering::SeqCst) {
                    return Err(PersistenceError::Storage("offline".to_string()));
                }
                *self.saved.lock().unwrap() = Some(events.clone());
                Ok(())
            })
        }
    }

    async fn registry() -> (Arc<RecordingRepository>, EventRegistry) {
        let repository = Arc::new(RecordingRepository::default());
        let registry = EventRegistry::load_with_rng(
            repository.clone(),
            NumberAllocator::default(),
            StdRng::seed_from_u64(3),
        )
        .await
        .unwrap();
        (repository, registry)
    }

    fn registration(participant: &str, quota: u32, numbers: &[u32]) -> Registration {
        Registration {
            event: EventName::new("draw1"),
            participant_id: ParticipantId::new(participant),
            display_name: participant.to_string(),
            quota,
            numbers: numbers.to_vec(),
        }
    }

    #[tokio::test]
    async fn create_rejects_zero_winners_and_blank_names() {
        let (_, registry) = registry().await;
        let zero = registry
            .create_event(EventName::new("x"), ParticipantId::new("1"), 0)
            .await;
        assert!(matches!(zero, Err(LuckyDrawError::InvalidArgument(_))));

        let blank = registry
            .create_event(EventName::new("  "), ParticipantId::new("1"), 1)
            .await;
        assert!(matches!(blank, Err(LuckyDrawError::InvalidArgument(_))));
        assert!(registry.list_events().await.is_empty());
    }

    #[tokio::test]
    async fn every_mutation_is_committed() {
        let (repository, registry) = registry().await;
        registry
            .create_event(EventName::new("draw1"), ParticipantId::new("1"), 1)
            .await
            .unwrap();
        registry.register(registration("P1", 2, &[3])).await.unwrap();

        let saved = repository.saved.lock().unwrap().clone().unwrap();
        assert_eq!(saved["draw1"].held_by(&ParticipantId::new("P1")), 1);
    }

    #[tokio::test]
    async fn failed_commit_discards_registration() {
        let (repository, registry) = registry().await;
        registry
            .create_event(EventName::new("draw1"), ParticipantId::new("1"), 1)
            .await
            .unwrap();

        repository.fail.store(true, Ordering::SeqCst);
        let result = registry.register(registration("P1", 2, &[3])).await;
        assert!(matches!(result, Err(LuckyDrawError::PersistenceFailure(_))));
        assert!(registry.list_entries(&EventName::new("draw1")).await.unwrap().is_empty());

        repository.fail.store(false, Ordering::SeqCst);
        let claim = registry.register(registration("P2", 2, &[3])).await.unwrap();
        assert_eq!(claim.numbers, vec![3]);
        assert_eq!(claim.remaining_quota, 1);
    }

    #[tokio::test]
    async fn failed_commit_keeps_event_open_after_draw_attempt() {
        let (repository, registry) = registry().await;
        let name = EventName::new("draw1");
        let creator = ParticipantId::new("1");
        registry.create_event(name.clone(), creator.clone(), 1).await.unwrap();
        registry.register(registration("P1", 1, &[8])).await.unwrap();

        repository.fail.store(true, Ordering::SeqCst);
        assert!(registry.draw(&name, &creator).await.is_err());
        assert!(registry.cancel(&name, &creator).await.is_err());
        assert!(registry.get_event(&name).await.is_ok());
    }

    #[tokio::test]
    async fn existing_display_name_is_kept() {
        let (_, registry) = registry().await;
        registry
            .create_event(EventName::new("draw1"), ParticipantId::new("1"), 1)
            .await
            .unwrap();
        registry.register(registration("P1", 3, &[1])).await.unwrap();

        let mut renamed = registration("P1", 3, &[2]);
        renamed.display_name = "Someone Else".to_string();
        registry.register(renamed).await.unwrap();

        let entries = registry.list_entries(&EventName::new("draw1")).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].display_name, "P1");
        assert_eq!(entries[0].numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn remaining_quota_saturates() {
        let (_, registry) = registry().await;
        let name = EventName::new("draw1");
        registry
            .create_event(name.clone(), ParticipantId::new("1"), 1)
            .await
            .unwrap();
        registry.register(registration("P1", 2, &[1, 2])).await.unwrap();

        let p1 = ParticipantId::new("P1");
        assert_eq!(registry.remaining_quota(&name, &p1, 5).await.unwrap(), 3);
        assert_eq!(registry.remaining_quota(&name, &p1, 1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn claim_reports_quota_left_at_commit() {
        let (_, registry) = registry().await;
        registry
            .create_event(EventName::new("draw1"), ParticipantId::new("1"), 1)
            .await
            .unwrap();

        let first = registry.register(registration("P1", 4, &[1])).await.unwrap();
        assert_eq!(first.remaining_quota, 3);
        let second = registry.register(registration("P1", 4, &[5, 2])).await.unwrap();
        assert_eq!(second.numbers, vec![2, 5]);
        assert_eq!(second.remaining_quota, 1);
    }

    #[tokio::test]
    async fn admin_entry_requires_the_creator() {
        let (repository, registry) = registry().await;
        let name = EventName::new("draw1");
        registry
            .create_event(name.clone(), ParticipantId::new("1"), 1)
            .await
            .unwrap();

        let denied = registry
            .admin_add_entry(&ParticipantId::new("P1"), registration("P1", 100, &[1, 2, 3]))
            .await;
        assert!(matches!(denied, Err(LuckyDrawError::NotCreator { .. })));
        assert!(registry.list_entries(&name).await.unwrap().is_empty());
        assert!(repository.saved.lock().unwrap().as_ref().unwrap()["draw1"].entries.is_empty());

        let claim = registry
            .admin_add_entry(&ParticipantId::new("1"), registration("P1", 100, &[1, 2, 3]))
            .await
            .unwrap();
        assert_eq!(claim.numbers, vec![1, 2, 3]);
        assert_eq!(claim.remaining_quota, 97);
    }
}
