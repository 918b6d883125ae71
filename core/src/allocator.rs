//! Number allocation policy: request validation, event-wide uniqueness and quotas.
//!
//! The allocator never mutates an event. [`NumberAllocator::check`] either
//! returns the exact set of numbers that may be appended, or the error that
//! rejects the whole batch.

use crate::error::{LuckyDrawError, Result};
use crate::ids::ParticipantId;
use crate::types::Event;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::RangeInclusive;

/// Inclusive range of numbers participants may claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberPool {
    min: u32,
    max: u32,
}

impl NumberPool {
    /// Create a pool covering `min..=max`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `min > max`.
    pub fn new(min: u32, max: u32) -> Result<Self> {
        if min > max {
            return Err(LuckyDrawError::invalid(format!(
                "number pool is empty: {min} > {max}"
            )));
        }
        Ok(Self { min, max })
    }

    /// Smallest claimable number.
    #[must_use]
    pub const fn min(&self) -> u32 {
        self.min
    }

    /// Largest claimable number.
    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max
    }

    /// Whether `number` lies inside the pool.
    #[must_use]
    pub const fn contains(&self, number: u32) -> bool {
        number >= self.min && number <= self.max
    }

    /// The pool as a range.
    #[must_use]
    pub const fn range(&self) -> RangeInclusive<u32> {
        self.min..=self.max
    }
}

impl Default for NumberPool {
    fn default() -> Self {
        Self { min: 1, max: 100 }
    }
}

/// Stateless uniqueness and quota checks used by registration.
#[derive(Clone, Copy, Debug, Default)]
pub struct NumberAllocator {
    pool: NumberPool,
}

impl NumberAllocator {
    /// Create an allocator for the given pool.
    #[must_use]
    pub const fn new(pool: NumberPool) -> Self {
        Self { pool }
    }

    /// The configured number pool.
    #[must_use]
    pub const fn pool(&self) -> NumberPool {
        self.pool
    }

    /// Validate the shape of a request and collect it into a set.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the batch is empty, repeats a number, or
    /// contains a number outside the pool.
    pub fn normalize(&self, numbers: &[u32]) -> Result<BTreeSet<u32>> {
        if numbers.is_empty() {
            return Err(LuckyDrawError::invalid("at least one number is required"));
        }

        let mut set = BTreeSet::new();
        for &number in numbers {
            if !self.pool.contains(number) {
                return Err(LuckyDrawError::invalid(format!(
                    "number {number} is outside {}..={}",
                    self.pool.min, self.pool.max
                )));
            }
            if !set.insert(number) {
                return Err(LuckyDrawError::invalid(format!(
                    "number {number} appears more than once in the request"
                )));
            }
        }
        Ok(set)
    }

    /// First number of the request, in request order, already held by anyone in the event.
    ///
    /// The requester's own entry counts: re-claiming a held number is a conflict.
    #[must_use]
    pub fn first_taken(event: &Event, numbers: &[u32]) -> Option<u32> {
        let taken: BTreeSet<u32> = event
            .entries
            .values()
            .flat_map(|entry| entry.numbers.iter().copied())
            .collect();
        numbers.iter().copied().find(|number| taken.contains(number))
    }

    /// Reject when `held + requested` would exceed `quota`.
    ///
    /// # Errors
    ///
    /// `QuotaExceeded` with the counts involved.
    pub fn check_quota(
        participant: &ParticipantId,
        held: usize,
        requested: usize,
        quota: u32,
    ) -> Result<()> {
        let limit = usize::try_from(quota).unwrap_or(usize::MAX);
        if held.saturating_add(requested) > limit {
            return Err(LuckyDrawError::QuotaExceeded {
                participant: participant.clone(),
                held,
                requested,
                quota,
            });
        }
        Ok(())
    }

    /// Run every check for a registration batch.
    ///
    /// Returns the numbers to append when the batch is acceptable as a whole.
    ///
    /// # Errors
    ///
    /// `InvalidArgument`, `NumberAlreadyTaken` or `QuotaExceeded`, checked in
    /// that order.
    pub fn check(
        &self,
        event: &Event,
        participant: &ParticipantId,
        numbers: &[u32],
        quota: u32,
    ) -> Result<BTreeSet<u32>> {
        let requested = self.normalize(numbers)?;

        if let Some(number) = Self::first_taken(event, numbers) {
            return Err(LuckyDrawError::NumberAlreadyTaken {
                event: event.name.clone(),
                number,
            });
        }

        Self::check_quota(participant, event.held_by(participant), requested.len(), quota)?;
        Ok(requested)
    }

    /// Pool numbers nobody holds yet, ascending.
    #[must_use]
    pub fn available(&self, event: &Event) -> Vec<u32> {
        let taken: BTreeSet<u32> = event
            .entries
            .values()
            .flat_map(|entry| entry.numbers.iter().copied())
            .collect();
        self.pool.range().filter(|n| !taken.contains(n)).collect()
    }
}
