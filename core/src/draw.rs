//! Unbiased winner selection.
//!
//! A draw samples `num_winners` distinct (participant, number) pairs without
//! replacement. The selection is a partial Fisher-Yates shuffle over the
//! flattened pairs: every pair is chosen with probability `k / N` and every
//! size-`k` subset is equally likely. A participant holding more numbers
//! therefore has proportionally more chances, and can win more than once.

use crate::error::{LuckyDrawError, Result};
use crate::types::{Event, Winner};
use rand::Rng;
use rand::seq::SliceRandom;

/// Selects winners for an event. Holds no state; randomness is supplied by the caller.
#[derive(Clone, Copy, Debug, Default)]
pub struct DrawEngine;

impl DrawEngine {
    /// Select `event.num_winners` pairs uniformly at random.
    ///
    /// Winners are returned sorted by number so the announcement is stable
    /// regardless of shuffle order.
    ///
    /// # Errors
    ///
    /// `InsufficientEntries` if the event holds fewer pairs than winners.
    pub fn select<R: Rng + ?Sized>(event: &Event, rng: &mut R) -> Result<Vec<Winner>> {
        let mut pairs = event.pairs();
        let required = usize::try_from(event.num_winners).unwrap_or(usize::MAX);

        if pairs.len() < required {
            return Err(LuckyDrawError::InsufficientEntries {
                event: event.name.clone(),
                available: pairs.len(),
                required: event.num_winners,
            });
        }

        let (chosen, _) = pairs.partial_shuffle(rng, required);
        let mut winners = chosen.to_vec();
        winners.sort_by_key(|winner| winner.number);
        Ok(winners)
    }
}

#[cfg(test)]
#[allow(clippy::cast_precision_loss)]
mod tests {
    use super::*;
    use crate::ids::{EventName, ParticipantId};
    use crate::types::Entry;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::{BTreeSet, HashMap};

    fn event(num_winners: u32, holdings: &[(&str, &[u32])]) -> Event {
        let mut event = Event::new(EventName::new("e"), ParticipantId::new("c"), num_winners);
        for (participant, numbers) in holdings {
            let mut entry = Entry::new(*participant);
            entry.numbers.extend(numbers.iter().copied());
            event.entries.insert(ParticipantId::new(*participant), entry);
        }
        event
    }

    #[test]
    fn returns_exactly_k_distinct_pairs() {
        let event = event(2, &[("P1", &[5]), ("P2", &[7]), ("P3", &[9])]);
        let mut rng = StdRng::seed_from_u64(7);
        let winners = DrawEngine::select(&event, &mut rng).unwrap_or_default();

        assert_eq!(winners.len(), 2);
        let numbers: BTreeSet<u32> = winners.iter().map(|w| w.number).collect();
        assert_eq!(numbers.len(), 2);
        assert!(numbers.is_subset(&BTreeSet::from([5, 7, 9])));
    }

    #[test]
    fn insufficient_entries_is_rejected() {
        let event = event(3, &[("P1", &[1]), ("P2", &[2])]);
        let mut rng = StdRng::seed_from_u64(1);
        let result = DrawEngine::select(&event, &mut rng);
        assert!(matches!(
            result,
            Err(LuckyDrawError::InsufficientEntries { available: 2, required: 3, .. })
        ));
    }

    #[test]
    fn drawing_every_pair_returns_all_of_them() {
        let event = event(3, &[("P1", &[1, 2]), ("P2", &[3])]);
        let mut rng = StdRng::seed_from_u64(99);
        let winners = DrawEngine::select(&event, &mut rng).unwrap_or_default();
        let numbers: Vec<u32> = winners.iter().map(|w| w.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn every_subset_is_equally_likely() {
        let event = event(2, &[("P1", &[5]), ("P2", &[7]), ("P3", &[9])]);
        let mut rng = StdRng::seed_from_u64(2024);
        let trials = 30_000;
        let mut subsets: HashMap<Vec<u32>, usize> = HashMap::new();

        for _ in 0..trials {
            let winners = DrawEngine::select(&event, &mut rng).unwrap_or_default();
            let key: Vec<u32> = winners.iter().map(|w| w.number).collect();
            *subsets.entry(key).or_default() += 1;
        }

        assert_eq!(subsets.len(), 3);
        for count in subsets.values() {
            let share = *count as f64 / f64::from(trials);
            assert!((share - 1.0 / 3.0).abs() < 0.02, "subset share {share}");
        }
    }

    #[test]
    fn each_pair_wins_with_probability_k_over_n() {
        let event = event(
            3,
            &[("P1", &[1, 2, 3, 4]), ("P2", &[5, 6]), ("P3", &[7, 8, 9, 10])],
        );
        let mut rng = StdRng::seed_from_u64(11);
        let trials = 20_000;
        let mut wins: HashMap<u32, usize> = HashMap::new();

        for _ in 0..trials {
            for winner in DrawEngine::select(&event, &mut rng).unwrap_or_default() {
                *wins.entry(winner.number).or_default() += 1;
            }
        }

        for number in 1..=10 {
            let share = wins.get(&number).copied().unwrap_or(0) as f64 / f64::from(trials);
            assert!((share - 0.3).abs() < 0.02, "number {number} share {share}");
        }
    }
}
