//! Statistical check that registry draws are uniform over claimed pairs.
//!
//! Run with: `cargo test --test draw_distribution_test -- --nocapture`

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::cast_precision_loss)] // Counts are small

use lucky_draw_core::{EventName, ParticipantId};
use lucky_draw_testing::InMemorySnapshotStore;
use lucky_draw_testing::fixtures::{self, registration};
use std::collections::HashMap;
use std::sync::Arc;

#[tokio::test]
async fn repeated_draws_approximate_uniform_distribution() {
    let registry = fixtures::registry(Arc::new(InMemorySnapshotStore::new()))
        .await
        .unwrap();
    let name = EventName::new("weekly");
    let creator = ParticipantId::new("1");
    let trials = 4_000;
    let mut wins: HashMap<(String, u32), usize> = HashMap::new();

    for _ in 0..trials {
        registry.create_event(name.clone(), creator.clone(), 2).await.unwrap();
        // Five pairs in total; P1 holds three of them.
        registry.register(registration("weekly", "P1", 3, &[1, 2, 3])).await.unwrap();
        registry.register(registration("weekly", "P2", 3, &[4])).await.unwrap();
        registry.register(registration("weekly", "P3", 3, &[5])).await.unwrap();

        let winners = registry.draw(&name, &creator).await.unwrap();
        assert_eq!(winners.len(), 2);
        assert_ne!(winners[0].number, winners[1].number);
        for winner in winners {
            *wins
                .entry((winner.participant_id.as_str().to_string(), winner.number))
                .or_default() += 1;
        }
    }

    assert_eq!(wins.len(), 5);
    for ((participant, number), count) in &wins {
        let share = *count as f64 / f64::from(trials);
        println!("  {participant}/{number}: {share:.3}");
        assert!(
            (share - 0.4).abs() < 0.04,
            "pair {participant}/{number} won {share:.3} of draws, expected ~0.4"
        );
    }
}
