use super::*;
use crate::test_utils::{arb_card_state, arb_date, arb_datetime_utc, arb_difficulty, arb_rating, arb_stability};
use proptest::prelude::*;

fn arb_cached() -> impl Strategy<Value = CachedMemoryState> {
    (
        arb_card_state(),
        prop::option::of((arb_stability(), arb_difficulty(), arb_date())),
    )
        .prop_map(|(state, memory)| match memory {
            Some((stability, difficulty, last)) if state != CardState::New => CachedMemoryState {
                state,
                stability: Some(stability),
                difficulty: Some(difficulty),
                last_reviewed_on: Some(last),
            },
            _ => CachedMemoryState {
                state,
                ..CachedMemoryState::default()
            },
        })
}

proptest! {
    /// Same-day states schedule 0 days, review schedules at least one
    #[test]
    fn prop_interval_matches_state(cached in arb_cached(), rating in arb_rating(), now in arb_datetime_utc()) {
        let out = Scheduler::default().compute_next_state(&cached, rating.value(), now).unwrap();
        prop_assert!(out.elapsed_days >= 0);
        prop_assert!(out.scheduled_days >= 0);
        match out.state {
            CardState::Review => prop_assert!(out.scheduled_days > 0),
            _ => prop_assert_eq!(out.scheduled_days, 0),
        }
        prop_assert_eq!(out.review_type, ReviewType::for_state_before(cached.state));
        let due = now.date_naive() + chrono::Duration::days(out.scheduled_days as i64);
        prop_assert_eq!(out.next_due, due);
    }

    /// Graduating with Easy never schedules sooner than with Good
    #[test]
    fn prop_easy_graduates_no_sooner_than_good(
        stability in arb_stability(),
        difficulty in arb_difficulty(),
        state in prop::sample::select(vec![CardState::Learning, CardState::Relearning, CardState::Review]),
        now in arb_datetime_utc(),
        gap in 0i64..60,
    ) {
        let cached = CachedMemoryState {
            state,
            stability: Some(stability),
            difficulty: Some(difficulty),
            last_reviewed_on: Some(now.date_naive() - chrono::Duration::days(gap)),
        };
        let scheduler = Scheduler::default();
        let good = scheduler.compute_next_state(&cached, 3, now).unwrap();
        let easy = scheduler.compute_next_state(&cached, 4, now).unwrap();
        prop_assert!(easy.scheduled_days >= good.scheduled_days);
        prop_assert!(easy.stability >= good.stability);
    }

    /// Ratings outside 1-4 never reach the engine
    #[test]
    fn prop_invalid_rating_rejected(cached in arb_cached(), rating in prop_oneof![i32::MIN..1, 5..i32::MAX]) {
        let err = Scheduler::default().compute_next_state(&cached, rating, Utc::now()).unwrap_err();
        prop_assert!(matches!(err, FlashcoreError::InvalidRating(r) if r == rating));
    }
}
