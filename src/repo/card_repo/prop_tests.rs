use super::*;
use crate::test_utils::{arb_card, arb_card_state, arb_date, arb_difficulty, arb_stability, setup_test_db};
use proptest::prelude::*;

/// A card that may or may not carry review history
fn arb_card_with_history() -> impl Strategy<Value = Card> {
    (
        arb_card(),
        arb_card_state(),
        prop::option::of((1i32..10_000, arb_date(), arb_stability(), arb_difficulty())),
    )
        .prop_map(|(mut card, state, history)| {
            match history {
                Some((review_id, due, stability, difficulty)) => {
                    card.set_state(if state == CardState::New { CardState::Review } else { state });
                    card.set_last_review_id(Some(review_id));
                    card.set_next_due_date(Some(due));
                    card.set_stability(Some(stability));
                    card.set_difficulty(Some(difficulty));
                }
                None => card.set_state(CardState::New),
            }
            card
        })
}

proptest! {
    /// Merging onto nothing stores the incoming card as-is
    #[test]
    fn prop_merge_without_existing_is_identity(card in arb_card_with_history()) {
        let row = CardRow::from(&card);
        prop_assert_eq!(merge_card_rows(row.clone(), None), row);
    }

    /// Content comes from the incoming card, history is preserved unless replaced
    #[test]
    fn prop_merge_law(incoming in arb_card_with_history(), existing in arb_card_with_history()) {
        let incoming = CardRow::from(&incoming);
        let existing = CardRow::from(&existing);
        let merged = merge_card_rows(incoming.clone(), Some(&existing));

        prop_assert_eq!(&merged.uuid, &incoming.uuid);
        prop_assert_eq!(&merged.deck_name, &incoming.deck_name);
        prop_assert_eq!(&merged.front, &incoming.front);
        prop_assert_eq!(&merged.back, &incoming.back);
        prop_assert_eq!(&merged.tags, &incoming.tags);
        prop_assert_eq!(&merged.media_paths, &incoming.media_paths);
        prop_assert_eq!(merged.modified_at, incoming.modified_at);
        prop_assert_eq!(merged.front_length, incoming.front_length);
        prop_assert_eq!(merged.tag_count, incoming.tag_count);

        prop_assert_eq!(merged.added_at, existing.added_at);
        prop_assert_eq!(merged.last_review_id, incoming.last_review_id.or(existing.last_review_id));
        prop_assert_eq!(merged.next_due_date, incoming.next_due_date.or(existing.next_due_date));
        prop_assert_eq!(merged.stability, incoming.stability.or(existing.stability));
        prop_assert_eq!(merged.difficulty, incoming.difficulty.or(existing.difficulty));

        let expected_state = if incoming.state != "New" { &incoming.state } else { &existing.state };
        prop_assert_eq!(&merged.state, expected_state);
    }

    /// Merging two consistent rows never breaks the review memory invariant
    #[test]
    fn prop_merge_keeps_review_memory_consistent(
        incoming in arb_card_with_history(),
        existing in arb_card_with_history(),
    ) {
        let incoming = CardRow::from(&incoming);
        let existing = CardRow::from(&existing);
        prop_assert!(incoming.validate_review_memory().is_ok());
        prop_assert!(existing.validate_review_memory().is_ok());
        let merged = merge_card_rows(incoming, Some(&existing));
        prop_assert!(merged.validate_review_memory().is_ok());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Storing the same batch twice leaves the store unchanged
    #[test]
    fn prop_upsert_is_idempotent(cards in prop::collection::vec(arb_card(), 1..6)) {
        let db = setup_test_db();
        prop_assert_eq!(upsert_cards_batch(&db, &cards).unwrap(), cards.len());
        let first = get_all_cards(&db, None).unwrap();
        prop_assert_eq!(upsert_cards_batch(&db, &cards).unwrap(), cards.len());
        let second = get_all_cards(&db, None).unwrap();
        prop_assert_eq!(first.len(), cards.len());
        prop_assert_eq!(first, second);
    }
}
