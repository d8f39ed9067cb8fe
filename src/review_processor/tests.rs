use super::*;
use crate::models::{CardState, ReviewType};
use crate::test_utils::{seed_cards, setup_test_db};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn processor() -> (Arc<Database>, ReviewProcessor) {
    let db = setup_test_db();
    let processor = ReviewProcessor::new(Arc::clone(&db), Scheduler::default());
    (db, processor)
}

fn morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap()
}

#[test]
fn test_first_review_records_learning_step() {
    let (db, processor) = processor();
    let card = Card::new("Deck", "Q", "A");
    seed_cards(&db, &[card.clone()]);
    let session = Uuid::new_v4();

    let updated = processor
        .process_review(&card, 3, Some(2000), Some(500), Some(morning().into()), Some(session))
        .unwrap();
    assert_eq!(updated.get_state(), CardState::Learning);
    assert_eq!(updated.get_next_due_date(), Some(morning().date_naive()));

    let review = repo::get_latest_review_for_card(&db, card.get_uuid()).unwrap().unwrap();
    assert_eq!(updated.get_last_review_id(), review.get_review_id());
    assert_eq!(review.get_stab_before(), None);
    assert_eq!(review.get_stab_after(), updated.get_stability().unwrap());
    assert_eq!(review.get_diff(), updated.get_difficulty().unwrap());
    assert_eq!(review.get_review_type(), ReviewType::Learn);
    assert_eq!(review.get_elapsed_days_at_review(), 0);
    assert_eq!(review.get_scheduled_days_interval(), 0);
    assert_eq!(review.get_session_uuid(), Some(session));
    assert_eq!(review.get_resp_ms(), Some(2000));
    assert_eq!(review.get_ts(), morning());
}

#[test]
fn test_second_review_uses_cached_state() {
    let (db, processor) = processor();
    let card = Card::new("Deck", "Q", "A");
    seed_cards(&db, &[card.clone()]);

    let first = processor
        .process_review(&card, 3, None, None, Some(morning().into()), None)
        .unwrap();
    let next_day = morning() + Duration::days(1);
    let second = processor
        .process_review(&first, 3, None, None, Some(next_day.into()), None)
        .unwrap();

    assert_eq!(second.get_state(), CardState::Review);
    assert!(second.get_next_due_date().unwrap() > next_day.date_naive());

    let review = repo::get_latest_review_for_card(&db, card.get_uuid()).unwrap().unwrap();
    assert_eq!(review.get_stab_before(), first.get_stability());
    assert_eq!(review.get_elapsed_days_at_review(), 1);
    assert!(review.get_scheduled_days_interval() > 0);
    assert_eq!(review.get_review_type(), ReviewType::Learn);
    assert_eq!(repo::get_reviews_for_card(&db, card.get_uuid(), false).unwrap().len(), 2);
}

#[test]
fn test_invalid_rating_stores_nothing() {
    let (db, processor) = processor();
    let card = Card::new("Deck", "Q", "A");
    seed_cards(&db, &[card.clone()]);

    let err = processor
        .process_review(&card, 7, None, None, None, None)
        .unwrap_err();
    assert!(matches!(err, FlashcoreError::InvalidRating(7)));
    assert!(repo::get_reviews_for_card(&db, card.get_uuid(), true).unwrap().is_empty());
    assert_eq!(repo::get_card_by_uuid(&db, card.get_uuid()).unwrap().unwrap(), card);
}

#[test]
fn test_review_by_uuid() {
    let (db, processor) = processor();
    let card = Card::new("Deck", "Q", "A");
    seed_cards(&db, &[card.clone()]);

    let updated = processor
        .process_review_by_uuid(card.get_uuid(), 4, None, None, None, None)
        .unwrap();
    assert_eq!(updated.get_state(), CardState::Learning);

    let missing = Uuid::new_v4();
    let err = processor
        .process_review_by_uuid(missing, 3, None, None, None, None)
        .unwrap_err();
    assert!(matches!(err, FlashcoreError::CardNotFound(uuid) if uuid == missing));
}

#[test]
fn test_unstored_card_is_not_found() {
    let (_db, processor) = processor();
    let ghost = Card::new("Deck", "Q", "A");
    let err = processor
        .process_review(&ghost, 3, None, None, None, None)
        .unwrap_err();
    assert!(matches!(err, FlashcoreError::CardNotFound(_)));
}
