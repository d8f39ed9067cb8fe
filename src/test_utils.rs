use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;

use crate::db::Database;
use crate::models::{Card, CardState, Rating};

/// Sets up an in-memory store with migrations applied
///
/// Every call returns an independent store.
///
/// ### Returns
///
/// An Arc-wrapped `Database` that is already connected
pub fn setup_test_db() -> Arc<Database> {
    let db = Database::in_memory();
    db.connect().expect("Failed to open in-memory database");
    Arc::new(db)
}

/// Stores `cards` in `db`, panicking on failure
pub fn seed_cards(db: &Database, cards: &[Card]) {
    let written = crate::repo::upsert_cards_batch(db, cards).expect("Failed to seed cards");
    assert_eq!(written, cards.len());
}

/// A UTC timestamp between 2020 and 2030
pub fn arb_datetime_utc() -> impl Strategy<Value = DateTime<Utc>> {
    let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    (0i64..(10 * 365 * 24 * 3600)).prop_map(move |secs| start + Duration::seconds(secs))
}

/// A calendar date between 2020 and 2030
pub fn arb_date() -> impl Strategy<Value = NaiveDate> {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    (0i64..(10 * 365)).prop_map(move |days| start + Duration::days(days))
}

pub fn arb_rating() -> impl Strategy<Value = Rating> {
    prop::sample::select(Rating::ALL.to_vec())
}

pub fn arb_ratings(max_len: usize) -> impl Strategy<Value = Vec<Rating>> {
    prop::collection::vec(arb_rating(), 1..=max_len)
}

pub fn arb_card_state() -> impl Strategy<Value = CardState> {
    prop::sample::select(CardState::ALL.to_vec())
}

/// A kebab-case tag
pub fn arb_tag() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,8}(-[a-z0-9]{1,8}){0,2}"
}

pub fn arb_tags() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(arb_tag(), 0..5)
}

pub fn arb_deck_name() -> impl Strategy<Value = String> {
    "[A-Z][a-zA-Z]{0,10}(::[A-Z][a-zA-Z]{0,10})?"
}

/// Card text including multi-byte characters
pub fn arb_card_text() -> impl Strategy<Value = String> {
    "\\PC{1,120}"
}

/// A valid card with random content and no review history
pub fn arb_card() -> impl Strategy<Value = Card> {
    (
        arb_deck_name(),
        arb_card_text(),
        arb_card_text(),
        arb_tags(),
        prop::collection::vec("[a-z]{1,8}\\.(png|mp3)", 0..3),
        arb_datetime_utc(),
    )
        .prop_map(|(deck, front, back, tags, media, added_at)| {
            Card::new(deck, front, back)
                .with_tags(tags)
                .with_media(media)
                .with_added_at(added_at)
        })
}

/// Memory stability in days
pub fn arb_stability() -> impl Strategy<Value = f64> {
    0.1f64..3650.0
}

/// Memory difficulty on the 1-10 scale
pub fn arb_difficulty() -> impl Strategy<Value = f64> {
    1.0f64..=10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::prelude::*;

    #[test]
    fn test_setup_test_db_has_tables() {
        let db = setup_test_db();
        let count = db
            .with_connection(|conn| {
                crate::schema::cards::table
                    .count()
                    .get_result::<i64>(conn)
                    .map_err(|e| crate::errors::FlashcoreError::storage("count cards", e))
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_stores_are_independent() {
        let first = setup_test_db();
        let second = setup_test_db();
        seed_cards(&first, &[Card::new("Deck", "Q", "A")]);
        assert_eq!(crate::repo::get_all_cards(&first, None).unwrap().len(), 1);
        assert!(crate::repo::get_all_cards(&second, None).unwrap().is_empty());
    }
}
