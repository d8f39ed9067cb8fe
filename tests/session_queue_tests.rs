/// Integration tests for review sessions over a file store
use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Duration;
use flashcore::{repo, Card, CardState, Database, FlashcoreError, ReviewSession};
use tempfile::tempdir;

mod common;
use common::*;

fn session_over(db: &Arc<Database>, deck: Option<&str>) -> ReviewSession {
    ReviewSession::new(Arc::new(processor(db)), deck.map(str::to_string))
        .with_user(Some("tester".to_string()))
}

#[test]
fn test_full_session_round_trip() {
    let dir = tempdir().unwrap();
    let path = store_path(&dir);
    let db = file_store(&path);
    let first = Card::new("Capitals", "France", "Paris");
    let second = Card::new("Capitals", "Peru", "Lima");
    let other = Card::new("Rivers", "Longest", "Nile");
    ingest(&db, &[first.clone(), second.clone(), other.clone()]);

    let today = at(5, 1, 9).date_naive();
    let mut session = session_over(&db, Some("Capitals"));
    assert_eq!(session.initialize_for_date(today, None, None).unwrap(), 2);
    let session_uuid = session.session_uuid().unwrap();

    let err = session
        .submit_review(other.get_uuid(), 3, Some(at(5, 1, 9).into()), None, None)
        .unwrap_err();
    assert!(matches!(err, FlashcoreError::CardNotInSession(u) if u == other.get_uuid()));

    let mut ts = at(5, 1, 9);
    while let Some(card) = session.get_next_card().cloned() {
        let updated = session
            .submit_review(card.get_uuid(), 3, Some(ts.into()), Some(1200), Some(400))
            .unwrap();
        assert_eq!(updated.get_state(), CardState::Learning);
        ts += Duration::minutes(1);
    }

    let stats = session.get_session_stats();
    assert_eq!((stats.total_cards, stats.reviewed, stats.remaining), (2, 2, 0));

    let ended = session.end_session().unwrap().unwrap();
    assert!(!ended.is_active());
    assert_eq!(ended.get_cards_reviewed(), 2);
    assert_eq!(ended.get_user_id(), Some("tester"));
    assert_eq!(ended.get_decks_accessed(), &BTreeSet::from(["Capitals".to_string()]));
    db.close();

    // The session and its reviews survive a reopen
    let reopened = Database::open(&path);
    let stored = repo::get_session_by_uuid(&reopened, session_uuid).unwrap().unwrap();
    assert_eq!(stored.get_cards_reviewed(), 2);
    assert!(stored.get_end_ts().is_some());
    let reviews = repo::get_reviews_for_session(&reopened, session_uuid).unwrap();
    assert_eq!(reviews.len(), 2);
    assert!(reviews.iter().all(|r| r.get_session_uuid() == Some(session_uuid)));
    assert!(repo::get_reviews_for_card(&reopened, other.get_uuid(), false).unwrap().is_empty());
}

#[test]
fn test_learning_cards_requeue_until_graduated() {
    let dir = tempdir().unwrap();
    let db = file_store(&store_path(&dir));
    let cards = [Card::new("Deck", "one", "A"), Card::new("Deck", "two", "A")];
    ingest(&db, &cards);
    let today = at(5, 1, 9).date_naive();

    let mut session = session_over(&db, None);
    assert_eq!(session.initialize_for_date(today, None, None).unwrap(), 2);
    for card in &cards {
        session.submit_review(card.get_uuid(), 1, Some(at(5, 1, 9).into()), None, None).unwrap();
    }
    session.end_session().unwrap();

    // Learning cards are due again later the same day
    let mut again = session_over(&db, None);
    assert_eq!(again.initialize_for_date(today, None, None).unwrap(), 2);
    for card in &cards {
        let updated = again
            .submit_review(card.get_uuid(), 3, Some(at(5, 1, 10).into()), None, None)
            .unwrap();
        assert_eq!(updated.get_state(), CardState::Review);
        assert!(updated.get_next_due_date().unwrap() > today);
    }
    again.end_session().unwrap();

    let mut done = session_over(&db, None);
    assert_eq!(done.initialize_for_date(today, None, None).unwrap(), 0);
    assert!(done.get_next_card().is_none());
    assert_eq!(repo::get_active_sessions(&db, Some("tester")).unwrap().len(), 1);
    done.end_session().unwrap();
    assert!(repo::get_active_sessions(&db, Some("tester")).unwrap().is_empty());
}

#[test]
fn test_tag_filtered_session() {
    let db = in_memory_store();
    let geo = Card::new("Deck", "geo", "A").with_tags(["geo", "europe"]);
    let geo_asia = Card::new("Deck", "asia", "A").with_tags(["geo"]);
    let plain = Card::new("Deck", "plain", "A");
    ingest(&db, &[geo.clone(), geo_asia.clone(), plain]);
    let today = at(5, 1, 9).date_naive();

    let mut session = session_over(&db, Some("Deck"));
    let tags = BTreeSet::from(["europe".to_string(), "history".to_string()]);
    assert_eq!(session.initialize_for_date(today, None, Some(tags)).unwrap(), 1);
    assert_eq!(session.get_next_card().unwrap().get_uuid(), geo.get_uuid());

    let mut any_geo = session_over(&db, Some("Deck"));
    let tags = BTreeSet::from(["geo".to_string()]);
    assert_eq!(any_geo.initialize_for_date(today, None, Some(tags)).unwrap(), 2);

    let mut limited = session_over(&db, Some("Deck"));
    assert_eq!(limited.initialize_for_date(today, Some(2), None).unwrap(), 2);
}
