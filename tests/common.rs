//! Common test utilities for flashcore integration tests
//!
//! Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use flashcore::{repo, Card, Database, DatabaseConfig, ReviewProcessor, Scheduler};
use tempfile::TempDir;

/// Creates a connected in-memory store with the schema applied
pub fn in_memory_store() -> Arc<Database> {
    let db = Database::in_memory();
    db.connect().expect("Failed to open in-memory store");
    Arc::new(db)
}

/// Path of a store file inside `dir`; the file does not exist yet
pub fn store_path(dir: &TempDir) -> PathBuf {
    dir.path().join("data").join("cards.db")
}

/// Creates a writable file store at `path` with the schema applied
pub fn file_store(path: &Path) -> Arc<Database> {
    let db = Database::new(DatabaseConfig::file(path));
    db.initialize_schema(false).expect("Failed to initialize file store");
    Arc::new(db)
}

/// Creates a review processor over `db` with the default FSRS engine
pub fn processor(db: &Arc<Database>) -> ReviewProcessor {
    ReviewProcessor::new(Arc::clone(db), Scheduler::default())
}

/// Stores `cards`, panicking on failure
pub fn ingest(db: &Database, cards: &[Card]) {
    let written = repo::upsert_cards_batch(db, cards).expect("Failed to ingest cards");
    assert_eq!(written, cards.len());
}

/// A UTC timestamp on 2025-`month`-`day` at `hour`:00
pub fn at(month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, month, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Reviews `card` at `ts`, panicking on failure
pub fn review(processor: &ReviewProcessor, card: &Card, rating: i32, ts: DateTime<Utc>) -> Card {
    processor
        .process_review(card, rating, Some(1000), Some(300), Some(ts.into()), None)
        .expect("Failed to process review")
}
