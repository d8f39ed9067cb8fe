use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{NaiveDate, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::db::Database;
use crate::errors::{FlashcoreError, Result};
use crate::models::{Card, CardRow, CardState};
use crate::schema::{cards, reviews};

/// Maximum number of bound UUIDs per DELETE statement
const DELETE_CHUNK_SIZE: usize = 500;

/// Filters for selecting due cards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueCardQuery {
    /// Cards due on or before this date are selected, as are new cards
    pub on_date: NaiveDate,
    /// Restrict to one deck
    pub deck_name: Option<String>,
    /// Keep only cards carrying at least one of these tags
    pub tags: Option<BTreeSet<String>>,
    /// Maximum number of cards to return
    pub limit: Option<usize>,
}

impl DueCardQuery {
    pub fn on(on_date: NaiveDate) -> Self {
        Self {
            on_date,
            deck_name: None,
            tags: None,
            limit: None,
        }
    }

    pub fn with_deck(mut self, deck_name: Option<String>) -> Self {
        self.deck_name = deck_name;
        self
    }

    pub fn with_tags(mut self, tags: Option<BTreeSet<String>>) -> Self {
        self.tags = tags.filter(|t| !t.is_empty());
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }
}

/// Card and due counts for one deck
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeckStats {
    pub deck_name: String,
    pub card_count: i64,
    pub due_count: i64,
}

/// Summary counts over the whole store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseStats {
    pub total_cards: i64,
    pub total_reviews: i64,
    /// Ordered by deck name
    pub decks: Vec<DeckStats>,
    /// Card count per state name
    pub states: BTreeMap<String, i64>,
}

fn to_card(row: CardRow) -> Result<Card> {
    let key = row.uuid.clone();
    Card::try_from(row).map_err(|source| FlashcoreError::Marshalling {
        entity: "card",
        key,
        source,
    })
}

fn to_cards(rows: Vec<CardRow>) -> Result<Vec<Card>> {
    rows.into_iter().map(to_card).collect()
}

/// Combines an incoming card with the stored version of the same card
///
/// Content fields come from `incoming`. Review history fields keep the stored
/// value unless the incoming card carries one, so re-ingesting a card never
/// loses its learning progress. The stored `added_at` always wins.
pub(crate) fn merge_card_rows(incoming: CardRow, existing: Option<&CardRow>) -> CardRow {
    let Some(existing) = existing else {
        return incoming;
    };
    let new_state = CardState::New.as_str();
    let state = if incoming.state != new_state {
        incoming.state
    } else if !existing.state.is_empty() {
        existing.state.clone()
    } else {
        new_state.to_string()
    };
    CardRow {
        added_at: existing.added_at,
        last_review_id: incoming.last_review_id.or(existing.last_review_id),
        next_due_date: incoming.next_due_date.or(existing.next_due_date),
        stability: incoming.stability.or(existing.stability),
        difficulty: incoming.difficulty.or(existing.difficulty),
        state,
        ..incoming
    }
}

/// Inserts or updates a batch of cards in one transaction
///
/// Each card is merged with its stored version (see `merge_card_rows`). The
/// batch is all-or-nothing.
///
/// ### Arguments
///
/// * `db` - The store
/// * `cards` - Cards to write
///
/// ### Returns
///
/// The number of cards written
///
/// ### Errors
///
/// Returns `ReadOnlyViolation` on a read-only handle, `Marshalling` if a card
/// fails validation or its merged row has review memory that does not match
/// its state, and `TransactionFailure` if any write fails. On any error no
/// card of the batch is stored.
#[instrument(skip(db, cards), fields(card_count = cards.len()))]
pub fn upsert_cards_batch(db: &Database, cards: &[Card]) -> Result<usize> {
    db.ensure_writable("upsert cards")?;
    if cards.is_empty() {
        debug!("Nothing to upsert");
        return Ok(0);
    }

    let rows = cards
        .iter()
        .map(|card| {
            card.validate().map_err(|source| FlashcoreError::Marshalling {
                entity: "card",
                key: card.get_uuid().to_string(),
                source,
            })?;
            Ok(CardRow::from(card))
        })
        .collect::<Result<Vec<CardRow>>>()?;

    const OPERATION: &str = "batch card upsert";
    let written = db.with_transaction(OPERATION, |conn| {
        let storage = |e| FlashcoreError::TransactionFailure {
            operation: OPERATION,
            source: e,
        };
        for row in rows {
            let existing = cards::table
                .find(&row.uuid)
                .select(CardRow::as_select())
                .first::<CardRow>(conn)
                .optional()
                .map_err(storage)?;
            let is_update = existing.is_some();
            let merged = merge_card_rows(row, existing.as_ref());
            merged
                .validate_review_memory()
                .map_err(|source| FlashcoreError::Marshalling {
                    entity: "card",
                    key: merged.uuid.clone(),
                    source,
                })?;
            if is_update {
                diesel::update(cards::table.find(&merged.uuid))
                    .set(&merged)
                    .execute(conn)
                    .map_err(storage)?;
            } else {
                diesel::insert_into(cards::table)
                    .values(&merged)
                    .execute(conn)
                    .map_err(storage)?;
            }
            debug!(card_uuid = %merged.uuid, is_update, "Card written");
        }
        Ok(cards.len())
    })?;

    info!("Upserted {} cards", written);
    Ok(written)
}

/// Retrieves one card
///
/// ### Returns
///
/// `Ok(None)` if no card has this UUID
#[instrument(skip(db), fields(card_uuid = %card_uuid))]
pub fn get_card_by_uuid(db: &Database, card_uuid: Uuid) -> Result<Option<Card>> {
    debug!("Retrieving card");
    let row = db.with_connection(|conn| {
        cards::table
            .find(card_uuid.to_string())
            .select(CardRow::as_select())
            .first::<CardRow>(conn)
            .optional()
            .map_err(|e| FlashcoreError::storage("get card", e))
    })?;
    row.map(to_card).transpose()
}

/// Lists cards ordered by deck and front
///
/// ### Arguments
///
/// * `deck_filter` - A SQL LIKE pattern matched against the deck name
#[instrument(skip(db))]
pub fn get_all_cards(db: &Database, deck_filter: Option<&str>) -> Result<Vec<Card>> {
    let rows = db.with_connection(|conn| {
        let mut query = cards::table.select(CardRow::as_select()).into_boxed();
        if let Some(pattern) = deck_filter {
            query = query.filter(cards::deck_name.like(pattern.to_string()));
        }
        query
            .order((cards::deck_name.asc(), cards::front.asc()))
            .load::<CardRow>(conn)
            .map_err(|e| FlashcoreError::storage("list cards", e))
    })?;
    debug!("Retrieved {} cards", rows.len());
    to_cards(rows)
}

/// Lists the distinct deck names in alphabetical order
#[instrument(skip(db))]
pub fn get_deck_names(db: &Database) -> Result<Vec<String>> {
    db.with_connection(|conn| {
        cards::table
            .select(cards::deck_name)
            .distinct()
            .order(cards::deck_name.asc())
            .load::<String>(conn)
            .map_err(|e| FlashcoreError::storage("list decks", e))
    })
}

/// Selects the cards due for review
///
/// A card is due when its `next_due_date` is on or before `query.on_date` or
/// when it has never been scheduled. Cards are ordered by due date with new
/// cards first, then by deck name, then by `added_at`. The tag filter is
/// applied before the limit.
#[instrument(skip(db), fields(on_date = %query.on_date, deck = ?query.deck_name, limit = ?query.limit))]
pub fn get_due_cards(db: &Database, query: &DueCardQuery) -> Result<Vec<Card>> {
    if query.limit == Some(0) {
        debug!("Limit is zero, returning no cards");
        return Ok(Vec::new());
    }

    let rows = db.with_connection(|conn| {
        let mut sql = cards::table
            .select(CardRow::as_select())
            .filter(
                cards::next_due_date
                    .le(query.on_date)
                    .or(cards::next_due_date.is_null()),
            )
            .into_boxed();
        if let Some(deck) = &query.deck_name {
            sql = sql.filter(cards::deck_name.eq(deck.clone()));
        }
        // NULL sorts first in ascending SQLite order
        sql = sql.order((
            cards::next_due_date.asc(),
            cards::deck_name.asc(),
            cards::added_at.asc(),
        ));
        if query.tags.is_none() {
            if let Some(limit) = query.limit {
                sql = sql.limit(i64::try_from(limit).unwrap_or(i64::MAX));
            }
        }
        sql.load::<CardRow>(conn)
            .map_err(|e| FlashcoreError::storage("get due cards", e))
    })?;

    let mut due = to_cards(rows)?;
    if let Some(tags) = &query.tags {
        due.retain(|card| card.get_tags().intersection(tags).next().is_some());
        if let Some(limit) = query.limit {
            due.truncate(limit);
        }
    }
    debug!("Found {} due cards", due.len());
    Ok(due)
}

/// Counts the cards due on or before `on_date`, including new cards
#[instrument(skip(db))]
pub fn get_due_card_count(db: &Database, deck_name: Option<&str>, on_date: NaiveDate) -> Result<i64> {
    db.with_connection(|conn| {
        let due = cards::next_due_date.le(on_date).or(cards::next_due_date.is_null());
        match deck_name {
            Some(deck) => cards::table
                .filter(due)
                .filter(cards::deck_name.eq(deck))
                .count()
                .get_result::<i64>(conn),
            None => cards::table.filter(due).count().get_result::<i64>(conn),
        }
        .map_err(|e| FlashcoreError::storage("count due cards", e))
    })
}

/// Computes summary counts over the whole store
///
/// Due counts are relative to today's UTC date.
#[instrument(skip(db))]
pub fn get_database_stats(db: &Database) -> Result<DatabaseStats> {
    let today = Utc::now().date_naive();
    let storage = |e| FlashcoreError::storage("database stats", e);
    db.with_connection(|conn| {
        let total_cards = cards::table.count().get_result::<i64>(conn).map_err(storage)?;
        let total_reviews = reviews::table.count().get_result::<i64>(conn).map_err(storage)?;

        let per_deck: Vec<(String, i64)> = cards::table
            .group_by(cards::deck_name)
            .select((cards::deck_name, count_star()))
            .order(cards::deck_name.asc())
            .load(conn)
            .map_err(storage)?;
        let due_per_deck: HashMap<String, i64> = cards::table
            .filter(cards::next_due_date.le(today).or(cards::next_due_date.is_null()))
            .group_by(cards::deck_name)
            .select((cards::deck_name, count_star()))
            .load::<(String, i64)>(conn)
            .map_err(storage)?
            .into_iter()
            .collect();
        let decks = per_deck
            .into_iter()
            .map(|(deck_name, card_count)| DeckStats {
                due_count: due_per_deck.get(&deck_name).copied().unwrap_or(0),
                deck_name,
                card_count,
            })
            .collect();

        let states: BTreeMap<String, i64> = cards::table
            .group_by(cards::state)
            .select((cards::state, count_star()))
            .load::<(String, i64)>(conn)
            .map_err(storage)?
            .into_iter()
            .collect();

        Ok(DatabaseStats {
            total_cards,
            total_reviews,
            decks,
            states,
        })
    })
}

/// Normalizes a card front for duplicate detection: lowercase, whitespace collapsed
pub fn normalize_front(front: &str) -> String {
    front
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Maps every normalized card front to the UUID of the first card seen with it
///
/// Cards are visited in the order they were added.
#[instrument(skip(db))]
pub fn get_all_card_fronts_and_uuids(db: &Database) -> Result<HashMap<String, Uuid>> {
    let rows: Vec<(String, String)> = db.with_connection(|conn| {
        cards::table
            .select((cards::front, cards::uuid))
            .order((cards::added_at.asc(), cards::uuid.asc()))
            .load(conn)
            .map_err(|e| FlashcoreError::storage("list card fronts", e))
    })?;

    let mut fronts = HashMap::with_capacity(rows.len());
    for (front, raw_uuid) in rows {
        let card_uuid = Uuid::parse_str(&raw_uuid).map_err(|e| FlashcoreError::Marshalling {
            entity: "card",
            key: raw_uuid.clone(),
            source: crate::models::ValidationError::InvalidUuid {
                value: raw_uuid.clone(),
                reason: e.to_string(),
            },
        })?;
        let normalized = normalize_front(&front);
        if let Some(first) = fronts.get(&normalized) {
            warn!(front = %normalized, kept = %first, discarded = %card_uuid, "Duplicate normalized front");
        } else {
            fronts.insert(normalized, card_uuid);
        }
    }
    Ok(fronts)
}

/// Deletes cards by UUID in one transaction
///
/// UUIDs with no card are ignored. Reviews of deleted cards are kept.
///
/// ### Returns
///
/// The number of cards removed
///
/// ### Errors
///
/// Returns `ReadOnlyViolation` on a read-only handle and `TransactionFailure`
/// if a delete fails, in which case no card is removed.
#[instrument(skip(db, card_uuids), fields(requested = card_uuids.len()))]
pub fn delete_cards_by_uuids_batch(db: &Database, card_uuids: &[Uuid]) -> Result<usize> {
    db.ensure_writable("delete cards")?;
    if card_uuids.is_empty() {
        return Ok(0);
    }

    const OPERATION: &str = "batch card delete";
    let removed = db.with_transaction(OPERATION, |conn| {
        let mut removed = 0;
        for chunk in card_uuids.chunks(DELETE_CHUNK_SIZE) {
            let keys: Vec<String> = chunk.iter().map(Uuid::to_string).collect();
            removed += diesel::delete(cards::table.filter(cards::uuid.eq_any(keys)))
                .execute(conn)
                .map_err(|e| FlashcoreError::storage(OPERATION, e))?;
        }
        Ok(removed)
    })?;

    info!("Deleted {} of {} requested cards", removed, card_uuids.len());
    Ok(removed)
}


#[cfg(test)]
mod prop_tests;
