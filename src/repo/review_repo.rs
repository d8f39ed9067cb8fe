use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::db::Database;
use crate::errors::{FlashcoreError, Result};
use crate::models::{Card, CardState, NewReviewRow, Review, ReviewRow, ValidationError};
use crate::schema::{cards, reviews};

fn to_review(row: ReviewRow) -> Result<Review> {
    let key = row.review_id.to_string();
    Review::try_from(row).map_err(|source| FlashcoreError::Marshalling {
        entity: "review",
        key,
        source,
    })
}

fn to_reviews(rows: Vec<ReviewRow>) -> Result<Vec<Review>> {
    rows.into_iter().map(to_review).collect()
}

/// Stores a review and applies its outcome to the card in one transaction
///
/// The review row is inserted first and its assigned id becomes the card's
/// `last_review_id`. The card's due date, state, stability and difficulty are
/// taken from the review. If either write fails nothing is stored.
///
/// ### Arguments
///
/// * `db` - The store
/// * `review` - The review to record
/// * `new_state` - The card's state after the review
///
/// ### Returns
///
/// The card as stored after the commit
///
/// ### Errors
///
/// Returns `ReadOnlyViolation` on a read-only handle, `Marshalling` if
/// `new_state` is `New` (a reviewed card always carries memory),
/// `ConstraintViolation` when the review breaks a CHECK constraint, `CardNotFound` when no card has
/// the review's card UUID, `TransactionFailure` for other storage failures, and
/// `ConsistencyViolation` if the card cannot be read back after the commit.
#[instrument(skip(db, review), fields(card_uuid = %review.get_card_uuid(), rating = review.get_rating(), new_state = %new_state))]
pub fn add_review_and_update_card(db: &Database, review: &Review, new_state: CardState) -> Result<Card> {
    db.ensure_writable("add review")?;
    if new_state == CardState::New {
        return Err(FlashcoreError::Marshalling {
            entity: "card",
            key: review.get_card_uuid().to_string(),
            source: ValidationError::InconsistentReviewMemory {
                state: new_state.as_str().to_string(),
                expected: "not have",
            },
        });
    }

    const OPERATION: &str = "review commit";
    let card_uuid = review.get_card_uuid();
    let card_key = card_uuid.to_string();
    let new_row = NewReviewRow::from(review);

    let review_id = db.with_transaction(OPERATION, |conn| {
        let review_id: i32 = diesel::insert_into(reviews::table)
            .values(&new_row)
            .returning(reviews::review_id)
            .get_result(conn)
            .map_err(|e| FlashcoreError::storage(OPERATION, e))?;
        debug!(review_id, "Review inserted");

        let updated = diesel::update(cards::table.find(&card_key))
            .set((
                cards::last_review_id.eq(Some(review_id)),
                cards::next_due_date.eq(Some(review.get_next_due())),
                cards::state.eq(new_state.as_str()),
                cards::stability.eq(Some(review.get_stab_after())),
                cards::difficulty.eq(Some(review.get_diff())),
                cards::modified_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)
            .map_err(|e| FlashcoreError::storage(OPERATION, e))?;
        if updated == 0 {
            return Err(FlashcoreError::CardNotFound(card_uuid));
        }
        Ok(review_id)
    })?;

    let card = super::get_card_by_uuid(db, card_uuid)?.ok_or_else(|| {
        error!(review_id, "Card missing after committed review");
        FlashcoreError::ConsistencyViolation { card_uuid }
    })?;

    info!(review_id, next_due = ?card.get_next_due_date(), "Review recorded");
    Ok(card)
}

/// Retrieves one review by id
#[instrument(skip(db))]
pub fn get_review(db: &Database, review_id: i32) -> Result<Option<Review>> {
    let row = db.with_connection(|conn| {
        reviews::table
            .find(review_id)
            .select(ReviewRow::as_select())
            .first::<ReviewRow>(conn)
            .optional()
            .map_err(|e| FlashcoreError::storage("get review", e))
    })?;
    row.map(to_review).transpose()
}

/// Lists the reviews of a card
///
/// ### Arguments
///
/// * `card_uuid` - The reviewed card
/// * `newest_first` - Order by timestamp descending instead of ascending;
///   ties are broken by review id in the same direction
#[instrument(skip(db), fields(card_uuid = %card_uuid))]
pub fn get_reviews_for_card(db: &Database, card_uuid: Uuid, newest_first: bool) -> Result<Vec<Review>> {
    let rows = db.with_connection(|conn| {
        let query = reviews::table
            .filter(reviews::card_uuid.eq(card_uuid.to_string()))
            .select(ReviewRow::as_select())
            .into_boxed();
        let query = if newest_first {
            query.order((reviews::ts.desc(), reviews::review_id.desc()))
        } else {
            query.order((reviews::ts.asc(), reviews::review_id.asc()))
        };
        query
            .load::<ReviewRow>(conn)
            .map_err(|e| FlashcoreError::storage("get reviews for card", e))
    })?;
    debug!("Retrieved {} reviews", rows.len());
    to_reviews(rows)
}

/// Returns the most recent review of a card
pub fn get_latest_review_for_card(db: &Database, card_uuid: Uuid) -> Result<Option<Review>> {
    Ok(get_reviews_for_card(db, card_uuid, true)?.into_iter().next())
}

/// Lists every review in a time range, oldest first
///
/// Both bounds are inclusive and optional.
#[instrument(skip(db))]
pub fn get_all_reviews(
    db: &Database,
    start_ts: Option<DateTime<Utc>>,
    end_ts: Option<DateTime<Utc>>,
) -> Result<Vec<Review>> {
    let rows = db.with_connection(|conn| {
        let mut query = reviews::table.select(ReviewRow::as_select()).into_boxed();
        if let Some(start) = start_ts {
            query = query.filter(reviews::ts.ge(start.naive_utc()));
        }
        if let Some(end) = end_ts {
            query = query.filter(reviews::ts.le(end.naive_utc()));
        }
        query
            .order((reviews::ts.asc(), reviews::review_id.asc()))
            .load::<ReviewRow>(conn)
            .map_err(|e| FlashcoreError::storage("get all reviews", e))
    })?;
    to_reviews(rows)
}

/// Lists the reviews recorded in a session, oldest first
#[instrument(skip(db), fields(session_uuid = %session_uuid))]
pub fn get_reviews_for_session(db: &Database, session_uuid: Uuid) -> Result<Vec<Review>> {
    let rows = db.with_connection(|conn| {
        reviews::table
            .filter(reviews::session_uuid.eq(session_uuid.to_string()))
            .select(ReviewRow::as_select())
            .order((reviews::ts.asc(), reviews::review_id.asc()))
            .load::<ReviewRow>(conn)
            .map_err(|e| FlashcoreError::storage("get reviews for session", e))
    })?;
    to_reviews(rows)
}

/// Lists reviews whose card no longer exists, oldest first
#[instrument(skip(db))]
pub fn get_orphaned_reviews(db: &Database) -> Result<Vec<Review>> {
    let rows = db.with_connection(|conn| {
        reviews::table
            .filter(reviews::card_uuid.ne_all(cards::table.select(cards::uuid)))
            .select(ReviewRow::as_select())
            .order((reviews::ts.asc(), reviews::review_id.asc()))
            .load::<ReviewRow>(conn)
            .map_err(|e| FlashcoreError::storage("get orphaned reviews", e))
    })?;
    debug!("Found {} orphaned reviews", rows.len());
    to_reviews(rows)
}
