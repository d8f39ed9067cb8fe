use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::Database;
use crate::errors::{FlashcoreError, Result};
use crate::models::{Card, Review};
use crate::repo;
use crate::scheduler::{CachedMemoryState, ReviewTime, Scheduler};

/// Turns one rating into a stored review and an updated card
///
/// The processor owns no state besides its collaborators, so one instance can
/// serve any number of review sessions over the same store.
#[derive(Debug)]
pub struct ReviewProcessor {
    db: Arc<Database>,
    scheduler: Scheduler,
}

impl ReviewProcessor {
    pub fn new(db: Arc<Database>, scheduler: Scheduler) -> Self {
        Self { db, scheduler }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Reads the memory state cached on `card`
    ///
    /// Costs at most one point lookup: the review `last_review_id` names,
    /// for the date it happened.
    fn cached_state(&self, card: &Card) -> Result<CachedMemoryState> {
        let last_reviewed_on = match card.get_last_review_id() {
            Some(review_id) => match repo::get_review(&self.db, review_id)? {
                Some(review) => Some(review.get_ts().date_naive()),
                None => {
                    warn!(
                        card_uuid = %card.get_uuid(),
                        review_id,
                        "Card points at a missing review; treating it as never reviewed"
                    );
                    None
                }
            },
            None => None,
        };
        Ok(CachedMemoryState::from_card(card, last_reviewed_on))
    }

    /// Schedules and records one review of `card`
    ///
    /// ### Arguments
    ///
    /// * `card` - The card being reviewed
    /// * `rating` - Raw rating, 1 (Again) through 4 (Easy)
    /// * `resp_ms` - Time to answer, in milliseconds
    /// * `eval_ms` - Time spent grading, in milliseconds
    /// * `reviewed_at` - When the review happened; now if None
    /// * `session_uuid` - The session the review belongs to
    ///
    /// ### Returns
    ///
    /// The card as stored after the review
    ///
    /// ### Errors
    ///
    /// Scheduler and persistence errors are returned unchanged.
    #[instrument(skip(self, card), fields(card_uuid = %card.get_uuid(), rating))]
    pub fn process_review(
        &self,
        card: &Card,
        rating: i32,
        resp_ms: Option<i32>,
        eval_ms: Option<i32>,
        reviewed_at: Option<ReviewTime>,
        session_uuid: Option<Uuid>,
    ) -> Result<Card> {
        let ts = reviewed_at.unwrap_or_else(ReviewTime::now).to_utc();
        let cached = self.cached_state(card)?;
        let output = self.scheduler.compute_next_state(&cached, rating, ts)?;

        let review = Review::new(card.get_uuid(), rating, ts)
            .with_session(session_uuid)
            .with_timing(resp_ms, eval_ms)
            .with_memory(card.get_stability(), output.stability, output.difficulty)
            .with_schedule(
                output.next_due,
                output.elapsed_days,
                output.scheduled_days,
                output.review_type,
            );

        let updated = repo::add_review_and_update_card(&self.db, &review, output.state)?;
        info!(
            state = %updated.get_state(),
            next_due = %output.next_due,
            scheduled_days = output.scheduled_days,
            "Review processed"
        );
        Ok(updated)
    }

    /// Loads a card by UUID and processes a review of it
    ///
    /// ### Errors
    ///
    /// Returns `CardNotFound` if no card has `card_uuid`, otherwise the
    /// errors of `process_review`.
    pub fn process_review_by_uuid(
        &self,
        card_uuid: Uuid,
        rating: i32,
        resp_ms: Option<i32>,
        eval_ms: Option<i32>,
        reviewed_at: Option<ReviewTime>,
        session_uuid: Option<Uuid>,
    ) -> Result<Card> {
        let card = repo::get_card_by_uuid(&self.db, card_uuid)?
            .ok_or(FlashcoreError::CardNotFound(card_uuid))?;
        self.process_review(&card, rating, resp_ms, eval_ms, reviewed_at, session_uuid)
    }
}

#[cfg(test)]
mod tests;
