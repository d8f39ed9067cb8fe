use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::db::Database;
use crate::errors::{FlashcoreError, Result};
use crate::models::{Card, Session};
use crate::repo::{self, DueCardQuery};
use crate::review_processor::ReviewProcessor;
use crate::scheduler::ReviewTime;

/// Progress through a review session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub total_cards: usize,
    pub reviewed: usize,
    pub remaining: usize,
}

/// A queue of due cards worked through one review at a time
///
/// Cards leave the queue only when their review has been stored. A failed
/// submission leaves the queue and the session counters untouched.
#[derive(Debug)]
pub struct ReviewSession {
    processor: Arc<ReviewProcessor>,
    deck_name: Option<String>,
    user_id: Option<String>,
    queue: VecDeque<Card>,
    total_cards: usize,
    session: Option<Session>,
}

impl ReviewSession {
    /// Creates an empty session over `deck_name`, or over every deck if None
    pub fn new(processor: Arc<ReviewProcessor>, deck_name: Option<String>) -> Self {
        Self {
            processor,
            deck_name,
            user_id: None,
            queue: VecDeque::new(),
            total_cards: 0,
            session: None,
        }
    }

    pub fn with_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    fn db(&self) -> &Database {
        self.processor.database()
    }

    pub fn deck_name(&self) -> Option<&str> {
        self.deck_name.as_deref()
    }

    /// The session record, once initialized
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_uuid(&self) -> Option<Uuid> {
        self.session.as_ref().map(Session::get_session_uuid)
    }

    /// Starts the session with the cards due today (UTC)
    ///
    /// ### Returns
    ///
    /// The number of queued cards
    pub fn initialize(&mut self, limit: Option<usize>, tags: Option<BTreeSet<String>>) -> Result<usize> {
        self.initialize_for_date(Utc::now().date_naive(), limit, tags)
    }

    /// Starts the session with the cards due on or before `on_date`
    ///
    /// A session record is stored first, then the queue is filled with due
    /// cards in due-date order with new cards first. Initializing again
    /// ends and stores the previous session.
    ///
    /// ### Arguments
    ///
    /// * `on_date` - Review day
    /// * `limit` - Maximum number of cards to queue; 0 queues none
    /// * `tags` - Keep only cards with at least one of these tags
    ///
    /// ### Errors
    ///
    /// Returns `ReadOnlyViolation` on a read-only store and any storage
    /// error from creating the session or selecting cards.
    #[instrument(skip(self, tags), fields(deck = ?self.deck_name))]
    pub fn initialize_for_date(
        &mut self,
        on_date: NaiveDate,
        limit: Option<usize>,
        tags: Option<BTreeSet<String>>,
    ) -> Result<usize> {
        if self.session.as_ref().is_some_and(Session::is_active) {
            self.end_session()?;
        }

        let session = repo::create_session(self.db(), &Session::new().with_user(self.user_id.clone()))?;
        let query = DueCardQuery::on(on_date)
            .with_deck(self.deck_name.clone())
            .with_tags(tags)
            .with_limit(limit);
        let due = repo::get_due_cards(self.db(), &query)?;

        self.total_cards = due.len();
        self.queue = due.into();
        info!(
            session_uuid = %session.get_session_uuid(),
            cards = self.total_cards,
            "Review session started"
        );
        self.session = Some(session);
        Ok(self.total_cards)
    }

    /// The next card to review, without removing it
    pub fn get_next_card(&self) -> Option<&Card> {
        self.queue.front()
    }

    /// Cards still waiting for review, in order
    pub fn queued_cards(&self) -> impl Iterator<Item = &Card> {
        self.queue.iter()
    }

    /// Reviews a queued card
    ///
    /// ### Arguments
    ///
    /// * `card_uuid` - A card in the queue
    /// * `rating` - Raw rating, 1 (Again) through 4 (Easy)
    /// * `reviewed_at` - When the review happened; now if None
    /// * `resp_ms` - Time to answer, in milliseconds
    /// * `eval_ms` - Time spent grading, in milliseconds
    ///
    /// ### Returns
    ///
    /// The card as stored after the review
    ///
    /// ### Errors
    ///
    /// Returns `CardNotInSession` if the card is not queued, otherwise the
    /// errors of `ReviewProcessor::process_review`.
    #[instrument(skip(self, reviewed_at), fields(session_uuid = ?self.session_uuid()))]
    pub fn submit_review(
        &mut self,
        card_uuid: Uuid,
        rating: i32,
        reviewed_at: Option<ReviewTime>,
        resp_ms: Option<i32>,
        eval_ms: Option<i32>,
    ) -> Result<Card> {
        let position = self
            .queue
            .iter()
            .position(|card| card.get_uuid() == card_uuid)
            .ok_or(FlashcoreError::CardNotInSession(card_uuid))?;

        let session_uuid = self.session_uuid();
        let updated = self.processor.process_review(
            &self.queue[position],
            rating,
            resp_ms,
            eval_ms,
            reviewed_at,
            session_uuid,
        )?;

        if let Some(reviewed) = self.queue.remove(position) {
            if let Some(session) = self.session.as_mut() {
                session.add_card_review(reviewed.get_deck_name());
            }
        }
        debug!(remaining = self.queue.len(), "Card reviewed");
        Ok(updated)
    }

    pub fn get_session_stats(&self) -> SessionStats {
        let reviewed = self
            .session
            .as_ref()
            .map(|s| usize::try_from(s.get_cards_reviewed()).unwrap_or(0))
            .unwrap_or(0);
        SessionStats {
            total_cards: self.total_cards,
            reviewed,
            remaining: self.queue.len(),
        }
    }

    /// Counts cards due today in this session's deck, queued or not
    pub fn get_due_card_count(&self) -> Result<i64> {
        repo::get_due_card_count(self.db(), self.deck_name.as_deref(), Utc::now().date_naive())
    }

    /// Stamps the end time and stores the session counters
    ///
    /// ### Returns
    ///
    /// The stored session, or None if the session was never initialized
    pub fn end_session(&mut self) -> Result<Option<Session>> {
        let Some(session) = self.session.as_mut() else {
            debug!("Session was never started; nothing to end");
            return Ok(None);
        };
        session.end_session();
        let stored = repo::update_session(self.processor.database(), session)?;
        info!(
            session_uuid = %stored.get_session_uuid(),
            cards_reviewed = stored.get_cards_reviewed(),
            duration_ms = ?stored.get_total_duration_ms(),
            "Review session ended"
        );
        Ok(Some(stored))
    }
}
