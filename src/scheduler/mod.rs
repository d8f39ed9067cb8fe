//! Scheduling adapter between cards and a memory model
//!
//! The adapter turns a card's cached memory state plus a rating into the
//! values the persistence layer stores: new stability, difficulty, due date,
//! interval and review type. It never replays review history.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use tracing::{debug, warn};

use crate::errors::{FlashcoreError, Result};
use crate::models::{Card, CardState, Rating, ReviewType};

pub mod engine;
pub mod fsrs;

pub use engine::{MemoryInput, MemoryModel, MemoryOutput};
pub use self::fsrs::{FsrsConfig, FsrsEngine};

/// A review timestamp in any of the forms callers hand us
///
/// Naive timestamps are taken to be UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewTime {
    Utc(DateTime<Utc>),
    Fixed(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl ReviewTime {
    pub fn now() -> Self {
        ReviewTime::Utc(Utc::now())
    }

    pub fn to_utc(self) -> DateTime<Utc> {
        match self {
            ReviewTime::Utc(ts) => ts,
            ReviewTime::Fixed(ts) => ts.with_timezone(&Utc),
            ReviewTime::Naive(ts) => ts.and_utc(),
        }
    }
}

impl From<DateTime<Utc>> for ReviewTime {
    fn from(ts: DateTime<Utc>) -> Self {
        ReviewTime::Utc(ts)
    }
}

impl From<DateTime<FixedOffset>> for ReviewTime {
    fn from(ts: DateTime<FixedOffset>) -> Self {
        ReviewTime::Fixed(ts)
    }
}

impl From<NaiveDateTime> for ReviewTime {
    fn from(ts: NaiveDateTime) -> Self {
        ReviewTime::Naive(ts)
    }
}

/// The memory state a card carries between reviews
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CachedMemoryState {
    pub state: CardState,
    pub stability: Option<f64>,
    pub difficulty: Option<f64>,
    /// UTC date of the review `last_review_id` points at
    pub last_reviewed_on: Option<NaiveDate>,
}

impl CachedMemoryState {
    /// Reads the cached fields of `card`
    ///
    /// ### Arguments
    ///
    /// * `card` - The card about to be reviewed
    /// * `last_reviewed_on` - Date of the card's last review, if it has one
    pub fn from_card(card: &Card, last_reviewed_on: Option<NaiveDate>) -> Self {
        Self {
            state: card.get_state(),
            stability: card.get_stability(),
            difficulty: card.get_difficulty(),
            last_reviewed_on,
        }
    }
}

/// Everything the persistence layer needs to record one review
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerOutput {
    pub stability: f64,
    pub difficulty: f64,
    pub next_due: NaiveDate,
    pub scheduled_days: i32,
    pub review_type: ReviewType,
    pub elapsed_days: i32,
    pub state: CardState,
}

/// Validates ratings and drives a memory model over cached card state
pub struct Scheduler {
    engine: Box<dyn MemoryModel>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("engine", &self.engine.name())
            .finish()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(Box::new(FsrsEngine::default()))
    }
}

impl Scheduler {
    pub fn new(engine: Box<dyn MemoryModel>) -> Self {
        Self { engine }
    }

    /// Builds a scheduler backed by the FSRS engine
    ///
    /// ### Errors
    ///
    /// Returns `InvalidConfiguration` if `config` does not validate
    pub fn with_fsrs(config: FsrsConfig) -> Result<Self> {
        Ok(Self::new(Box::new(FsrsEngine::new(config)?)))
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Computes the memory state after a review
    ///
    /// ### Arguments
    ///
    /// * `cached` - The card's memory state before the review
    /// * `rating` - The raw rating, 1 (Again) through 4 (Easy)
    /// * `reviewed_at` - When the review happened
    ///
    /// ### Returns
    ///
    /// The stability, difficulty, due date and classification to store
    ///
    /// ### Errors
    ///
    /// Returns `InvalidRating` for a rating outside 1-4, `MemoryModel` if the
    /// engine fails, and `UnmappableEngineState` if the engine answers with a
    /// state name that is not a `CardState`
    pub fn compute_next_state(
        &self,
        cached: &CachedMemoryState,
        rating: i32,
        reviewed_at: impl Into<ReviewTime>,
    ) -> Result<SchedulerOutput> {
        let rating = Rating::from_value(rating).ok_or(FlashcoreError::InvalidRating(rating))?;
        let now = reviewed_at.into().to_utc();
        let review_date = now.date_naive();

        let elapsed_days = cached
            .last_reviewed_on
            .map(|last| (review_date - last).num_days().max(0))
            .unwrap_or(0);

        let output = self.engine.next_state(&MemoryInput {
            state: cached.state,
            stability: cached.stability,
            difficulty: cached.difficulty,
            elapsed_days,
            rating,
            now,
        })?;

        let state = CardState::from_name(&output.state)
            .ok_or_else(|| FlashcoreError::UnmappableEngineState(output.state.clone()))?;

        let next_due = output.due.date_naive();
        let mut scheduled_days = (next_due - review_date).num_days();
        if scheduled_days < 0 {
            warn!(
                engine = self.engine.name(),
                %next_due,
                %review_date,
                "Memory model scheduled a card in the past; clamping interval to 0"
            );
            scheduled_days = 0;
        }

        debug!(
            engine = self.engine.name(),
            from = %cached.state,
            to = %state,
            %rating,
            elapsed_days,
            scheduled_days,
            "Computed next memory state"
        );

        Ok(SchedulerOutput {
            stability: output.stability,
            difficulty: output.difficulty,
            next_due,
            scheduled_days: saturate(scheduled_days),
            review_type: ReviewType::for_state_before(cached.state),
            elapsed_days: saturate(elapsed_days),
            state,
        })
    }
}

fn saturate(days: i64) -> i32 {
    i32::try_from(days).unwrap_or(i32::MAX)
}


#[cfg(test)]
mod prop_tests;
