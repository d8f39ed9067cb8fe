use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::models::{CardState, Rating};

/// Everything a memory model sees about one review
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryInput {
    /// State before the review
    pub state: CardState,
    /// Stability before the review; None if the card was never reviewed
    pub stability: Option<f64>,
    /// Difficulty before the review; None if the card was never reviewed
    pub difficulty: Option<f64>,
    /// Whole UTC days since the previous review, 0 for a first review
    pub elapsed_days: i64,
    pub rating: Rating,
    /// The review time
    pub now: DateTime<Utc>,
}

/// What a memory model predicts after one review
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryOutput {
    pub stability: f64,
    pub difficulty: f64,
    /// When the card should be seen again
    pub due: DateTime<Utc>,
    /// Name of the resulting state, matched case-insensitively against
    /// `CardState` names
    pub state: String,
}

/// A spaced-repetition memory model
///
/// Implementations are pure: the same input always gives the same output, and
/// the model never sees more than the card's cached memory state.
pub trait MemoryModel: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Predicts the memory state after `input.rating` at `input.now`
    ///
    /// ### Errors
    ///
    /// Returns `MemoryModel` if the model cannot evaluate the input
    fn next_state(&self, input: &MemoryInput) -> Result<MemoryOutput>;
}
