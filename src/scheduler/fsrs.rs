use ::fsrs::{ItemState, MemoryState, NextStates, FSRS};
use chrono::{DateTime, Duration, Utc};

use crate::errors::{FlashcoreError, Result};
use crate::models::{CardState, Rating};

use super::engine::{MemoryInput, MemoryModel, MemoryOutput};

pub use ::fsrs::DEFAULT_PARAMETERS;

pub const DEFAULT_DESIRED_RETENTION: f64 = 0.9;
pub const DEFAULT_MAXIMUM_INTERVAL: i32 = 36_500;

const STABILITY_MIN: f64 = 0.001;
const STABILITY_MAX: f64 = 36_500.0;
const DIFFICULTY_MIN: f64 = 1.0;
const DIFFICULTY_MAX: f64 = 10.0;

/// Tunables of the FSRS engine
#[derive(Debug, Clone, PartialEq)]
pub struct FsrsConfig {
    /// Model weights; an empty list selects the model's defaults
    pub parameters: Vec<f32>,
    /// Target probability of recall when a card comes due
    pub desired_retention: f64,
    /// Same-day steps for cards that are still being learned
    pub learning_steps: Vec<Duration>,
    /// Same-day steps for cards that lapsed
    pub relearning_steps: Vec<Duration>,
    /// Longest interval, in days, the engine will schedule
    pub maximum_interval: i32,
}

impl Default for FsrsConfig {
    fn default() -> Self {
        Self {
            parameters: DEFAULT_PARAMETERS.to_vec(),
            desired_retention: DEFAULT_DESIRED_RETENTION,
            learning_steps: vec![Duration::minutes(1), Duration::minutes(10)],
            relearning_steps: vec![Duration::minutes(10)],
            maximum_interval: DEFAULT_MAXIMUM_INTERVAL,
        }
    }
}

impl FsrsConfig {
    pub fn with_desired_retention(mut self, desired_retention: f64) -> Self {
        self.desired_retention = desired_retention;
        self
    }

    pub fn with_maximum_interval(mut self, maximum_interval: i32) -> Self {
        self.maximum_interval = maximum_interval;
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<f32>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Checks the scheduling settings around the model
    ///
    /// The weights themselves are checked by the model when the engine is
    /// created.
    ///
    /// ### Errors
    ///
    /// Returns `InvalidConfiguration` if the retention is not strictly between
    /// 0 and 1, the maximum interval is below one day, a weight is not finite,
    /// or a step is negative.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(FlashcoreError::InvalidConfiguration(msg));
        if !(self.desired_retention > 0.0 && self.desired_retention < 1.0) {
            return invalid(format!(
                "desired retention must be between 0 and 1, got {}",
                self.desired_retention
            ));
        }
        if self.maximum_interval < 1 {
            return invalid(format!(
                "maximum interval must be at least 1 day, got {}",
                self.maximum_interval
            ));
        }
        if let Some(i) = self.parameters.iter().position(|w| !w.is_finite()) {
            return invalid(format!("FSRS weight {} is not finite", i));
        }
        let mut steps = self.learning_steps.iter().chain(&self.relearning_steps);
        if steps.any(|step| *step < Duration::zero()) {
            return invalid("learning steps must not be negative".to_string());
        }
        Ok(())
    }
}

/// FSRS memory model backed by the `fsrs` crate
///
/// The crate computes stability, difficulty and the interval for each
/// rating. This wrapper adds same-day learning steps, the maximum interval
/// and the state names.
#[derive(Debug, Clone, Default)]
pub struct FsrsEngine {
    config: FsrsConfig,
}

impl FsrsEngine {
    /// Creates an engine after validating `config`
    ///
    /// ### Errors
    ///
    /// Returns `InvalidConfiguration` if `config` fails validation or the
    /// model rejects its weights.
    pub fn new(config: FsrsConfig) -> Result<Self> {
        config.validate()?;
        let engine = Self { config };
        engine.model()?;
        Ok(engine)
    }

    pub fn config(&self) -> &FsrsConfig {
        &self.config
    }

    fn model(&self) -> Result<FSRS> {
        FSRS::new(Some(self.config.parameters.as_slice()))
            .map_err(|e| FlashcoreError::InvalidConfiguration(format!("FSRS weights rejected: {}", e)))
    }

    /// Asks the model for the outcome of every rating
    fn predict(&self, input: &MemoryInput) -> Result<NextStates> {
        let memory = match (input.state, input.stability, input.difficulty) {
            (state, Some(stability), Some(difficulty)) if state != CardState::New => Some(MemoryState {
                stability: stability.max(STABILITY_MIN) as f32,
                difficulty: difficulty as f32,
            }),
            _ => None,
        };
        let days_elapsed = u32::try_from(input.elapsed_days.max(0)).unwrap_or(u32::MAX);
        self.model()?
            .next_states(memory, self.config.desired_retention as f32, days_elapsed)
            .map_err(|e| FlashcoreError::MemoryModel(e.to_string()))
    }

    /// Whole days for a model interval, between 1 and the maximum interval
    fn interval_days(&self, interval: f32) -> i64 {
        let days = f64::from(interval).round();
        let max = i64::from(self.config.maximum_interval);
        if days.is_finite() {
            (days as i64).clamp(1, max)
        } else {
            max
        }
    }

    /// Due time for a same-day step, never later than the end of the UTC day
    fn step_due(&self, now: DateTime<Utc>, steps: &[Duration], rating: Rating) -> DateTime<Utc> {
        let step = match (steps.first(), rating) {
            (None, _) => Duration::zero(),
            (Some(first), Rating::Again) => *first,
            (Some(first), Rating::Hard) => match steps.get(1) {
                Some(second) => (*first + *second) / 2,
                None => *first * 3 / 2,
            },
            (Some(first), Rating::Good) => *steps.get(1).unwrap_or(first),
            (Some(first), Rating::Easy) => *steps.last().unwrap_or(first),
        };
        let due = now + step;
        match now.date_naive().and_hms_opt(23, 59, 59) {
            Some(end_of_day) => due.min(end_of_day.and_utc()),
            None => now,
        }
    }
}

fn outcome(states: NextStates, rating: Rating) -> ItemState {
    match rating {
        Rating::Again => states.again,
        Rating::Hard => states.hard,
        Rating::Good => states.good,
        Rating::Easy => states.easy,
    }
}

impl MemoryModel for FsrsEngine {
    fn name(&self) -> &str {
        "fsrs"
    }

    fn next_state(&self, input: &MemoryInput) -> Result<MemoryOutput> {
        let rating = input.rating;
        let predicted = outcome(self.predict(input)?, rating);

        let stability = f64::from(predicted.memory.stability).clamp(STABILITY_MIN, STABILITY_MAX);
        let mut difficulty = f64::from(predicted.memory.difficulty).clamp(DIFFICULTY_MIN, DIFFICULTY_MAX);
        if let (Rating::Again, Some(_), Some(prior)) = (rating, input.stability, input.difficulty) {
            if input.state != CardState::New {
                // A lapse never makes a card easier
                difficulty = difficulty.max(prior.clamp(DIFFICULTY_MIN, DIFFICULTY_MAX));
            }
        }

        let now = input.now;
        let (state, due) = match (input.state, rating) {
            (CardState::New, _) => (
                CardState::Learning,
                self.step_due(now, &self.config.learning_steps, rating),
            ),
            (CardState::Learning, Rating::Again | Rating::Hard) => (
                CardState::Learning,
                self.step_due(now, &self.config.learning_steps, rating),
            ),
            (CardState::Relearning, Rating::Again | Rating::Hard) => (
                CardState::Relearning,
                self.step_due(now, &self.config.relearning_steps, rating),
            ),
            (CardState::Review, Rating::Again) => (
                CardState::Relearning,
                self.step_due(now, &self.config.relearning_steps, rating),
            ),
            (CardState::Learning | CardState::Relearning | CardState::Review, _) => (
                CardState::Review,
                now + Duration::days(self.interval_days(predicted.interval)),
            ),
        };

        Ok(MemoryOutput {
            stability,
            difficulty,
            due,
            state: state.as_str().to_string(),
        })
    }
}
