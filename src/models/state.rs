use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ValidationError;

/// The learning state of a card's memory trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum CardState {
    /// Never reviewed
    #[default]
    New,
    /// Working through the same-day learning steps
    Learning,
    /// Graduated; scheduled in days
    Review,
    /// Lapsed from Review and working through the relearning steps
    Relearning,
}

impl CardState {
    pub const ALL: [CardState; 4] = [
        CardState::New,
        CardState::Learning,
        CardState::Review,
        CardState::Relearning,
    ];

    /// The name stored in the `cards.state` column
    pub fn as_str(&self) -> &'static str {
        match self {
            CardState::New => "New",
            CardState::Learning => "Learning",
            CardState::Review => "Review",
            CardState::Relearning => "Relearning",
        }
    }

    /// Parses a state name case-insensitively
    ///
    /// Used both for stored values and for names reported by a memory model.
    pub fn from_name(name: &str) -> Option<CardState> {
        CardState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for CardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CardState::from_name(s).ok_or_else(|| ValidationError::UnknownCardState(s.to_string()))
    }
}

/// How well the learner recalled a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rating {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    /// Converts a raw 1-4 rating, returning None for anything else
    pub fn from_value(value: i32) -> Option<Rating> {
        match value {
            1 => Some(Rating::Again),
            2 => Some(Rating::Hard),
            3 => Some(Rating::Good),
            4 => Some(Rating::Easy),
            _ => None,
        }
    }

    pub fn value(&self) -> i32 {
        *self as i32
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rating::Again => "Again",
            Rating::Hard => "Hard",
            Rating::Good => "Good",
            Rating::Easy => "Easy",
        };
        f.write_str(name)
    }
}

/// Classification of a review, derived from the card state before the review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewType {
    Learn,
    Review,
    Relearn,
    Manual,
}

impl ReviewType {
    /// Classifies a review by the state the card was in when it was reviewed
    pub fn for_state_before(state: CardState) -> ReviewType {
        match state {
            CardState::New | CardState::Learning => ReviewType::Learn,
            CardState::Review => ReviewType::Review,
            CardState::Relearning => ReviewType::Relearn,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewType::Learn => "learn",
            ReviewType::Review => "review",
            ReviewType::Relearn => "relearn",
            ReviewType::Manual => "manual",
        }
    }
}

impl fmt::Display for ReviewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "learn" => Ok(ReviewType::Learn),
            "review" => Ok(ReviewType::Review),
            "relearn" => Ok(ReviewType::Relearn),
            "manual" => Ok(ReviewType::Manual),
            other => Err(ValidationError::UnknownReviewType(other.to_string())),
        }
    }
}
