use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation;
use super::{Rating, ReviewType, ValidationError};

/// One recorded review of a card
///
/// A review is immutable once stored. The rating is kept as the raw value the
/// caller supplied so that an out-of-range value reaches the store and is
/// rejected by its CHECK constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    /// Assigned by the store on insert
    review_id: Option<i32>,

    /// The card that was reviewed
    card_uuid: Uuid,

    /// The session the review happened in, if any
    session_uuid: Option<Uuid>,

    /// When the review happened
    ts: DateTime<Utc>,

    /// 1 = Again, 2 = Hard, 3 = Good, 4 = Easy
    rating: i32,

    /// Time to reveal the answer, in milliseconds
    resp_ms: Option<i32>,

    /// Time to rate after revealing, in milliseconds
    eval_ms: Option<i32>,

    /// Stability before the review; None for a first review
    stab_before: Option<f64>,

    /// Stability after the review
    stab_after: f64,

    /// Difficulty after the review
    diff: f64,

    /// Date the card is next due
    next_due: NaiveDate,

    /// Days since the previous review
    elapsed_days_at_review: i32,

    /// Days between the review date and `next_due`
    scheduled_days_interval: i32,

    review_type: ReviewType,
}

impl Review {
    /// Creates a review that has not been stored yet
    ///
    /// Memory and schedule fields start out empty and are filled in with
    /// [`Review::with_memory`] and [`Review::with_schedule`].
    ///
    /// ### Arguments
    ///
    /// * `card_uuid` - The card being reviewed
    /// * `rating` - The raw rating value
    /// * `ts` - When the review happened
    pub fn new(card_uuid: Uuid, rating: i32, ts: DateTime<Utc>) -> Self {
        Self {
            review_id: None,
            card_uuid,
            session_uuid: None,
            ts,
            rating,
            resp_ms: None,
            eval_ms: None,
            stab_before: None,
            stab_after: 0.0,
            diff: 0.0,
            next_due: ts.date_naive(),
            elapsed_days_at_review: 0,
            scheduled_days_interval: 0,
            review_type: ReviewType::Manual,
        }
    }

    pub fn with_session(mut self, session_uuid: Option<Uuid>) -> Self {
        self.session_uuid = session_uuid;
        self
    }

    pub fn with_timing(mut self, resp_ms: Option<i32>, eval_ms: Option<i32>) -> Self {
        self.resp_ms = resp_ms;
        self.eval_ms = eval_ms;
        self
    }

    pub fn with_memory(mut self, stab_before: Option<f64>, stab_after: f64, diff: f64) -> Self {
        self.stab_before = stab_before;
        self.stab_after = stab_after;
        self.diff = diff;
        self
    }

    pub fn with_schedule(
        mut self,
        next_due: NaiveDate,
        elapsed_days_at_review: i32,
        scheduled_days_interval: i32,
        review_type: ReviewType,
    ) -> Self {
        self.next_due = next_due;
        self.elapsed_days_at_review = elapsed_days_at_review;
        self.scheduled_days_interval = scheduled_days_interval;
        self.review_type = review_type;
        self
    }

    pub fn get_review_id(&self) -> Option<i32> {
        self.review_id
    }

    pub fn get_card_uuid(&self) -> Uuid {
        self.card_uuid
    }

    pub fn get_session_uuid(&self) -> Option<Uuid> {
        self.session_uuid
    }

    pub fn get_ts(&self) -> DateTime<Utc> {
        self.ts
    }

    pub fn get_rating(&self) -> i32 {
        self.rating
    }

    /// The rating as a [`Rating`], if it is in range
    pub fn rating(&self) -> Option<Rating> {
        Rating::from_value(self.rating)
    }

    pub fn get_resp_ms(&self) -> Option<i32> {
        self.resp_ms
    }

    pub fn get_eval_ms(&self) -> Option<i32> {
        self.eval_ms
    }

    pub fn get_stab_before(&self) -> Option<f64> {
        self.stab_before
    }

    pub fn get_stab_after(&self) -> f64 {
        self.stab_after
    }

    pub fn get_diff(&self) -> f64 {
        self.diff
    }

    pub fn get_next_due(&self) -> NaiveDate {
        self.next_due
    }

    pub fn get_elapsed_days_at_review(&self) -> i32 {
        self.elapsed_days_at_review
    }

    pub fn get_scheduled_days_interval(&self) -> i32 {
        self.scheduled_days_interval
    }

    pub fn get_review_type(&self) -> ReviewType {
        self.review_type
    }
}

/// A row of the `reviews` table as read back
#[derive(Queryable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::reviews)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ReviewRow {
    pub review_id: i32,
    pub card_uuid: String,
    pub session_uuid: Option<String>,
    pub ts: NaiveDateTime,
    pub rating: i32,
    pub resp_ms: Option<i32>,
    pub eval_ms: Option<i32>,
    pub stab_before: Option<f64>,
    pub stab_after: f64,
    pub diff: f64,
    pub next_due: NaiveDate,
    pub elapsed_days_at_review: i32,
    pub scheduled_days_interval: i32,
    pub review_type: String,
}

/// A review ready to be inserted; the store assigns `review_id`
#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::reviews)]
pub struct NewReviewRow {
    pub card_uuid: String,
    pub session_uuid: Option<String>,
    pub ts: NaiveDateTime,
    pub rating: i32,
    pub resp_ms: Option<i32>,
    pub eval_ms: Option<i32>,
    pub stab_before: Option<f64>,
    pub stab_after: f64,
    pub diff: f64,
    pub next_due: NaiveDate,
    pub elapsed_days_at_review: i32,
    pub scheduled_days_interval: i32,
    pub review_type: String,
}

impl From<&Review> for NewReviewRow {
    fn from(review: &Review) -> Self {
        Self {
            card_uuid: review.card_uuid.to_string(),
            session_uuid: review.session_uuid.map(|u| u.to_string()),
            ts: review.ts.naive_utc(),
            rating: review.rating,
            resp_ms: review.resp_ms,
            eval_ms: review.eval_ms,
            stab_before: review.stab_before,
            stab_after: review.stab_after,
            diff: review.diff,
            next_due: review.next_due,
            elapsed_days_at_review: review.elapsed_days_at_review,
            scheduled_days_interval: review.scheduled_days_interval,
            review_type: review.review_type.as_str().to_string(),
        }
    }
}

impl TryFrom<ReviewRow> for Review {
    type Error = ValidationError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        if Rating::from_value(row.rating).is_none() {
            return Err(ValidationError::RatingOutOfRange(row.rating));
        }
        validation::non_negative("resp_ms", row.resp_ms)?;
        validation::non_negative("eval_ms", row.eval_ms)?;
        Ok(Review {
            review_id: Some(row.review_id),
            card_uuid: validation::parse_uuid(&row.card_uuid)?,
            session_uuid: row
                .session_uuid
                .as_deref()
                .map(validation::parse_uuid)
                .transpose()?,
            ts: DateTime::from_naive_utc_and_offset(row.ts, Utc),
            rating: row.rating,
            resp_ms: row.resp_ms,
            eval_ms: row.eval_ms,
            stab_before: row.stab_before,
            stab_after: row.stab_after,
            diff: row.diff,
            next_due: row.next_due,
            elapsed_days_at_review: row.elapsed_days_at_review,
            scheduled_days_interval: row.scheduled_days_interval,
            review_type: row.review_type.parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_review() -> Review {
        let ts = Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap();
        Review::new(Uuid::new_v4(), 3, ts)
            .with_session(Some(Uuid::new_v4()))
            .with_timing(Some(1200), Some(300))
            .with_memory(None, 3.26, 5.3)
            .with_schedule(
                NaiveDate::from_ymd_opt(2025, 3, 7).unwrap(),
                0,
                3,
                ReviewType::Learn,
            )
    }

    #[test]
    fn test_new_review_defaults() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 4, 23, 59, 0).unwrap();
        let review = Review::new(Uuid::new_v4(), 9, ts);
        assert_eq!(review.get_review_id(), None);
        assert_eq!(review.get_next_due(), ts.date_naive());
        assert_eq!(review.rating(), None);
        assert_eq!(review.get_rating(), 9);
    }

    #[test]
    fn test_row_round_trip() {
        let review = sample_review();
        let new_row = NewReviewRow::from(&review);
        assert_eq!(new_row.review_type, "learn");

        let row = ReviewRow {
            review_id: 11,
            card_uuid: new_row.card_uuid,
            session_uuid: new_row.session_uuid,
            ts: new_row.ts,
            rating: new_row.rating,
            resp_ms: new_row.resp_ms,
            eval_ms: new_row.eval_ms,
            stab_before: new_row.stab_before,
            stab_after: new_row.stab_after,
            diff: new_row.diff,
            next_due: new_row.next_due,
            elapsed_days_at_review: new_row.elapsed_days_at_review,
            scheduled_days_interval: new_row.scheduled_days_interval,
            review_type: new_row.review_type,
        };
        let stored = Review::try_from(row).unwrap();
        assert_eq!(stored.get_review_id(), Some(11));
        assert_eq!(stored.get_card_uuid(), review.get_card_uuid());
        assert_eq!(stored.get_session_uuid(), review.get_session_uuid());
        assert_eq!(stored.rating(), Some(Rating::Good));
        assert_eq!(stored.get_review_type(), ReviewType::Learn);
    }

    #[test]
    fn test_row_with_bad_uuid_fails() {
        let review = sample_review();
        let new_row = NewReviewRow::from(&review);
        let row = ReviewRow {
            review_id: 1,
            card_uuid: "not-a-uuid".to_string(),
            session_uuid: None,
            ts: new_row.ts,
            rating: 3,
            resp_ms: None,
            eval_ms: None,
            stab_before: None,
            stab_after: 1.0,
            diff: 5.0,
            next_due: new_row.next_due,
            elapsed_days_at_review: 0,
            scheduled_days_interval: 1,
            review_type: "review".to_string(),
        };
        assert!(matches!(Review::try_from(row), Err(ValidationError::InvalidUuid { .. })));
    }
}
