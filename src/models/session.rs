use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation;
use super::ValidationError;

/// A review session and the counters collected while it runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Assigned by the store on insert
    session_id: Option<i32>,
    session_uuid: Uuid,
    user_id: Option<String>,
    start_ts: DateTime<Utc>,
    end_ts: Option<DateTime<Utc>>,
    total_duration_ms: Option<i64>,
    cards_reviewed: i32,
    decks_accessed: BTreeSet<String>,
    deck_switches: i32,
    interruptions: i32,
    device_type: Option<String>,
    platform: Option<String>,
}

impl Session {
    /// Starts a new session now
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Starts a new session at `start_ts`
    pub fn starting_at(start_ts: DateTime<Utc>) -> Self {
        Self {
            session_id: None,
            session_uuid: Uuid::new_v4(),
            user_id: None,
            start_ts,
            end_ts: None,
            total_duration_ms: None,
            cards_reviewed: 0,
            decks_accessed: BTreeSet::new(),
            deck_switches: 0,
            interruptions: 0,
            device_type: None,
            platform: None,
        }
    }

    pub fn with_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_client(mut self, device_type: Option<String>, platform: Option<String>) -> Self {
        self.device_type = device_type;
        self.platform = platform;
        self
    }

    pub fn get_session_id(&self) -> Option<i32> {
        self.session_id
    }

    pub fn get_session_uuid(&self) -> Uuid {
        self.session_uuid
    }

    pub fn get_user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn get_start_ts(&self) -> DateTime<Utc> {
        self.start_ts
    }

    pub fn get_end_ts(&self) -> Option<DateTime<Utc>> {
        self.end_ts
    }

    pub fn get_total_duration_ms(&self) -> Option<i64> {
        self.total_duration_ms
    }

    pub fn get_cards_reviewed(&self) -> i32 {
        self.cards_reviewed
    }

    pub fn get_decks_accessed(&self) -> &BTreeSet<String> {
        &self.decks_accessed
    }

    pub fn get_deck_switches(&self) -> i32 {
        self.deck_switches
    }

    pub fn get_interruptions(&self) -> i32 {
        self.interruptions
    }

    pub fn get_device_type(&self) -> Option<&str> {
        self.device_type.as_deref()
    }

    pub fn get_platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    pub(crate) fn set_session_id(&mut self, session_id: i32) {
        self.session_id = Some(session_id);
    }

    /// Records one reviewed card from `deck_name`
    ///
    /// A deck switch is counted when the deck has not been seen before in this
    /// session and at least one other deck has.
    pub fn add_card_review(&mut self, deck_name: &str) {
        let previous = self.decks_accessed.len();
        let is_new_deck = self.decks_accessed.insert(deck_name.to_string());
        if is_new_deck && previous > 0 {
            self.deck_switches += 1;
        }
        self.cards_reviewed += 1;
    }

    pub fn record_interruption(&mut self) {
        self.interruptions += 1;
    }

    /// Ends the session now; does nothing if it has already ended
    pub fn end_session(&mut self) {
        self.end_session_at(Utc::now());
    }

    /// Ends the session at `end_ts`; does nothing if it has already ended
    pub fn end_session_at(&mut self, end_ts: DateTime<Utc>) {
        if self.end_ts.is_none() {
            self.end_ts = Some(end_ts);
            self.total_duration_ms = self.calculate_duration();
        }
    }

    /// Duration in milliseconds, or None while the session is active
    pub fn calculate_duration(&self) -> Option<i64> {
        self.end_ts
            .map(|end| (end - self.start_ts).num_milliseconds().max(0))
    }

    pub fn is_active(&self) -> bool {
        self.end_ts.is_none()
    }

    /// Review throughput, or None if the session has no recorded duration
    pub fn cards_per_minute(&self) -> Option<f64> {
        match self.total_duration_ms {
            Some(ms) if ms > 0 => Some(self.cards_reviewed as f64 / (ms as f64 / 60_000.0)),
            _ => None,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// A row of the `sessions` table as read back
#[derive(Queryable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::sessions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SessionRow {
    pub session_id: i32,
    pub session_uuid: String,
    pub user_id: Option<String>,
    pub start_ts: NaiveDateTime,
    pub end_ts: Option<NaiveDateTime>,
    pub total_duration_ms: Option<i64>,
    pub cards_reviewed: i32,
    pub decks_accessed: String,
    pub deck_switches: i32,
    pub interruptions: i32,
    pub device_type: Option<String>,
    pub platform: Option<String>,
}

/// The writable columns of a session, used for both insert and update
#[derive(Insertable, AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::sessions)]
#[diesel(treat_none_as_null = true)]
pub struct SessionChanges {
    pub session_uuid: String,
    pub user_id: Option<String>,
    pub start_ts: NaiveDateTime,
    pub end_ts: Option<NaiveDateTime>,
    pub total_duration_ms: Option<i64>,
    pub cards_reviewed: i32,
    pub decks_accessed: String,
    pub deck_switches: i32,
    pub interruptions: i32,
    pub device_type: Option<String>,
    pub platform: Option<String>,
}

impl From<&Session> for SessionChanges {
    fn from(session: &Session) -> Self {
        Self {
            session_uuid: session.session_uuid.to_string(),
            user_id: session.user_id.clone(),
            start_ts: session.start_ts.naive_utc(),
            end_ts: session.end_ts.map(|ts| ts.naive_utc()),
            total_duration_ms: session.total_duration_ms,
            cards_reviewed: session.cards_reviewed,
            decks_accessed: validation::encode_list(&session.decks_accessed),
            deck_switches: session.deck_switches,
            interruptions: session.interruptions,
            device_type: session.device_type.clone(),
            platform: session.platform.clone(),
        }
    }
}

impl TryFrom<SessionRow> for Session {
    type Error = ValidationError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        for (field, value) in [
            ("cards_reviewed", row.cards_reviewed),
            ("deck_switches", row.deck_switches),
            ("interruptions", row.interruptions),
        ] {
            validation::non_negative(field, Some(value))?;
        }
        Ok(Session {
            session_id: Some(row.session_id),
            session_uuid: validation::parse_uuid(&row.session_uuid)?,
            user_id: row.user_id,
            start_ts: DateTime::from_naive_utc_and_offset(row.start_ts, Utc),
            end_ts: row
                .end_ts
                .map(|ts| DateTime::from_naive_utc_and_offset(ts, Utc)),
            total_duration_ms: row.total_duration_ms,
            cards_reviewed: row.cards_reviewed,
            decks_accessed: validation::decode_list("decks_accessed", &row.decks_accessed)?
                .into_iter()
                .collect(),
            deck_switches: row.deck_switches,
            interruptions: row.interruptions,
            device_type: row.device_type,
            platform: row.platform,
        })
    }
}
