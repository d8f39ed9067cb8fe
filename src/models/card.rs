use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation::{self, MAX_CARD_TEXT_CHARS};
use super::{CardState, ValidationError};

/// A flashcard together with its memory state
///
/// Content fields (deck, front, back, tags, media, provenance) are owned by
/// whoever ingests cards. Review fields (`last_review_id`, `next_due_date`,
/// `state`, `stability`, `difficulty`) are owned by the review pipeline and
/// survive re-ingestion of the same card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Stable identifier of the card
    uuid: Uuid,

    /// Name of the deck this card belongs to
    deck_name: String,

    /// Question side
    front: String,

    /// Answer side
    back: String,

    /// Kebab-case tags
    tags: BTreeSet<String>,

    /// When the card was first added
    added_at: DateTime<Utc>,

    /// When the card content was last changed
    modified_at: DateTime<Utc>,

    /// The most recent review of this card, if any
    last_review_id: Option<i32>,

    /// When the card should next be reviewed; None for a new card
    next_due_date: Option<NaiveDate>,

    /// Memory state
    state: CardState,

    /// Memory stability in days
    stability: Option<f64>,

    /// Memory difficulty, 1 to 10
    difficulty: Option<f64>,

    /// Free-form provenance label
    origin_task: Option<String>,

    /// Media files referenced by the card
    media: Vec<PathBuf>,

    /// File the card was ingested from
    source_yaml_file: Option<PathBuf>,

    /// Note that is never shown during review
    internal_note: Option<String>,

    front_length: i32,
    back_length: i32,
    has_media: bool,
    tag_count: i32,
}

impl Card {
    /// Creates a new card with no review history
    ///
    /// ### Arguments
    ///
    /// * `deck_name` - The deck the card belongs to
    /// * `front` - The question side
    /// * `back` - The answer side
    ///
    /// ### Returns
    ///
    /// A new `Card` in the `New` state with a fresh UUID
    pub fn new(deck_name: impl Into<String>, front: impl Into<String>, back: impl Into<String>) -> Self {
        let now = Utc::now();
        let mut card = Self {
            uuid: Uuid::new_v4(),
            deck_name: deck_name.into(),
            front: front.into(),
            back: back.into(),
            tags: BTreeSet::new(),
            added_at: now,
            modified_at: now,
            last_review_id: None,
            next_due_date: None,
            state: CardState::New,
            stability: None,
            difficulty: None,
            origin_task: None,
            media: Vec::new(),
            source_yaml_file: None,
            internal_note: None,
            front_length: 0,
            back_length: 0,
            has_media: false,
            tag_count: 0,
        };
        card.refresh_metrics();
        card
    }

    /// Replaces the card's UUID
    ///
    /// Ingestion uses this to keep a card's identity stable across imports.
    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = uuid;
        self
    }

    /// Replaces the card's tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self.refresh_metrics();
        self
    }

    /// Replaces the card's media references
    pub fn with_media<I, P>(mut self, media: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.media = media.into_iter().map(Into::into).collect();
        self.refresh_metrics();
        self
    }

    /// Sets the provenance fields recorded by ingestion
    pub fn with_provenance(
        mut self,
        origin_task: Option<String>,
        source_yaml_file: Option<PathBuf>,
        internal_note: Option<String>,
    ) -> Self {
        self.origin_task = origin_task;
        self.source_yaml_file = source_yaml_file;
        self.internal_note = internal_note;
        self
    }

    /// Sets the creation timestamp, which also becomes the modification timestamp
    pub fn with_added_at(mut self, added_at: DateTime<Utc>) -> Self {
        self.added_at = added_at;
        self.modified_at = added_at;
        self
    }

    pub fn get_uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn get_deck_name(&self) -> &str {
        &self.deck_name
    }

    /// Moves the card to another deck
    pub fn set_deck_name(&mut self, deck_name: impl Into<String>) {
        self.deck_name = deck_name.into();
        self.touch();
    }

    pub fn get_front(&self) -> &str {
        &self.front
    }

    /// Sets the question side and recomputes the derived metrics
    pub fn set_front(&mut self, front: impl Into<String>) {
        self.front = front.into();
        self.refresh_metrics();
        self.touch();
    }

    pub fn get_back(&self) -> &str {
        &self.back
    }

    /// Sets the answer side and recomputes the derived metrics
    pub fn set_back(&mut self, back: impl Into<String>) {
        self.back = back.into();
        self.refresh_metrics();
        self.touch();
    }

    pub fn get_tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn get_added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    pub fn get_modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    pub fn get_last_review_id(&self) -> Option<i32> {
        self.last_review_id
    }

    pub fn set_last_review_id(&mut self, last_review_id: Option<i32>) {
        self.last_review_id = last_review_id;
    }

    pub fn get_next_due_date(&self) -> Option<NaiveDate> {
        self.next_due_date
    }

    pub fn set_next_due_date(&mut self, next_due_date: Option<NaiveDate>) {
        self.next_due_date = next_due_date;
    }

    pub fn get_state(&self) -> CardState {
        self.state
    }

    pub fn set_state(&mut self, state: CardState) {
        self.state = state;
    }

    pub fn get_stability(&self) -> Option<f64> {
        self.stability
    }

    pub fn set_stability(&mut self, stability: Option<f64>) {
        self.stability = stability;
    }

    pub fn get_difficulty(&self) -> Option<f64> {
        self.difficulty
    }

    pub fn set_difficulty(&mut self, difficulty: Option<f64>) {
        self.difficulty = difficulty;
    }

    pub fn get_origin_task(&self) -> Option<&str> {
        self.origin_task.as_deref()
    }

    pub fn get_media(&self) -> &[PathBuf] {
        &self.media
    }

    pub fn get_source_yaml_file(&self) -> Option<&PathBuf> {
        self.source_yaml_file.as_ref()
    }

    pub fn get_internal_note(&self) -> Option<&str> {
        self.internal_note.as_deref()
    }

    /// Number of characters on the question side
    pub fn get_front_length(&self) -> i32 {
        self.front_length
    }

    /// Number of characters on the answer side
    pub fn get_back_length(&self) -> i32 {
        self.back_length
    }

    pub fn get_has_media(&self) -> bool {
        self.has_media
    }

    pub fn get_tag_count(&self) -> i32 {
        self.tag_count
    }

    /// Checks the content rules every stored card must satisfy
    ///
    /// ### Errors
    ///
    /// Returns a `ValidationError` for an empty deck name, a front or back
    /// longer than the character limit, or a tag that is not kebab-case.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.deck_name.trim().is_empty() {
            return Err(ValidationError::EmptyDeckName);
        }
        for (field, text) in [("front", &self.front), ("back", &self.back)] {
            let len = text.chars().count();
            if len > MAX_CARD_TEXT_CHARS {
                return Err(ValidationError::TextTooLong {
                    field,
                    len,
                    max: MAX_CARD_TEXT_CHARS,
                });
            }
        }
        if let Some(tag) = self.tags.iter().find(|tag| !validation::is_kebab_case(tag)) {
            return Err(ValidationError::TagNotKebabCase(tag.clone()));
        }
        Ok(())
    }

    /// Checks that the review memory is set exactly when the card has left `New`
    ///
    /// ### Errors
    ///
    /// Returns `InconsistentReviewMemory` if a `New` card carries stability,
    /// difficulty or a last review, or a reviewed card lacks one of them.
    pub fn validate_review_memory(&self) -> Result<(), ValidationError> {
        check_review_memory(
            self.state,
            [
                self.stability.is_some(),
                self.difficulty.is_some(),
                self.last_review_id.is_some(),
            ],
        )
    }

    fn refresh_metrics(&mut self) {
        self.front_length = self.front.chars().count() as i32;
        self.back_length = self.back.chars().count() as i32;
        self.has_media = !self.media.is_empty();
        self.tag_count = self.tags.len() as i32;
    }

    fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}

/// A row of the `cards` table
///
/// Tags and media paths are stored as JSON arrays in TEXT columns.
#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::cards)]
#[diesel(primary_key(uuid))]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CardRow {
    pub uuid: String,
    pub deck_name: String,
    pub front: String,
    pub back: String,
    pub tags: String,
    pub added_at: NaiveDateTime,
    pub modified_at: NaiveDateTime,
    pub last_review_id: Option<i32>,
    pub next_due_date: Option<NaiveDate>,
    pub state: String,
    pub stability: Option<f64>,
    pub difficulty: Option<f64>,
    pub origin_task: Option<String>,
    pub media_paths: String,
    pub source_yaml_file: Option<String>,
    pub internal_note: Option<String>,
    pub front_length: i32,
    pub back_length: i32,
    pub has_media: bool,
    pub tag_count: i32,
}

impl CardRow {
    /// Row-level form of `Card::validate_review_memory`
    pub fn validate_review_memory(&self) -> Result<(), ValidationError> {
        check_review_memory(
            self.state.parse()?,
            [
                self.stability.is_some(),
                self.difficulty.is_some(),
                self.last_review_id.is_some(),
            ],
        )
    }
}

fn check_review_memory(state: CardState, present: [bool; 3]) -> Result<(), ValidationError> {
    let reviewed = state != CardState::New;
    if present.iter().all(|&set| set == reviewed) {
        return Ok(());
    }
    Err(ValidationError::InconsistentReviewMemory {
        state: state.as_str().to_string(),
        expected: if reviewed { "have" } else { "not have" },
    })
}

impl From<&Card> for CardRow {
    fn from(card: &Card) -> Self {
        Self {
            uuid: card.uuid.to_string(),
            deck_name: card.deck_name.clone(),
            front: card.front.clone(),
            back: card.back.clone(),
            tags: validation::encode_list(&card.tags),
            added_at: card.added_at.naive_utc(),
            modified_at: card.modified_at.naive_utc(),
            last_review_id: card.last_review_id,
            next_due_date: card.next_due_date,
            state: card.state.as_str().to_string(),
            stability: card.stability,
            difficulty: card.difficulty,
            origin_task: card.origin_task.clone(),
            media_paths: validation::encode_list(
                card.media.iter().map(|p| p.to_string_lossy().into_owned()),
            ),
            source_yaml_file: card
                .source_yaml_file
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            internal_note: card.internal_note.clone(),
            front_length: card.front_length,
            back_length: card.back_length,
            has_media: card.has_media,
            tag_count: card.tag_count,
        }
    }
}

impl TryFrom<CardRow> for Card {
    type Error = ValidationError;

    fn try_from(row: CardRow) -> Result<Self, Self::Error> {
        let card = Card {
            uuid: validation::parse_uuid(&row.uuid)?,
            deck_name: row.deck_name,
            front: row.front,
            back: row.back,
            tags: validation::decode_list("tags", &row.tags)?.into_iter().collect(),
            added_at: DateTime::from_naive_utc_and_offset(row.added_at, Utc),
            modified_at: DateTime::from_naive_utc_and_offset(row.modified_at, Utc),
            last_review_id: row.last_review_id,
            next_due_date: row.next_due_date,
            state: row.state.parse()?,
            stability: row.stability,
            difficulty: row.difficulty,
            origin_task: row.origin_task,
            media: validation::decode_list("media_paths", &row.media_paths)?
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            source_yaml_file: row.source_yaml_file.map(PathBuf::from),
            internal_note: row.internal_note,
            front_length: row.front_length,
            back_length: row.back_length,
            has_media: row.has_media,
            tag_count: row.tag_count,
        };
        card.validate()?;
        card.validate_review_memory()?;
        Ok(card)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_card_metrics_count_characters() {
        let card = Card::new("Español", "¿Qué tal?", "Bien")
            .with_tags(["spanish", "greetings"])
            .with_media(["audio/que-tal.mp3"]);
        assert_eq!(card.get_front_length(), 9);
        assert_eq!(card.get_back_length(), 4);
        assert_eq!(card.get_tag_count(), 2);
        assert!(card.get_has_media());
        assert_eq!(card.get_state(), CardState::New);
        assert_eq!(card.get_next_due_date(), None);
    }

    #[test]
    fn test_set_front_refreshes_length_and_modified_at() {
        let mut card = Card::new("Deck", "Q", "A");
        let before = card.get_modified_at();
        card.set_front("Longer question");
        assert_eq!(card.get_front_length(), 15);
        assert!(card.get_modified_at() >= before);
    }

    #[test]
    fn test_validate_rejects_bad_tags_and_long_text() {
        let card = Card::new("Deck", "Q", "A").with_tags(["Not Kebab"]);
        assert_eq!(
            card.validate(),
            Err(ValidationError::TagNotKebabCase("Not Kebab".to_string()))
        );

        let long = "x".repeat(MAX_CARD_TEXT_CHARS + 1);
        let card = Card::new("Deck", long, "A");
        assert!(matches!(card.validate(), Err(ValidationError::TextTooLong { field: "front", .. })));

        let card = Card::new("  ", "Q", "A");
        assert_eq!(card.validate(), Err(ValidationError::EmptyDeckName));
    }

    #[test]
    fn test_row_conversion_preserves_card() {
        let mut card = Card::new("Deck", "Q", "A")
            .with_tags(["a", "b"])
            .with_media(["img/one.png"])
            .with_provenance(Some("import".into()), Some("cards/deck.yaml".into()), None);
        card.set_state(CardState::Review);
        card.set_stability(Some(4.2));
        card.set_difficulty(Some(5.5));
        card.set_last_review_id(Some(7));
        card.set_next_due_date(NaiveDate::from_ymd_opt(2025, 6, 1));

        let row = CardRow::from(&card);
        assert_eq!(row.tags, r#"["a","b"]"#);
        assert_eq!(row.state, "Review");

        let back = Card::try_from(row).unwrap();
        assert_eq!(back, card);
    }

    #[test]
    fn test_row_with_malformed_tags_fails_to_convert() {
        let mut row = CardRow::from(&Card::new("Deck", "Q", "A"));
        row.tags = "{broken".to_string();
        assert!(matches!(
            Card::try_from(row),
            Err(ValidationError::MalformedList { field: "tags", .. })
        ));
    }

    #[test]
    fn test_row_with_unknown_state_fails_to_convert() {
        let mut row = CardRow::from(&Card::new("Deck", "Q", "A"));
        row.state = "Buried".to_string();
        assert_eq!(
            Card::try_from(row),
            Err(ValidationError::UnknownCardState("Buried".to_string()))
        );
    }

    #[test]
    fn test_review_memory_must_match_state() {
        let mut reviewed = Card::new("Deck", "Q", "A");
        reviewed.set_state(CardState::Review);
        assert_eq!(
            reviewed.validate_review_memory(),
            Err(ValidationError::InconsistentReviewMemory {
                state: "Review".to_string(),
                expected: "have",
            })
        );
        reviewed.set_stability(Some(5.0));
        reviewed.set_difficulty(Some(5.0));
        assert!(reviewed.validate_review_memory().is_err());
        reviewed.set_last_review_id(Some(1));
        assert!(reviewed.validate_review_memory().is_ok());

        let mut fresh = Card::new("Deck", "Q", "A");
        assert!(fresh.validate_review_memory().is_ok());
        fresh.set_stability(Some(5.0));
        assert_eq!(
            fresh.validate_review_memory(),
            Err(ValidationError::InconsistentReviewMemory {
                state: "New".to_string(),
                expected: "not have",
            })
        );
    }

    #[test]
    fn test_row_with_inconsistent_memory_fails_to_convert() {
        let mut row = CardRow::from(&Card::new("Deck", "Q", "A"));
        row.state = "Review".to_string();
        assert!(matches!(
            Card::try_from(row.clone()),
            Err(ValidationError::InconsistentReviewMemory { .. })
        ));

        row.state = "New".to_string();
        row.stability = Some(5.0);
        assert!(matches!(
            row.validate_review_memory(),
            Err(ValidationError::InconsistentReviewMemory { .. })
        ));
        assert!(Card::try_from(row).is_err());
    }
}
