use thiserror::Error;

/// Maximum length, in characters, of a card's front or back text
pub const MAX_CARD_TEXT_CHARS: usize = 1024;

/// Why a value could not be turned into a domain entity
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("invalid UUID '{value}': {reason}")]
    InvalidUuid { value: String, reason: String },
    #[error("unknown card state '{0}'")]
    UnknownCardState(String),
    #[error("unknown review type '{0}'")]
    UnknownReviewType(String),
    #[error("rating {0} is outside 1-4")]
    RatingOutOfRange(i32),
    #[error("deck name must not be empty")]
    EmptyDeckName,
    #[error("tag '{0}' is not in kebab-case")]
    TagNotKebabCase(String),
    #[error("{field} is {len} characters long, the limit is {max}")]
    TextTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: i64 },
    #[error("malformed {field} list: {reason}")]
    MalformedList { field: &'static str, reason: String },
    #[error("a {state} card must {expected} stability, difficulty and a last review")]
    InconsistentReviewMemory { state: String, expected: &'static str },
}

/// Checks a tag against `^[a-z0-9]+(-[a-z0-9]+)*$`
pub fn is_kebab_case(tag: &str) -> bool {
    !tag.is_empty()
        && tag.split('-').all(|part| {
            !part.is_empty() && part.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        })
}

pub(crate) fn parse_uuid(value: &str) -> Result<uuid::Uuid, ValidationError> {
    uuid::Uuid::parse_str(value).map_err(|e| ValidationError::InvalidUuid {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn non_negative(field: &'static str, value: Option<i32>) -> Result<(), ValidationError> {
    match value {
        Some(v) if v < 0 => Err(ValidationError::Negative { field, value: v as i64 }),
        _ => Ok(()),
    }
}

/// Encodes a list of strings as the JSON array stored in TEXT columns
pub(crate) fn encode_list<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let values: Vec<String> = items.into_iter().map(|s| s.as_ref().to_string()).collect();
    serde_json::Value::from(values).to_string()
}

/// Decodes a JSON array stored in a TEXT column
pub(crate) fn decode_list(field: &'static str, text: &str) -> Result<Vec<String>, ValidationError> {
    serde_json::from_str::<Vec<String>>(text).map_err(|e| ValidationError::MalformedList {
        field,
        reason: e.to_string(),
    })
}
