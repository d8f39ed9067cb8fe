/// Data models module
///
/// Domain types for cards, reviews and sessions, the diesel row types they are
/// stored as, and the validating conversions between the two.

mod validation;
pub use validation::{is_kebab_case, ValidationError, MAX_CARD_TEXT_CHARS};

mod state;
pub use state::{CardState, Rating, ReviewType};

mod card;
pub use card::{Card, CardRow};

mod review;
pub use review::{NewReviewRow, Review, ReviewRow};

mod session;
pub use session::{Session, SessionChanges, SessionRow};
