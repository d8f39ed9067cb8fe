/// Repository module
///
/// This module provides the data access layer. Every function takes the
/// `Database` handle it operates on; mutating functions check the handle's
/// read-only flag before touching the store and run inside one transaction.

mod card_repo;
mod review_repo;
mod session_repo;

// Re-export all repository functions
pub use card_repo::*;
pub use review_repo::*;
pub use session_repo::*;
