//! flashcore: scheduling and durable storage for flashcard reviews
//!
//! A card's learning state moves through New, Learning, Review and Relearning
//! as ratings arrive. Each rating is turned into new memory values by a
//! pluggable memory model and stored together with the card update in a
//! single transaction.
//!
//! ### Modules
//!
//! - `scheduler`: Memory-model contract, the FSRS engine and the adapter that
//!   validates ratings and normalizes time
//! - `review_processor`: Schedules and records one review
//! - `review_session`: Queue of due cards for one sitting
//! - `db`: Connection and schema lifecycle, backups
//! - `repo`: Card, review and session queries and mutations
//! - `models`: Cards, reviews, sessions and their validated row forms
//! - `config`: Layered configuration for the `flashcore` binary
//! - `errors`: The crate error type

/// Layered configuration
pub mod config;

/// Database connection module
pub mod db;

/// Error types
pub mod errors;

/// Data models module
pub mod models;

/// Repository module for database operations
pub mod repo;

pub mod review_processor;

pub mod review_session;

/// Scheduling adapter and memory models
pub mod scheduler;

/// Database schema module
pub mod schema;

#[cfg(test)]
pub mod test_utils;

pub use db::{Database, DatabaseConfig, StoreLocation};
pub use errors::{FlashcoreError, Result};
pub use models::{Card, CardState, Rating, Review, ReviewType, Session};
pub use review_processor::ReviewProcessor;
pub use review_session::{ReviewSession, SessionStats};
pub use scheduler::{CachedMemoryState, FsrsConfig, FsrsEngine, MemoryModel, ReviewTime, Scheduler, SchedulerOutput};
