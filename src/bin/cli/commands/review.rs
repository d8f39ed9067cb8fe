use anyhow::{Context, Result};
use clap::Subcommand;
use flashcore::{repo, ReviewProcessor};
use uuid::Uuid;

use crate::output::{self, OutputConfig};

/// Review commands
#[derive(Subcommand, Debug)]
pub enum ReviewCommands {
    /// Record a review of a card now
    Submit {
        /// The card UUID
        #[clap(long)]
        card: Uuid,
        /// The rating: 1=Again, 2=Hard, 3=Good, 4=Easy
        #[clap(long)]
        rating: i32,
        /// Time to answer in milliseconds
        #[clap(long)]
        resp_ms: Option<i32>,
        /// Time spent grading in milliseconds
        #[clap(long)]
        eval_ms: Option<i32>,
    },
    /// Show the reviews of a card, newest first
    History {
        /// The card UUID
        #[clap(long)]
        card: Uuid,
    },
}

/// Executes a review command
pub fn execute(processor: &ReviewProcessor, cmd: ReviewCommands, out: &OutputConfig) -> Result<()> {
    match cmd {
        ReviewCommands::Submit {
            card,
            rating,
            resp_ms,
            eval_ms,
        } => {
            let updated = processor
                .process_review_by_uuid(card, rating, resp_ms, eval_ms, None, None)
                .with_context(|| format!("Failed to review card {}", card))?;
            output::print_card(&updated, out)
        }
        ReviewCommands::History { card } => {
            let reviews = repo::get_reviews_for_card(processor.database(), card, true)
                .context("Failed to read review history")?;
            output::print_reviews(&reviews, out)
        }
    }
}
