use std::collections::BTreeSet;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Subcommand;
use flashcore::repo::{self, DueCardQuery};
use flashcore::Database;

use crate::output::{self, OutputConfig};

/// Due card commands
#[derive(Subcommand, Debug)]
pub enum DueCommands {
    /// Count cards due today, new cards included
    Count {
        /// Only this deck
        #[clap(long)]
        deck: Option<String>,
    },
    /// List cards due today in review order
    List {
        /// Only this deck
        #[clap(long)]
        deck: Option<String>,
        /// Maximum number of cards
        #[clap(long)]
        limit: Option<usize>,
        /// Only cards with at least one of these tags
        #[clap(long = "tag")]
        tags: Vec<String>,
    },
}

/// Executes a due card command
pub fn execute(db: &Database, cmd: DueCommands, out: &OutputConfig) -> Result<()> {
    let today = Utc::now().date_naive();
    match cmd {
        DueCommands::Count { deck } => {
            let count = repo::get_due_card_count(db, deck.as_deref(), today)
                .context("Failed to count due cards")?;
            output::print_count("due", count, out)
        }
        DueCommands::List { deck, limit, tags } => {
            let tags: BTreeSet<String> = tags.into_iter().collect();
            let query = DueCardQuery::on(today)
                .with_deck(deck)
                .with_tags((!tags.is_empty()).then_some(tags))
                .with_limit(limit);
            let cards = repo::get_due_cards(db, &query).context("Failed to list due cards")?;
            output::print_cards(&cards, out)
        }
    }
}
