use anyhow::{Context, Result};
use clap::Subcommand;
use flashcore::{repo, Database, FlashcoreError};
use uuid::Uuid;

use crate::output::{self, OutputConfig};

/// Card inspection commands
#[derive(Subcommand, Debug)]
pub enum CardCommands {
    /// List cards ordered by deck and front
    List {
        /// Only decks matching this SQL LIKE pattern
        #[clap(long)]
        deck: Option<String>,
    },
    /// Show one card
    Show {
        /// The card UUID
        uuid: Uuid,
    },
    /// Delete cards; their reviews are kept
    Delete {
        /// UUIDs of the cards to delete
        #[clap(required = true)]
        uuids: Vec<Uuid>,
    },
}

/// Executes a card command
pub fn execute(db: &Database, cmd: CardCommands, out: &OutputConfig) -> Result<()> {
    match cmd {
        CardCommands::List { deck } => {
            let cards = repo::get_all_cards(db, deck.as_deref()).context("Failed to list cards")?;
            output::print_cards(&cards, out)
        }
        CardCommands::Show { uuid } => {
            let card = repo::get_card_by_uuid(db, uuid)?.ok_or(FlashcoreError::CardNotFound(uuid))?;
            output::print_card(&card, out)
        }
        CardCommands::Delete { uuids } => {
            let removed = repo::delete_cards_by_uuids_batch(db, &uuids).context("Failed to delete cards")?;
            output::print_message(&format!("Deleted {} of {} cards", removed, uuids.len()), out)
        }
    }
}
