use anyhow::{Context, Result};
use clap::Subcommand;
use flashcore::config::Config;
use flashcore::db::backup::backup_database;
use flashcore::{repo, Database};
use tracing::info;

use crate::output::{self, OutputConfig};

/// Store maintenance commands
#[derive(Subcommand, Debug)]
pub enum DbCommands {
    /// Create the schema or apply pending migrations
    Init {
        /// Drop and recreate the schema; refused on a store holding data
        /// unless destructive recreation is allowed
        #[clap(long)]
        force_recreate: bool,
    },
    /// Show card, review and deck counts
    Stats,
    /// Copy the store into its backups directory
    Backup,
}

fn backup(db: &Database, config: &Config) -> Result<Option<std::path::PathBuf>> {
    let Some(path) = db.file_path() else {
        return Ok(None);
    };
    let keep = usize::try_from(config.backup_count).unwrap_or(usize::MAX);
    let backup = backup_database(path, keep).context("Failed to back up the store")?;
    Ok(Some(backup))
}

/// Executes a store maintenance command
pub fn execute(db: &Database, config: &Config, cmd: DbCommands, out: &OutputConfig) -> Result<()> {
    match cmd {
        DbCommands::Init { force_recreate } => {
            if force_recreate && !db.is_read_only() {
                if let Some(path) = backup(db, config)? {
                    info!(backup = %path.display(), "Backed up store before recreating the schema");
                }
            }
            db.initialize_schema(force_recreate)
                .context("Failed to initialize the schema")?;
            output::print_message(&format!("Schema ready at {}", db.location()), out)
        }
        DbCommands::Stats => {
            let stats = repo::get_database_stats(db).context("Failed to read statistics")?;
            output::print_stats(&stats, out)
        }
        DbCommands::Backup => match backup(db, config)? {
            Some(path) => output::print_message(&format!("Backup written to {}", path.display()), out),
            None => anyhow::bail!("An in-memory store cannot be backed up"),
        },
    }
}
