mod commands;
mod output;

use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flashcore::config::{self, CliArgs, Config};
use flashcore::{Database, ReviewProcessor, Scheduler};
use output::{OutputConfig, OutputFormat};
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Maintenance CLI for a flashcore review store
#[derive(Parser, Debug)]
#[clap(name = "flashcore", about = "Maintenance CLI for a flashcore review store")]
struct Cli {
    #[clap(flatten)]
    args: CliArgs,

    /// Output format
    #[clap(long, value_enum, default_value_t = OutputFormat::Human, global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Schema, statistics and backups
    #[command(subcommand)]
    Db(commands::db::DbCommands),
    /// Inspect and delete cards
    #[command(subcommand)]
    Card(commands::card::CardCommands),
    /// Submit reviews and show review history
    #[command(subcommand)]
    Review(commands::review::ReviewCommands),
    /// Cards due for review
    #[command(subcommand)]
    Due(commands::due::DueCommands),
}

/// Installs the global subscriber
///
/// Logs go to stderr so command output on stdout stays parseable. `RUST_LOG`
/// overrides the default level unless `--debug` is given.
fn init_logging(debug: bool, format: OutputFormat, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flashcore=info"))
    };

    let json = matches!(format, OutputFormat::Json);
    let human_layer = (!json).then(|| fmt::layer().with_writer(std::io::stderr));
    let json_layer = json.then(|| fmt::layer().json().with_writer(std::io::stderr));

    let (file_layer, guard) = match log_dir {
        Some(dir) => match std::fs::create_dir_all(dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(dir, "flashcore.log");
                let (writer, guard) = tracing_appender::non_blocking(appender);
                (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
            }
            Err(e) => {
                eprintln!("Warning: cannot create log directory {}: {}", dir.display(), e);
                (None, None)
            }
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(human_layer)
        .with(json_layer)
        .with(file_layer)
        .init();
    guard
}

fn run(command: Commands, config: &Config, output: &OutputConfig) -> Result<()> {
    let db = Arc::new(Database::new(config.database_config()));
    debug!(store = %db.location(), read_only = db.is_read_only(), "Opening store");

    let result = match command {
        Commands::Db(cmd) => commands::db::execute(&db, config, cmd, output),
        Commands::Card(cmd) => commands::card::execute(&db, cmd, output),
        Commands::Review(cmd) => {
            let scheduler =
                Scheduler::with_fsrs(config.fsrs_config()).context("Invalid scheduler configuration")?;
            let processor = ReviewProcessor::new(Arc::clone(&db), scheduler);
            commands::review::execute(&processor, cmd, output)
        }
        Commands::Due(cmd) => commands::due::execute(&db, cmd, output),
    };
    db.close();
    result
}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = config::get_config(cli.args.clone());
    let _guard = init_logging(cli.args.debug, cli.format, config.log_dir.as_deref());
    debug!(?config, "Configuration loaded");

    let output = OutputConfig { format: cli.format };
    if let Err(e) = run(cli.command, &config, &output) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
