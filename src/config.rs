use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::DatabaseConfig;
use crate::scheduler::fsrs::{FsrsConfig, DEFAULT_DESIRED_RETENTION, DEFAULT_MAXIMUM_INTERVAL};

/// Store path that selects an in-memory database
pub const IN_MEMORY_PATH: &str = ":memory:";

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DATABASE_FILE_NAME: &str = "flashcore.db";

/// Configuration for flashcore
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path of the SQLite store, or `:memory:`
    pub database_path: PathBuf,
    /// Opens the store read-only and rejects every mutation
    pub read_only: bool,
    /// Allows recreating the schema of a store that holds data
    pub allow_destructive_recreate: bool,
    /// Number of backups to keep next to the store
    pub backup_count: u32,
    /// Target recall probability for scheduling
    pub desired_retention: f64,
    /// Longest interval the scheduler may assign, in days
    pub max_interval_days: i32,
    /// Directory for rolling log files; no file logging if None
    pub log_dir: Option<PathBuf>,
}

/// Update structure for Config with all fields optional
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConfigUpdate {
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub read_only: Option<bool>,
    #[serde(default)]
    pub allow_destructive_recreate: Option<bool>,
    #[serde(default)]
    pub backup_count: Option<u32>,
    #[serde(default)]
    pub desired_retention: Option<f64>,
    #[serde(default)]
    pub max_interval_days: Option<i32>,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

/// Command line arguments shared by every flashcore command
#[derive(Parser, Debug, Clone, Default)]
pub struct CliArgs {
    /// Path of the SQLite store, or `:memory:`
    #[clap(long, env = "FLASHCORE_DATABASE_PATH", global = true)]
    pub database_path: Option<PathBuf>,

    /// Open the store read-only
    #[clap(long, env = "FLASHCORE_READ_ONLY", global = true)]
    pub read_only: bool,

    /// Allow recreating the schema of a store that holds data
    #[clap(long, env = "FLASHCORE_ALLOW_DESTRUCTIVE_RECREATE", global = true)]
    pub allow_destructive_recreate: bool,

    /// Number of backups to keep
    #[clap(long, env = "FLASHCORE_BACKUP_COUNT", global = true)]
    pub backup_count: Option<u32>,

    /// Target recall probability, between 0 and 1
    #[clap(long, env = "FLASHCORE_DESIRED_RETENTION", global = true)]
    pub desired_retention: Option<f64>,

    /// Longest interval in days
    #[clap(long, env = "FLASHCORE_MAX_INTERVAL_DAYS", global = true)]
    pub max_interval_days: Option<i32>,

    /// Directory for rolling log files
    #[clap(long, env = "FLASHCORE_LOG_DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    /// Debug logging
    #[clap(long, env = "FLASHCORE_DEBUG", global = true)]
    pub debug: bool,
}

impl Config {
    /// Applies a config update to the current configuration
    pub fn apply_update(self, update: ConfigUpdate) -> Self {
        Self {
            database_path: update.database_path.unwrap_or(self.database_path),
            read_only: update.read_only.unwrap_or(self.read_only),
            allow_destructive_recreate: update
                .allow_destructive_recreate
                .unwrap_or(self.allow_destructive_recreate),
            backup_count: update.backup_count.unwrap_or(self.backup_count),
            desired_retention: update.desired_retention.unwrap_or(self.desired_retention),
            max_interval_days: update.max_interval_days.unwrap_or(self.max_interval_days),
            log_dir: update.log_dir.or(self.log_dir),
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path == Path::new(IN_MEMORY_PATH)
    }

    /// Store settings for `Database::new`
    pub fn database_config(&self) -> DatabaseConfig {
        let base = if self.is_in_memory() {
            DatabaseConfig::in_memory()
        } else {
            DatabaseConfig::file(self.database_path.clone())
        };
        base.with_read_only(self.read_only)
            .with_destructive_recreate(self.allow_destructive_recreate)
    }

    /// Engine settings for `Scheduler::with_fsrs`
    pub fn fsrs_config(&self) -> FsrsConfig {
        FsrsConfig::default()
            .with_desired_retention(self.desired_retention)
            .with_maximum_interval(self.max_interval_days)
    }
}

/// Returns the base (default) configuration
///
/// The store lives in `data_dir` when one is given, otherwise in the working
/// directory.
pub fn base_config(data_dir: Option<PathBuf>) -> Config {
    let database_path =
        data_dir.map_or_else(|| PathBuf::from(DATABASE_FILE_NAME), |dir| dir.join(DATABASE_FILE_NAME));

    Config {
        database_path,
        read_only: false,
        allow_destructive_recreate: false,
        backup_count: 10,
        desired_retention: DEFAULT_DESIRED_RETENTION,
        max_interval_days: DEFAULT_MAXIMUM_INTERVAL,
        log_dir: None,
    }
}

/// Loads configuration from a TOML file
///
/// A missing path or file yields an empty update.
pub fn config_from_file(config_path: Option<PathBuf>) -> Result<ConfigUpdate, String> {
    let Some(config_path) = config_path else {
        return Ok(ConfigUpdate::default());
    };

    if !config_path.exists() {
        info!("Config file not found at {:?}, using defaults", config_path);
        return Ok(ConfigUpdate::default());
    }

    let content = fs::read_to_string(&config_path).map_err(|e| {
        warn!("Failed to read config file: {}", e);
        format!("Failed to read config file: {}", e)
    })?;
    let update = toml::from_str::<ConfigUpdate>(&content).map_err(|e| {
        warn!("Failed to parse config file: {}", e);
        format!("Failed to parse config file: {}", e)
    })?;
    info!("Loaded configuration from {:?}", config_path);
    Ok(update)
}

/// Loads configuration from command line arguments and environment
///
/// Boolean flags can only switch a setting on.
pub fn config_from_args(args: CliArgs) -> ConfigUpdate {
    ConfigUpdate {
        database_path: args.database_path,
        read_only: args.read_only.then_some(true),
        allow_destructive_recreate: args.allow_destructive_recreate.then_some(true),
        backup_count: args.backup_count,
        desired_retention: args.desired_retention,
        max_interval_days: args.max_interval_days,
        log_dir: args.log_dir,
    }
}

/// Gets the complete configuration by combining defaults with
/// values from config file, environment variables, and command line arguments
/// in order of increasing precedence
pub fn get_config(args: CliArgs) -> Config {
    let project_dirs = ProjectDirs::from("com", "flashcore", "flashcore");
    if project_dirs.is_none() {
        warn!("Could not determine platform directories, skipping config file");
    }

    let data_dir = project_dirs.as_ref().map(|dirs| dirs.data_dir().to_path_buf());
    let config_file = project_dirs
        .as_ref()
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME));

    let file_update = config_from_file(config_file).unwrap_or_else(|e| {
        warn!("Ignoring config file: {}", e);
        ConfigUpdate::default()
    });

    let config = base_config(data_dir)
        .apply_update(file_update)
        .apply_update(config_from_args(args));

    info!(
        "Final configuration: database_path={}, read_only={}, backup_count={}, desired_retention={}",
        config.database_path.display(),
        config.read_only,
        config.backup_count,
        config.desired_retention
    );

    config
}


#[cfg(test)]
mod prop_tests;
