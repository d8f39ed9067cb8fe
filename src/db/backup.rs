use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info, instrument, warn};

use crate::errors::Result;

/// Name of the directory next to the store that holds its backups
pub const BACKUP_DIR: &str = "backups";

/// Length of a `YYYYmmdd-HHMMSS` timestamp
const TIMESTAMP_LEN: usize = 15;

fn backup_dir(db_path: &Path) -> PathBuf {
    db_path
        .parent()
        .map(|parent| parent.join(BACKUP_DIR))
        .unwrap_or_else(|| PathBuf::from(BACKUP_DIR))
}

fn file_stem(db_path: &Path) -> String {
    db_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn backup_prefix(db_path: &Path) -> String {
    format!("{}-backup-", file_stem(db_path))
}

fn backup_suffix(db_path: &Path) -> String {
    db_path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Backup file name for `db_path` taken at `timestamp` (`YYYYmmdd-HHMMSS`)
pub fn backup_file_name(db_path: &Path, timestamp: &str) -> String {
    format!("{}{}{}", backup_prefix(db_path), timestamp, backup_suffix(db_path))
}

/// Age order of a backup name: its timestamp, then its collision counter
///
/// Returns `None` for names that are not backups of this store.
fn backup_order(name: &str, prefix: &str, suffix: &str) -> Option<(String, u32)> {
    let stamp = name.strip_prefix(prefix)?.strip_suffix(suffix)?;
    let (timestamp, rest) = (stamp.get(..TIMESTAMP_LEN)?, stamp.get(TIMESTAMP_LEN..)?);
    let counter = match rest {
        "" => 0,
        rest => rest.strip_prefix('-')?.parse().ok()?,
    };
    Some((timestamp.to_string(), counter))
}

/// First unused backup path for `timestamp`
///
/// Backups taken within the same second get a `-1`, `-2`, ... counter after
/// the timestamp.
fn free_backup_path(dir: &Path, db_path: &Path, timestamp: &str) -> PathBuf {
    let mut path = dir.join(backup_file_name(db_path, timestamp));
    let mut counter = 0u32;
    while path.exists() {
        counter += 1;
        path = dir.join(backup_file_name(db_path, &format!("{}-{}", timestamp, counter)));
    }
    path
}

/// Lists the backups of `db_path`, oldest first
pub fn list_backups(db_path: &Path) -> Result<Vec<PathBuf>> {
    let dir = backup_dir(db_path);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let prefix = backup_prefix(db_path);
    let suffix = backup_suffix(db_path);

    let mut backups = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(order) = backup_order(&name, &prefix, &suffix) {
            if entry.path().is_file() {
                backups.push((order, entry.path()));
            }
        }
    }
    backups.sort();
    Ok(backups.into_iter().map(|(_, path)| path).collect())
}

/// Returns the most recent backup of `db_path`, if there is one
pub fn find_latest_backup(db_path: &Path) -> Result<Option<PathBuf>> {
    Ok(list_backups(db_path)?.pop())
}

/// Copies the store file into its backup directory
///
/// The copy is named `<stem>-backup-<YYYYmmdd-HHMMSS><suffix>` and lives in a
/// `backups` directory next to the store. A second backup within the same
/// second gets a counter (`<YYYYmmdd-HHMMSS>-1`) instead of overwriting the
/// first. Afterwards only the newest `keep` backups are kept; `keep == 0`
/// disables pruning.
///
/// ### Arguments
///
/// * `db_path` - The store file
/// * `keep` - How many backups to retain
///
/// ### Returns
///
/// The path of the new backup, or `db_path` itself if the store file does not
/// exist yet
///
/// ### Errors
///
/// Returns `Backup` if the directory cannot be created or the copy fails.
#[instrument(skip_all, fields(db_path = %db_path.display(), keep))]
pub fn backup_database(db_path: &Path, keep: usize) -> Result<PathBuf> {
    if !db_path.exists() {
        warn!("No database file to back up");
        return Ok(db_path.to_path_buf());
    }

    let dir = backup_dir(db_path);
    fs::create_dir_all(&dir)?;

    let timestamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
    let backup_path = free_backup_path(&dir, db_path, &timestamp);
    fs::copy(db_path, &backup_path)?;
    info!(backup = %backup_path.display(), "Database backed up");

    if keep > 0 {
        let backups = list_backups(db_path)?;
        let excess = backups.len().saturating_sub(keep);
        for old in backups.into_iter().take(excess) {
            debug!(backup = %old.display(), "Pruning old backup");
            fs::remove_file(&old)?;
        }
    }

    Ok(backup_path)
}
