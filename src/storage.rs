//! JSON file storage adapter for TaskCollection
//!
//! Handles persistence of the collection to a single JSON file and
//! timestamp-named backup snapshots with retention pruning.
//!
//! Saves are whole-file rewrites without a temporary file or rename, so a
//! crash mid-write can leave a truncated data file.

use chrono::{DateTime, Local};
use regex::Regex;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;
use tracing::{debug, info};

use zan_core::TaskCollection;

use crate::config::Config;
use crate::error::{AppError, Result};

pub const BACKUP_PREFIX: &str = "tasks_backup_";
pub const DEFAULT_MAX_BACKUPS: usize = 5;
const BACKUP_DIR_NAME: &str = "backup";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

// Literal pattern, cannot fail to compile
static BACKUP_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^tasks_backup_\d{14}\.json$").expect("Invalid backup name regex pattern")
});

/// Check whether a file name follows the backup naming convention
pub fn is_backup_file_name(name: &str) -> bool {
    BACKUP_NAME_REGEX.is_match(name)
}

/// JSON storage adapter
#[derive(Debug, Clone)]
pub struct JsonStorage {
    path: PathBuf,
    backup_dir: PathBuf,
    max_backups: usize,
}

impl JsonStorage {
    /// Create a storage adapter for the given data file. Backups go to a
    /// `backup` directory next to it.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let backup_dir = path
            .parent()
            .map(|dir| dir.join(BACKUP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(BACKUP_DIR_NAME));

        Self {
            path,
            backup_dir,
            max_backups: DEFAULT_MAX_BACKUPS,
        }
    }

    /// Create a storage adapter from the loaded configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.data_file_path()?)
            .with_backup_dir(config.backup_dir_path()?)
            .with_max_backups(config.max_backups))
    }

    /// Builder method to set the backup directory
    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = dir.into();
        self
    }

    /// Builder method to set the retention cap
    pub fn with_max_backups(mut self, max_backups: usize) -> Self {
        self.max_backups = max_backups;
        self
    }

    /// Get the data file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn max_backups(&self) -> usize {
        self.max_backups
    }

    /// Load the collection. A missing data file yields a fresh empty
    /// collection with default settings.
    pub fn load(&self) -> Result<TaskCollection> {
        match fs::read(&self.path) {
            Ok(bytes) => parse_collection(&bytes, &self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no data file yet, starting empty");
                Ok(TaskCollection::new())
            }
            Err(e) => Err(AppError::io(
                format!("Failed to read data file {}", self.path.display()),
                e,
            )),
        }
    }

    /// Stamp `updated_at` and overwrite the data file with the full collection
    pub fn save(&self, collection: &mut TaskCollection) -> Result<()> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            ensure_private_dir(dir)?;
        }

        collection.updated_at = Local::now();
        let data = to_json(collection)?;
        write_private(&self.path, &data).map_err(|e| {
            AppError::io(
                format!("Failed to write data file {}", self.path.display()),
                e,
            )
        })?;

        debug!(path = %self.path.display(), tasks = collection.len(), "saved collection");
        Ok(())
    }

    /// Write a snapshot named after the current time
    pub fn create_backup(&self, collection: &TaskCollection) -> Result<PathBuf> {
        self.create_backup_at(collection, Local::now())
    }

    /// Write a snapshot named `tasks_backup_<YYYYMMDDhhmmss>.json` for `timestamp`.
    /// A snapshot taken within the same second replaces the earlier one.
    pub fn create_backup_at(
        &self,
        collection: &TaskCollection,
        timestamp: DateTime<Local>,
    ) -> Result<PathBuf> {
        ensure_private_dir(&self.backup_dir)?;

        let name = format!(
            "{}{}.json",
            BACKUP_PREFIX,
            timestamp.format(BACKUP_TIMESTAMP_FORMAT)
        );
        let backup_path = self.backup_dir.join(name);

        let data = to_json(collection)?;
        write_private(&backup_path, &data).map_err(|e| {
            AppError::io(
                format!("Failed to write backup file {}", backup_path.display()),
                e,
            )
        })?;

        info!(path = %backup_path.display(), tasks = collection.len(), "created backup");
        Ok(backup_path)
    }

    /// Backup files, oldest first by modification time (ties by name).
    /// A missing backup directory yields an empty list.
    pub fn list_backups(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError::io(
                    format!("Failed to list backup directory {}", self.backup_dir.display()),
                    e,
                ));
            }
        };

        let mut backups: Vec<(SystemTime, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_str().is_some_and(is_backup_file_name))
            .filter_map(|entry| {
                let modified = entry.metadata().and_then(|m| m.modified()).ok()?;
                Some((modified, entry.path()))
            })
            .collect();
        backups.sort();

        Ok(backups.into_iter().map(|(_, path)| path).collect())
    }

    /// Delete the oldest backups until at most `max_backups` remain.
    /// Returns the number of files removed.
    pub fn clean_old_backups(&self) -> Result<usize> {
        let backups = self.list_backups()?;
        let excess = backups.len().saturating_sub(self.max_backups);

        for path in backups.iter().take(excess) {
            fs::remove_file(path).map_err(|e| {
                AppError::io(format!("Failed to remove old backup {}", path.display()), e)
            })?;
            debug!(path = %path.display(), "removed old backup");
        }

        if excess > 0 {
            info!(removed = excess, kept = self.max_backups, "pruned old backups");
        }
        Ok(excess)
    }
}

/// Read a collection-shaped file (data, backup or export)
pub fn read_collection(path: &Path) -> Result<TaskCollection> {
    let bytes = fs::read(path)
        .map_err(|e| AppError::io(format!("Failed to read file {}", path.display()), e))?;
    parse_collection(&bytes, path)
}

/// Write a collection verbatim to an arbitrary path with owner-only permissions
pub fn write_collection(path: &Path, collection: &TaskCollection) -> Result<()> {
    let data = to_json(collection)?;
    write_private(path, &data)
        .map_err(|e| AppError::io(format!("Failed to write file {}", path.display()), e))
}

/// Serialize a collection as indented JSON
pub fn to_json(collection: &TaskCollection) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(collection)
        .map_err(|e| AppError::internal_with_source("Failed to serialize tasks", e))
}

fn parse_collection(bytes: &[u8], path: &Path) -> Result<TaskCollection> {
    serde_json::from_slice(bytes).map_err(|e| {
        AppError::internal_with_source(format!("Failed to parse tasks in {}", path.display()), e)
    })
}

/// Create a directory (and parents) readable only by the owner
fn ensure_private_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    builder
        .create(dir)
        .map_err(|e| AppError::io(format!("Failed to create directory {}", dir.display()), e))
}

fn write_private(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;
    use zan_core::{Priority, Status, Task};

    fn storage_in(dir: &TempDir) -> JsonStorage {
        JsonStorage::new(dir.path().join(".zan").join("tasks.json"))
    }

    fn sample_collection() -> TaskCollection {
        TaskCollection::new().with_tasks(vec![
            Task::new("Buy groceries")
                .with_priority(Priority::High)
                .with_tags(vec!["personal".to_string()]),
            Task::new("Finish report").with_status(Status::Done),
        ])
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let storage = storage_in(&dir);

        let collection = storage.load().unwrap();

        assert!(collection.is_empty());
        assert_eq!(collection.settings.default_priority, Priority::Medium);
        assert!(collection.settings.auto_save);
        assert_eq!(collection.settings.theme, "default");
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let storage = storage_in(&dir);
        let mut collection = sample_collection();
        let before = collection.updated_at;

        storage.save(&mut collection).unwrap();
        let loaded = storage.load().unwrap();

        assert!(collection.updated_at >= before);
        assert_eq!(loaded.tasks, collection.tasks);
        assert_eq!(loaded.version, collection.version);
        assert_eq!(loaded.settings, collection.settings);
    }

    #[cfg(unix)]
    #[test]
    fn test_save_uses_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let storage = storage_in(&dir);
        storage.save(&mut sample_collection()).unwrap();

        let file_mode = fs::metadata(storage.path()).unwrap().permissions().mode();
        let dir_mode = fs::metadata(storage.path().parent().unwrap())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(file_mode & 0o777, 0o600);
        assert_eq!(dir_mode & 0o777, 0o700);
    }

    #[test]
    fn test_load_malformed_json_is_internal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        fs::write(&path, "{ not json").unwrap();

        let err = JsonStorage::new(&path).load().unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn test_saved_file_omits_absent_fields() {
        let dir = TempDir::new().unwrap();
        let storage = storage_in(&dir);
        let mut collection = TaskCollection::new().with_tasks(vec![Task::new("Bare")]);
        storage.save(&mut collection).unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(storage.path()).unwrap()).unwrap();
        let task = &raw["tasks"][0];
        assert!(task.get("description").is_none());
        assert!(task.get("tags").is_none());
        assert!(task.get("completed_at").is_none());
        assert_eq!(raw["settings"]["auto_save"], true);
    }

    #[test]
    fn test_backup_file_name_pattern() {
        assert!(is_backup_file_name("tasks_backup_20240101120000.json"));
        assert!(!is_backup_file_name("tasks_backup_2024.json"));
        assert!(!is_backup_file_name("tasks.json"));
        assert!(!is_backup_file_name("tasks_backup_20240101120000.json.tmp"));
    }

    #[test]
    fn test_backup_has_data_file_schema() {
        let dir = TempDir::new().unwrap();
        let storage = storage_in(&dir);
        let collection = sample_collection();

        let path = storage.create_backup(&collection).unwrap();

        assert!(path.starts_with(storage.backup_dir()));
        assert_eq!(read_collection(&path).unwrap(), collection);
    }

    #[test]
    fn test_rotation_keeps_newest_five() {
        let dir = TempDir::new().unwrap();
        let storage = storage_in(&dir);
        let collection = sample_collection();
        let base = Local::now();

        let created: Vec<PathBuf> = (0..6)
            .map(|i| {
                storage
                    .create_backup_at(&collection, base + Duration::seconds(i))
                    .unwrap()
            })
            .collect();

        let removed = storage.clean_old_backups().unwrap();
        let remaining = storage.list_backups().unwrap();

        assert_eq!(removed, 1);
        assert_eq!(remaining.len(), 5);
        assert!(!remaining.contains(&created[0]));
        assert_eq!(remaining, created[1..].to_vec());
    }

    #[test]
    fn test_clean_ignores_foreign_files() {
        let dir = TempDir::new().unwrap();
        let storage = storage_in(&dir).with_max_backups(1);
        let collection = sample_collection();
        let base = Local::now();

        storage.create_backup_at(&collection, base).unwrap();
        storage
            .create_backup_at(&collection, base + Duration::seconds(1))
            .unwrap();
        fs::write(storage.backup_dir().join("notes.txt"), "keep").unwrap();

        assert_eq!(storage.clean_old_backups().unwrap(), 1);
        assert_eq!(storage.list_backups().unwrap().len(), 1);
        assert!(storage.backup_dir().join("notes.txt").exists());
    }

    #[test]
    fn test_clean_without_backup_dir_is_noop() {
        let dir = TempDir::new().unwrap();
        let storage = storage_in(&dir);

        assert_eq!(storage.clean_old_backups().unwrap(), 0);
        assert!(storage.list_backups().unwrap().is_empty());
    }

    #[test]
    fn test_write_collection_into_missing_dir_is_io_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("no").join("such").join("export.json");

        let err = write_collection(&path, &sample_collection()).unwrap_err();
        assert!(err.is_io());
    }
}
