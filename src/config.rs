//! Storage configuration
//!
//! Where the data file and backups live, how many backups are kept and how
//! often they are taken. Loaded with `confy`; collection settings such as
//! the default priority live in the data file instead.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

const APP_NAME: &str = "zan";
const DATA_DIR_NAME: &str = ".zan";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the data file; defaults to `~/.zan`
    pub data_directory: String,
    pub task_filename: String,
    /// Backup subdirectory name, relative to `data_directory`
    pub backup_directory: String,
    /// Number of backup snapshots kept after pruning
    pub max_backups: usize,
    pub backup_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        // Empty when there is no home directory; reported by `data_dir`
        let data_directory = dirs::home_dir()
            .map(|home| home.join(DATA_DIR_NAME).to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            data_directory,
            task_filename: "tasks.json".to_string(),
            backup_directory: "backup".to_string(),
            max_backups: 5,
            backup_interval_secs: 60 * 60,
        }
    }
}

impl Config {
    /// Load the configuration file, creating it with defaults if absent
    pub fn load() -> Result<Self> {
        let cfg: Config = confy::load(APP_NAME, None)?;
        Ok(cfg)
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if self.data_directory.is_empty() {
            return Err(AppError::io(
                "Failed to locate the user home directory",
                io::Error::new(io::ErrorKind::NotFound, "home directory not found"),
            ));
        }
        Ok(PathBuf::from(&self.data_directory))
    }

    pub fn data_file_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(&self.task_filename))
    }

    pub fn backup_dir_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(&self.backup_directory))
    }

    pub fn backup_interval(&self) -> Duration {
        Duration::from_secs(self.backup_interval_secs.max(1))
    }
}
