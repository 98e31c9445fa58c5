//! Task collection aggregate
//!
//! The whole persisted state: tasks in insertion order plus metadata and
//! settings. Persistence is handled by the storage adapter in the `zan` crate.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{CoreError, Result};
use crate::task::{Priority, Task};

/// Version tag written into fresh collections. Carried through unchanged otherwise.
pub const CURRENT_VERSION: &str = "1.0.0";

/// Collection-level settings stored alongside the tasks
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Priority used when a new task omits one
    pub default_priority: Priority,
    /// Gate for every save and backup side effect
    pub auto_save: bool,
    /// Opaque display preference
    pub theme: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_priority: Priority::Medium,
            auto_save: true,
            theme: "default".to_string(),
        }
    }
}

/// Counts reported by [`TaskCollection::stats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub incomplete: usize,
}

/// In-memory collection of tasks, unique by id.
/// Fields missing from a file take the values of a fresh collection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TaskCollection {
    pub version: String,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
    pub tasks: Vec<Task>,
    pub settings: Settings,
}

impl Default for TaskCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskCollection {
    /// Create a new empty collection with default settings
    pub fn new() -> Self {
        let now = Local::now();
        TaskCollection {
            version: CURRENT_VERSION.to_string(),
            created_at: now,
            updated_at: now,
            tasks: Vec::new(),
            settings: Settings::default(),
        }
    }

    /// Builder method to set the settings
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Builder method to seed tasks
    pub fn with_tasks(mut self, tasks: Vec<Task>) -> Self {
        self.tasks = tasks;
        self
    }

    /// Count total tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check if collection is empty
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    /// Get a task by ID
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Get a mutable reference to a task by ID
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Get or return error if task not found
    pub fn get_or_err(&self, id: &str) -> Result<&Task> {
        self.get(id).ok_or_else(|| CoreError::not_found(id))
    }

    /// Get mutable or return error if task not found
    pub fn get_mut_or_err(&mut self, id: &str) -> Result<&mut Task> {
        self.get_mut(id).ok_or_else(|| CoreError::not_found(id))
    }

    /// Append a task. Fails if the id is already present.
    pub fn push(&mut self, task: Task) -> Result<()> {
        if self.contains(&task.id) {
            return Err(CoreError::validation(
                "id",
                format!("Task ID {} already exists", task.id),
            ));
        }
        self.tasks.push(task);
        Ok(())
    }

    /// Remove a task by ID, preserving the order of the rest
    pub fn remove(&mut self, id: &str) -> Option<Task> {
        self.position(id).map(|idx| self.tasks.remove(idx))
    }

    /// Remove or return error if task not found
    pub fn remove_or_err(&mut self, id: &str) -> Result<Task> {
        self.remove(id).ok_or_else(|| CoreError::not_found(id))
    }

    /// Append every incoming task whose id is not present yet.
    /// Returns the number of tasks added; duplicates are skipped silently.
    pub fn merge(&mut self, incoming: Vec<Task>) -> usize {
        let mut known: HashSet<String> = self.tasks.iter().map(|t| t.id.clone()).collect();
        let before = self.tasks.len();

        for task in incoming {
            if known.insert(task.id.clone()) {
                self.tasks.push(task);
            }
        }

        self.tasks.len() - before
    }

    /// Replace tasks, version, timestamps and settings wholesale with `other`.
    /// `updated_at` becomes `now`.
    pub fn replace_with(&mut self, other: TaskCollection, now: DateTime<Local>) {
        self.tasks = other.tasks;
        self.version = other.version;
        self.created_at = other.created_at;
        self.settings = other.settings;
        self.updated_at = now;
    }

    /// Count completed tasks
    pub fn count_completed(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_done()).count()
    }

    pub fn stats(&self) -> TaskStats {
        let total = self.len();
        let completed = self.count_completed();
        TaskStats {
            total,
            completed,
            incomplete: total - completed,
        }
    }
}
