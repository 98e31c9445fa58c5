//! Task domain model
//!
//! Pure domain logic for a single task record with no I/O operations.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// Workflow state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    Todo,
    InProgress,
    Done,
    Pending,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Todo,
        Status::InProgress,
        Status::Done,
        Status::Pending,
    ];

    /// Wire name as stored in the data file
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Todo => "TODO",
            Status::InProgress => "IN_PROGRESS",
            Status::Done => "DONE",
            Status::Pending => "PENDING",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = CoreError;

    /// Parse case-insensitively, accepting `-` or space in place of `_`
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_uppercase().replace(['-', ' '], "_");
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| CoreError::validation("status", format!("Invalid task status: {}", s)))
    }
}

/// Importance of a task; `High` ranks greatest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }

    /// Ordering weight used for sorting (HIGH > MEDIUM > LOW)
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_uppercase();
        Priority::ALL
            .into_iter()
            .find(|priority| priority.as_str() == normalized)
            .ok_or_else(|| {
                CoreError::validation("priority", format!("Invalid task priority: {}", s))
            })
    }
}

/// Strip every character outside the printable ASCII range (0x20..=0x7E)
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .collect()
}

/// A single task
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: Status,
    pub priority: Priority,
    /// Free-form labels; order and duplicates are preserved as given
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
    /// Set only while `status` is `Done`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Local>>,
}

impl Task {
    /// Create a new TODO task with a freshly generated id
    pub fn new(title: impl Into<String>) -> Self {
        let now = Local::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: None,
            status: Status::Todo,
            priority: Priority::default(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Builder method to set task ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Builder method to set the description (empty text means none)
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.is_empty());
        self
    }

    /// Builder method to set priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Builder method to set tags
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Builder method to set status, keeping `completed_at` consistent
    pub fn with_status(mut self, status: Status) -> Self {
        let now = Local::now();
        self.set_status(status, now);
        self
    }

    /// Builder method to set the creation time
    pub fn with_created_at(mut self, created_at: DateTime<Local>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Change status. Entering `Done` stamps `completed_at`, any other status clears it.
    pub fn set_status(&mut self, status: Status, now: DateTime<Local>) {
        self.status = status;
        self.completed_at = match status {
            Status::Done => Some(now),
            _ => None,
        };
    }

    pub fn is_done(&self) -> bool {
        self.status == Status::Done
    }

    /// Apply a partial update and stamp `updated_at`
    pub fn apply(&mut self, update: TaskUpdate, now: DateTime<Local>) {
        if let Some(title) = update.title.filter(|t| !t.is_empty()) {
            self.title = title;
        }
        if let Some(description) = update.description.filter(|d| !d.is_empty()) {
            self.description = Some(description);
        }
        if let Some(status) = update.status {
            self.set_status(status, now);
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        if let Some(tags) = update.tags {
            self.tags = tags;
        }
        self.updated_at = now;
    }

    /// Reduce title, description and tags to printable ASCII
    pub fn sanitize(&mut self) {
        self.title = sanitize(&self.title);
        self.description = self
            .description
            .as_deref()
            .map(sanitize)
            .filter(|d| !d.is_empty());
        for tag in &mut self.tags {
            *tag = sanitize(tag);
        }
    }

    /// Check the entity invariants. Status and priority are closed enums,
    /// so only the text fields can be invalid here.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(CoreError::validation("id", "Task ID cannot be empty"));
        }
        if self.title.is_empty() {
            return Err(CoreError::validation("title", "Task title cannot be empty"));
        }
        Ok(())
    }
}

/// Partial update for a task.
///
/// `None` leaves a field unchanged. An empty title or description is
/// also treated as "unchanged", so neither can be cleared through an update.
/// `Some(vec![])` for tags does clear them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
}

impl TaskUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// True when no field would be touched
    pub fn is_empty(&self) -> bool {
        self.title.as_deref().is_none_or(str::is_empty)
            && self.description.as_deref().is_none_or(str::is_empty)
            && self.status.is_none()
            && self.priority.is_none()
            && self.tags.is_none()
    }
}
