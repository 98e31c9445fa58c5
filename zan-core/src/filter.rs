//! Task filtering, searching and sorting logic
//!
//! Provides a builder-style API for filtering and a string-keyed sort.

use std::cmp::Ordering;

use crate::task::{Priority, Status, Task};

/// Sort key for tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskSort {
    CreatedAt,
    UpdatedAt,
    Priority,
    /// Any unrecognized key: newest `created_at` first, direction ignored
    #[default]
    Fallback,
}

impl TaskSort {
    /// Create from an exact key. Anything else, including other casings
    /// or surrounding whitespace, maps to `Fallback`.
    pub fn parse(s: &str) -> Self {
        match s {
            "created_at" => Self::CreatedAt,
            "updated_at" => Self::UpdatedAt,
            "priority" => Self::Priority,
            _ => Self::Fallback,
        }
    }
}

/// Sort tasks in place.
///
/// `Fallback` always sorts by `created_at` descending regardless of
/// `ascending`; callers rely on this being observable.
pub fn sort_tasks(tasks: &mut [Task], sort: TaskSort, ascending: bool) {
    let directed = |ord: Ordering| if ascending { ord } else { ord.reverse() };

    match sort {
        TaskSort::CreatedAt => tasks.sort_by(|a, b| directed(a.created_at.cmp(&b.created_at))),
        TaskSort::UpdatedAt => tasks.sort_by(|a, b| directed(a.updated_at.cmp(&b.updated_at))),
        TaskSort::Priority => {
            tasks.sort_by(|a, b| directed(a.priority.rank().cmp(&b.priority.rank())))
        }
        TaskSort::Fallback => tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }
}

/// Unique tags across all tasks, whitespace-trimmed, blank ones dropped,
/// sorted alphabetically
pub fn unique_tags<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Vec<String> {
    let mut tags: Vec<String> = tasks
        .into_iter()
        .flat_map(|t| t.tags.iter())
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect();
    tags.sort();
    tags.dedup();
    tags
}

/// Builder for filtering tasks.
///
/// Status and priority sets match any member; the tag set requires every
/// tag; an empty criterion matches everything.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Keep tasks whose status is in this set
    pub statuses: Vec<Status>,
    /// Keep tasks whose priority is in this set
    pub priorities: Vec<Priority>,
    /// Every tag must match one of the task's tags (trimmed, case-insensitive)
    pub tags: Vec<String>,
    /// Case-insensitive substring of title or description
    pub keyword: Option<String>,
}

impl TaskFilter {
    /// Create a new filter that matches everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Set status filter
    pub fn with_statuses(mut self, statuses: Vec<Status>) -> Self {
        self.statuses = statuses;
        self
    }

    /// Set priority filter
    pub fn with_priorities(mut self, priorities: Vec<Priority>) -> Self {
        self.priorities = priorities;
        self
    }

    /// Set tags filter (all must match)
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Filter by tag (must have this tag)
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Set search keyword; an empty keyword matches everything
    pub fn with_keyword(mut self, keyword: Option<String>) -> Self {
        self.keyword = keyword;
        self
    }

    /// Filter by search keyword
    pub fn search(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    /// Check if a task matches this filter
    pub fn matches(&self, task: &Task) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&task.status) {
            return false;
        }

        if !self.priorities.is_empty() && !self.priorities.contains(&task.priority) {
            return false;
        }

        let has_all_tags = self.tags.iter().all(|wanted| {
            let wanted = wanted.trim().to_lowercase();
            task.tags
                .iter()
                .any(|own| own.trim().to_lowercase() == wanted)
        });
        if !has_all_tags {
            return false;
        }

        if let Some(keyword) = self.keyword.as_deref().filter(|k| !k.is_empty()) {
            let keyword = keyword.to_lowercase();
            let in_title = task.title.to_lowercase().contains(&keyword);
            let in_description = task
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&keyword));
            if !in_title && !in_description {
                return false;
            }
        }

        true
    }

    /// Apply the filter, preserving input order
    pub fn apply<'a>(&self, tasks: impl IntoIterator<Item = &'a Task>) -> Vec<&'a Task> {
        tasks.into_iter().filter(|t| self.matches(t)).collect()
    }
}

/// Extension trait for TaskCollection to support filtering
pub trait FilterExt {
    /// Get tasks matching the filter in insertion order
    fn get_filtered(&self, filter: &TaskFilter) -> Vec<&Task>;

    /// Unique trimmed tags, sorted
    fn unique_tags(&self) -> Vec<String>;
}

impl FilterExt for crate::collection::TaskCollection {
    fn get_filtered(&self, filter: &TaskFilter) -> Vec<&Task> {
        filter.apply(&self.tasks)
    }

    fn unique_tags(&self) -> Vec<String> {
        unique_tags(&self.tasks)
    }
}
