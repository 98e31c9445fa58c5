//! Application service
//!
//! Owns the single in-memory collection, enforces validation around every
//! mutation, persists when auto-save is on and answers queries. Front ends
//! talk only to [`App`].

use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info};

use zan_core::filter::{sort_tasks, unique_tags};
use zan_core::{
    FilterExt, Priority, Settings, Status, Task, TaskCollection, TaskFilter, TaskSort, TaskStats,
    TaskUpdate,
};

use crate::error::{AppError, Result};
use crate::scheduler::{BackupScheduler, SharedCollection};
use crate::storage::{self, JsonStorage};

pub struct App {
    collection: SharedCollection,
    storage: Arc<JsonStorage>,
    scheduler: Option<BackupScheduler>,
}

impl App {
    /// Load the collection without starting the backup scheduler
    pub fn open(storage: JsonStorage) -> Result<Self> {
        let collection = storage.load().inspect_err(|e| {
            error!("Failed to load tasks from {}: {}", storage.path().display(), e)
        })?;
        info!(
            path = %storage.path().display(),
            tasks = collection.len(),
            "loaded task collection"
        );

        Ok(Self {
            collection: Arc::new(Mutex::new(collection)),
            storage: Arc::new(storage),
            scheduler: None,
        })
    }

    /// Load the collection and, when auto-save is on, start the backup
    /// scheduler. Must be called from within a Tokio runtime.
    pub fn start(storage: JsonStorage, backup_interval: Duration) -> Result<Self> {
        let mut app = Self::open(storage)?;
        if app.settings().auto_save {
            app.scheduler = Some(BackupScheduler::spawn(
                Arc::clone(&app.collection),
                Arc::clone(&app.storage),
                backup_interval,
            ));
        }
        Ok(app)
    }

    /// Stop the backup scheduler, if any, and wait for it to finish
    pub async fn shutdown(mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.shutdown().await;
        }
    }

    pub fn has_scheduler(&self) -> bool {
        self.scheduler.is_some()
    }

    pub fn storage(&self) -> &JsonStorage {
        &self.storage
    }

    pub fn settings(&self) -> Settings {
        self.lock().settings.clone()
    }

    fn lock(&self) -> MutexGuard<'_, TaskCollection> {
        self.collection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Save after a mutation when auto-save is on. On failure the change
    /// stays applied in memory and the error goes back to the caller.
    fn persist(&self, collection: &mut TaskCollection, action: &str) -> Result<()> {
        if !collection.settings.auto_save {
            return Ok(());
        }
        self.storage
            .save(collection)
            .inspect_err(|e| error!("Failed to save tasks on {}: {}", action, e))
    }

    /// Create a task. A missing priority falls back to the collection default.
    pub fn add_task(
        &self,
        title: impl Into<String>,
        description: Option<String>,
        priority: Option<Priority>,
        tags: Vec<String>,
    ) -> Result<Task> {
        let title = title.into();
        if title.is_empty() {
            return Err(AppError::validation("title", "Title cannot be empty"));
        }

        let mut collection = self.lock();
        let priority = priority.unwrap_or(collection.settings.default_priority);

        let mut task = Task::new(title)
            .with_description(description)
            .with_priority(priority)
            .with_tags(tags);
        task.sanitize();
        task.validate().inspect_err(|e| error!("Validation error on add: {}", e))?;

        collection.push(task.clone())?;
        self.persist(&mut collection, "add")?;

        debug!(id = %task.id, "added task");
        Ok(task)
    }

    pub fn get_task_by_id(&self, id: &str) -> Result<Task> {
        Ok(self.lock().get_or_err(id)?.clone())
    }

    /// Apply a partial update. The change is validated on a copy and only
    /// committed if it passes.
    pub fn update_task(&self, id: &str, update: TaskUpdate) -> Result<Task> {
        let mut collection = self.lock();

        let mut updated = collection.get_or_err(id)?.clone();
        updated.apply(update, Local::now());
        updated.sanitize();
        updated
            .validate()
            .inspect_err(|e| error!("Validation error on update: {}", e))?;

        *collection.get_mut_or_err(id)? = updated.clone();
        self.persist(&mut collection, "update")?;

        debug!(id = %updated.id, status = %updated.status, "updated task");
        Ok(updated)
    }

    /// Remove a task, returning it
    pub fn delete_task(&self, id: &str) -> Result<Task> {
        let mut collection = self.lock();
        let removed = collection.remove_or_err(id)?;
        self.persist(&mut collection, "delete")?;

        debug!(id = %removed.id, "deleted task");
        Ok(removed)
    }

    /// All tasks in insertion order
    pub fn get_all_tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    pub fn get_task_stats(&self) -> TaskStats {
        self.lock().stats()
    }

    /// Tasks matching every criterion of the filter, in insertion order
    pub fn filter_tasks(&self, filter: &TaskFilter) -> Vec<Task> {
        self.lock()
            .get_filtered(filter)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Tasks whose status is any of `statuses`; all tasks when empty
    pub fn get_filtered_tasks_by_status(&self, statuses: &[Status]) -> Vec<Task> {
        self.filter_tasks(&TaskFilter::new().with_statuses(statuses.to_vec()))
    }

    /// Tasks whose priority is any of `priorities`; all tasks when empty
    pub fn get_filtered_tasks_by_priority(&self, priorities: &[Priority]) -> Vec<Task> {
        self.filter_tasks(&TaskFilter::new().with_priorities(priorities.to_vec()))
    }

    /// Tasks carrying every one of `tags`; all tasks when empty
    pub fn get_filtered_tasks_by_tags<S: AsRef<str>>(&self, tags: &[S]) -> Vec<Task> {
        let tags = tags.iter().map(|t| t.as_ref().to_string()).collect();
        self.filter_tasks(&TaskFilter::new().with_tags(tags))
    }

    /// Case-insensitive keyword search over title and description
    pub fn search(&self, keyword: &str) -> Vec<Task> {
        self.filter_tasks(&TaskFilter::new().search(keyword))
    }

    /// Sort by `created_at`, `updated_at` or `priority`. Any other key sorts
    /// by `created_at` descending and ignores `ascending`.
    pub fn sort_tasks(&self, mut tasks: Vec<Task>, sort_by: &str, ascending: bool) -> Vec<Task> {
        sort_tasks(&mut tasks, TaskSort::parse(sort_by), ascending);
        tasks
    }

    pub fn get_all_unique_tags(&self) -> Vec<String> {
        unique_tags(&self.lock().tasks)
    }

    /// Dump the live collection verbatim to `path`
    pub fn export_tasks(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = non_empty_path(path.as_ref())?;

        let snapshot = self.lock().clone();
        storage::write_collection(path, &snapshot)
            .inspect_err(|e| error!("Failed to write export file: {}", e))?;

        info!(path = %path.display(), tasks = snapshot.len(), "exported tasks");
        Ok(())
    }

    /// Append tasks from a collection-shaped file, skipping ids already
    /// present. Imported tasks are not re-validated. Returns how many were added.
    pub fn import_tasks(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = non_empty_path(path.as_ref())?;
        let imported = storage::read_collection(path)
            .inspect_err(|e| error!("Failed to read import file: {}", e))?;

        let mut collection = self.lock();
        let offered = imported.tasks.len();
        let added = collection.merge(imported.tasks);
        self.persist(&mut collection, "import")?;

        info!(path = %path.display(), added, skipped = offered - added, "imported tasks");
        Ok(added)
    }

    /// Replace the live collection wholesale (tasks, version, timestamps and
    /// settings) with the contents of a backup file
    pub fn restore_backup(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = non_empty_path(path.as_ref())?;
        let backup = storage::read_collection(path)
            .inspect_err(|e| error!("Failed to read backup file: {}", e))?;

        let mut collection = self.lock();
        collection.replace_with(backup, Local::now());
        self.persist(&mut collection, "restore")?;

        info!(path = %path.display(), tasks = collection.len(), "restored backup");
        Ok(())
    }

    /// Write a backup snapshot now and prune old ones
    pub fn create_backup(&self) -> Result<PathBuf> {
        let snapshot = self.lock().clone();
        let path = self.storage.create_backup(&snapshot)?;
        self.storage.clean_old_backups()?;
        Ok(path)
    }

    /// Backup files, oldest first
    pub fn list_backups(&self) -> Result<Vec<PathBuf>> {
        self.storage.list_backups()
    }
}

fn non_empty_path(path: &Path) -> Result<&Path> {
    if path.as_os_str().is_empty() {
        return Err(AppError::validation("path", "File path cannot be empty"));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn open_app(dir: &TempDir) -> App {
        App::open(JsonStorage::new(dir.path().join(".zan").join("tasks.json"))).unwrap()
    }

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_new_app_is_empty() {
        let dir = TempDir::new().unwrap();
        let app = open_app(&dir);

        assert!(app.get_all_tasks().is_empty());
        assert!(!app.has_scheduler());
        assert!(!app.storage().path().exists());
    }

    #[test]
    fn test_add_then_get() {
        let dir = TempDir::new().unwrap();
        let app = open_app(&dir);

        let added = app
            .add_task(
                "Test Task 1",
                Some("Description 1".to_string()),
                Some(Priority::High),
                tags(&["tag1", "tag2"]),
            )
            .unwrap();
        let fetched = app.get_task_by_id(&added.id).unwrap();

        assert!(!fetched.id.is_empty());
        assert_eq!(fetched.title, "Test Task 1");
        assert_eq!(fetched.description.as_deref(), Some("Description 1"));
        assert_eq!(fetched.priority, Priority::High);
        assert_eq!(fetched.tags, vec!["tag1", "tag2"]);
        assert_eq!(fetched.status, Status::Todo);
        assert_eq!(fetched.created_at, fetched.updated_at);
        assert!(app.storage().path().exists());
    }

    #[test]
    fn test_add_uses_default_priority() {
        let dir = TempDir::new().unwrap();
        let app = open_app(&dir);

        let task = app.add_task("No priority", None, None, Vec::new()).unwrap();
        assert_eq!(task.priority, Priority::Medium);
    }

    #[test]
    fn test_add_empty_title_fails() {
        let dir = TempDir::new().unwrap();
        let app = open_app(&dir);
        app.add_task("Existing", None, None, Vec::new()).unwrap();

        let err = app.add_task("", None, None, Vec::new()).unwrap_err();
        assert!(err.is_validation());

        // Sanitizes down to nothing
        let err = app.add_task("\u{1F600}\n", None, None, Vec::new()).unwrap_err();
        assert!(err.is_validation());

        assert_eq!(app.get_all_tasks().len(), 1);
    }

    #[test]
    fn test_add_sanitizes_text() {
        let dir = TempDir::new().unwrap();
        let app = open_app(&dir);

        let task = app
            .add_task("Tea\ttime ☕", Some("ok\u{0}".to_string()), None, tags(&["näh"]))
            .unwrap();

        assert_eq!(task.title, "Teatime ");
        assert_eq!(task.description.as_deref(), Some("ok"));
        assert_eq!(task.tags, vec!["nh"]);
    }

    #[test]
    fn test_get_unknown_id_is_not_found() {
        let dir = TempDir::new().unwrap();
        let app = open_app(&dir);

        assert!(app.get_task_by_id("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_update_status_sets_and_clears_completed_at() {
        let dir = TempDir::new().unwrap();
        let app = open_app(&dir);
        let task = app.add_task("Finish", None, None, Vec::new()).unwrap();

        let done = app
            .update_task(&task.id, TaskUpdate::new().status(Status::Done))
            .unwrap();
        assert!(done.completed_at.is_some());
        assert!(done.updated_at >= task.updated_at);

        let reopened = app
            .update_task(&task.id, TaskUpdate::new().status(Status::Todo))
            .unwrap();
        assert!(reopened.completed_at.is_none());
        assert!(app.get_task_by_id(&task.id).unwrap().completed_at.is_none());
    }

    #[test]
    fn test_update_leaves_omitted_fields() {
        let dir = TempDir::new().unwrap();
        let app = open_app(&dir);
        let task = app
            .add_task("Title", Some("Desc".to_string()), Some(Priority::Low), tags(&["a"]))
            .unwrap();

        let updated = app
            .update_task(&task.id, TaskUpdate::new().title("").priority(Priority::High))
            .unwrap();

        assert_eq!(updated.title, "Title");
        assert_eq!(updated.description.as_deref(), Some("Desc"));
        assert_eq!(updated.priority, Priority::High);
        assert_eq!(updated.tags, vec!["a"]);
    }

    #[test]
    fn test_update_failing_validation_discards_change() {
        let dir = TempDir::new().unwrap();
        let app = open_app(&dir);
        let task = app.add_task("Keep", None, None, Vec::new()).unwrap();

        let err = app
            .update_task(
                &task.id,
                TaskUpdate::new().title("\u{2603}").priority(Priority::High),
            )
            .unwrap_err();

        assert!(err.is_validation());
        let stored = app.get_task_by_id(&task.id).unwrap();
        assert_eq!(stored, task);
    }

    #[test]
    fn test_update_unknown_id_is_not_found() {
        let dir = TempDir::new().unwrap();
        let app = open_app(&dir);

        let err = app
            .update_task("missing", TaskUpdate::new().title("x"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete() {
        let dir = TempDir::new().unwrap();
        let app = open_app(&dir);
        let task = app.add_task("Doomed", None, None, Vec::new()).unwrap();
        app.add_task("Survivor", None, None, Vec::new()).unwrap();

        assert!(app.delete_task("missing").unwrap_err().is_not_found());
        assert_eq!(app.get_all_tasks().len(), 2);

        app.delete_task(&task.id).unwrap();
        let remaining = app.get_all_tasks();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].title, "Survivor");
    }

    #[test]
    fn test_mutations_persist_when_auto_save() {
        let dir = TempDir::new().unwrap();
        let app = open_app(&dir);
        let task = app.add_task("Persist me", None, None, Vec::new()).unwrap();

        let reopened = open_app(&dir);
        assert_eq!(reopened.get_task_by_id(&task.id).unwrap().title, "Persist me");
    }

    #[test]
    fn test_no_disk_writes_without_auto_save() {
        let dir = TempDir::new().unwrap();
        let storage = JsonStorage::new(dir.path().join("tasks.json"));
        let mut collection = TaskCollection::new();
        collection.settings.auto_save = false;
        storage.save(&mut collection).unwrap();
        let written = fs::read(storage.path()).unwrap();

        let app = App::open(storage).unwrap();
        app.add_task("Memory only", None, None, Vec::new()).unwrap();

        assert_eq!(fs::read(app.storage().path()).unwrap(), written);
        assert_eq!(app.get_all_tasks().len(), 1);
    }

    #[test]
    fn test_save_failure_keeps_change_in_memory() {
        let dir = TempDir::new().unwrap();
        let app = open_app(&dir);
        // The data directory path is taken by a regular file
        fs::write(dir.path().join(".zan"), b"").unwrap();

        let err = app.add_task("Unsaved", None, None, Vec::new()).unwrap_err();
        assert!(err.is_io());
        let tasks = app.get_all_tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Unsaved");

        let id = tasks[0].id.clone();
        let err = app
            .update_task(&id, TaskUpdate::new().status(Status::Done))
            .unwrap_err();
        assert!(err.is_io());
        assert_eq!(app.get_task_by_id(&id).unwrap().status, Status::Done);

        assert!(app.delete_task(&id).unwrap_err().is_io());
        assert!(app.get_all_tasks().is_empty());
    }

    #[test]
    fn test_stats() {
        let dir = TempDir::new().unwrap();
        let app = open_app(&dir);
        let a = app.add_task("A", None, None, Vec::new()).unwrap();
        app.add_task("B", None, None, Vec::new()).unwrap();
        app.add_task("C", None, None, Vec::new()).unwrap();
        app.update_task(&a.id, TaskUpdate::new().status(Status::Done))
            .unwrap();

        let stats = app.get_task_stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.incomplete, 2);
    }

    #[test]
    fn test_filters_and_search() {
        let dir = TempDir::new().unwrap();
        let app = open_app(&dir);
        app.add_task("A", None, Some(Priority::High), tags(&["work", "urgent"]))
            .unwrap();
        let b = app
            .add_task("B", None, Some(Priority::Low), tags(&["work"]))
            .unwrap();
        app.add_task(
            "Grocery shopping list",
            None,
            Some(Priority::Medium),
            tags(&["personal", "urgent"]),
        )
        .unwrap();
        app.update_task(&b.id, TaskUpdate::new().status(Status::InProgress))
            .unwrap();

        let by_tags = app.get_filtered_tasks_by_tags(&["work", "urgent"]);
        assert_eq!(by_tags.len(), 1);
        assert_eq!(by_tags[0].title, "A");

        let by_status = app.get_filtered_tasks_by_status(&[Status::InProgress]);
        assert_eq!(by_status.len(), 1);
        assert_eq!(by_status[0].title, "B");
        assert_eq!(app.get_filtered_tasks_by_status(&[]).len(), 3);

        let by_priority = app.get_filtered_tasks_by_priority(&[Priority::High, Priority::Low]);
        assert_eq!(by_priority.len(), 2);

        let found = app.search("grocery");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Grocery shopping list");
        assert_eq!(app.search("").len(), 3);
    }

    #[test]
    fn test_sort_tasks_by_priority() {
        let dir = TempDir::new().unwrap();
        let app = open_app(&dir);
        app.add_task("low", None, Some(Priority::Low), Vec::new()).unwrap();
        app.add_task("high", None, Some(Priority::High), Vec::new()).unwrap();
        app.add_task("medium", None, Some(Priority::Medium), Vec::new())
            .unwrap();

        let sorted = app.sort_tasks(app.get_all_tasks(), "priority", false);
        let priorities: Vec<Priority> = sorted.iter().map(|t| t.priority).collect();
        assert_eq!(priorities, vec![Priority::High, Priority::Medium, Priority::Low]);
    }

    #[test]
    fn test_unique_tags() {
        let dir = TempDir::new().unwrap();
        let app = open_app(&dir);
        app.add_task("A", None, None, tags(&["work", "urgent"])).unwrap();
        app.add_task("B", None, None, tags(&["urgent", "home"])).unwrap();

        assert_eq!(app.get_all_unique_tags(), vec!["home", "urgent", "work"]);
    }

    #[test]
    fn test_export_requires_path() {
        let dir = TempDir::new().unwrap();
        let app = open_app(&dir);

        assert!(app.export_tasks("").unwrap_err().is_validation());
        assert!(app.import_tasks("").unwrap_err().is_validation());
        assert!(app.restore_backup("").unwrap_err().is_validation());
    }

    #[test]
    fn test_export_writes_collection() {
        let dir = TempDir::new().unwrap();
        let app = open_app(&dir);
        app.add_task("Exported", None, None, Vec::new()).unwrap();
        let export_path = dir.path().join("export.json");

        app.export_tasks(&export_path).unwrap();

        let exported = storage::read_collection(&export_path).unwrap();
        assert_eq!(exported.tasks, app.get_all_tasks());
    }

    #[test]
    fn test_import_skips_existing_ids() {
        let dir = TempDir::new().unwrap();
        let app = open_app(&dir);
        let existing = app.add_task("Original", None, None, Vec::new()).unwrap();

        let mut clash = existing.clone();
        clash.title = "Imposter".to_string();
        let incoming = TaskCollection::new().with_tasks(vec![clash, Task::new("Brand new")]);
        let import_path = dir.path().join("import.json");
        storage::write_collection(&import_path, &incoming).unwrap();

        let added = app.import_tasks(&import_path).unwrap();

        assert_eq!(added, 1);
        assert_eq!(app.get_all_tasks().len(), 2);
        assert_eq!(app.get_task_by_id(&existing.id).unwrap(), existing);
    }

    #[test]
    fn test_import_errors() {
        let dir = TempDir::new().unwrap();
        let app = open_app(&dir);

        let missing = dir.path().join("nope.json");
        assert!(app.import_tasks(&missing).unwrap_err().is_io());

        let garbage = dir.path().join("garbage.json");
        fs::write(&garbage, "not json at all").unwrap();
        assert!(app.import_tasks(&garbage).unwrap_err().is_internal());
    }

    #[test]
    fn test_restore_replaces_everything() {
        let dir = TempDir::new().unwrap();
        let app = open_app(&dir);
        app.add_task("Current", None, None, Vec::new()).unwrap();

        let mut backup = TaskCollection::new().with_tasks(vec![
            Task::new("From backup 1"),
            Task::new("From backup 2"),
        ]);
        backup.version = "0.9.0".to_string();
        backup.settings.theme = "dark".to_string();
        backup.settings.default_priority = Priority::Low;
        let backup_path = dir.path().join("backup.json");
        storage::write_collection(&backup_path, &backup).unwrap();

        app.restore_backup(&backup_path).unwrap();

        let titles: Vec<String> = app.get_all_tasks().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["From backup 1", "From backup 2"]);
        assert_eq!(app.settings().theme, "dark");

        let task = app.add_task("After restore", None, None, Vec::new()).unwrap();
        assert_eq!(task.priority, Priority::Low);

        let on_disk = app.storage().load().unwrap();
        assert_eq!(on_disk.version, "0.9.0");
        assert_eq!(on_disk.len(), 3);
    }

    #[test]
    fn test_create_and_list_backups() {
        let dir = TempDir::new().unwrap();
        let app = open_app(&dir);
        app.add_task("Backed up", None, None, Vec::new()).unwrap();

        let path = app.create_backup().unwrap();

        assert_eq!(app.list_backups().unwrap(), vec![path.clone()]);
        app.restore_backup(&path).unwrap();
        assert_eq!(app.get_all_tasks()[0].title, "Backed up");
    }

    #[tokio::test]
    async fn test_start_spawns_scheduler_only_with_auto_save() {
        let dir = TempDir::new().unwrap();
        let app = App::start(
            JsonStorage::new(dir.path().join("tasks.json")),
            Duration::from_secs(3600),
        )
        .unwrap();
        assert!(app.has_scheduler());
        app.shutdown().await;

        let quiet_dir = TempDir::new().unwrap();
        let storage = JsonStorage::new(quiet_dir.path().join("tasks.json"));
        let mut collection = TaskCollection::new();
        collection.settings.auto_save = false;
        storage.save(&mut collection).unwrap();

        let app = App::start(storage, Duration::from_secs(3600)).unwrap();
        assert!(!app.has_scheduler());
        app.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_mutations_during_scheduled_backups() {
        let dir = TempDir::new().unwrap();
        let app = App::start(
            JsonStorage::new(dir.path().join("tasks.json")),
            Duration::from_millis(10),
        )
        .unwrap();

        for i in 0..50 {
            app.add_task(format!("Task {}", i), None, None, vec!["load".to_string()])
                .unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        let storage = app.storage().clone();
        app.shutdown().await;

        let backups = storage.list_backups().unwrap();
        assert!(!backups.is_empty());
        for path in backups {
            let snapshot = storage::read_collection(&path).unwrap();
            assert!(snapshot.len() <= 50);
            assert!(snapshot.tasks.iter().all(|t| t.tags == vec!["load"]));
        }
        assert_eq!(storage.load().unwrap().len(), 50);
    }
}
