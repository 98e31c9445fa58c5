//! Background backup scheduler
//!
//! A Tokio task that prunes stale backups on start, then on every tick
//! snapshots the shared collection and writes a backup followed by another
//! prune. Failures are logged and the loop moves on to the next tick.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use zan_core::TaskCollection;

use crate::storage::JsonStorage;

/// Collection shared between the application service and the scheduler
pub type SharedCollection = Arc<Mutex<TaskCollection>>;

/// Handle to a running backup loop. Dropping it also stops the loop.
#[derive(Debug)]
pub struct BackupScheduler {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl BackupScheduler {
    /// Spawn the loop on the current Tokio runtime.
    /// The first backup is written one full `period` after start.
    pub fn spawn(collection: SharedCollection, storage: Arc<JsonStorage>, period: Duration) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run(collection, storage, period, shutdown_rx));

        info!(interval_secs = period.as_secs(), "backup scheduler started");
        Self { shutdown, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Signal the loop to stop and wait for it. A backup already in
    /// progress is allowed to finish first.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            error!("backup scheduler task failed: {}", e);
        }
        info!("backup scheduler stopped");
    }
}

async fn run(
    collection: SharedCollection,
    storage: Arc<JsonStorage>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    // Stale files from earlier runs
    prune(&storage).await;

    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if backup(&collection, &storage).await {
                    prune(&storage).await;
                }
            }
            // Err means every sender is gone, which is also a stop request
            _ = shutdown_rx.changed() => break,
        }
    }
}

/// Snapshot under the lock, then serialize and write off the async threads
async fn backup(collection: &SharedCollection, storage: &Arc<JsonStorage>) -> bool {
    let snapshot = {
        let guard = collection.lock().unwrap_or_else(PoisonError::into_inner);
        if !guard.settings.auto_save {
            debug!("auto-save disabled, skipping scheduled backup");
            return false;
        }
        guard.clone()
    };

    let storage = Arc::clone(storage);
    match tokio::task::spawn_blocking(move || storage.create_backup(&snapshot)).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            error!("Failed to create backup: {}", e);
            false
        }
        Err(e) => {
            error!("Backup task panicked: {}", e);
            false
        }
    }
}

async fn prune(storage: &Arc<JsonStorage>) {
    let storage = Arc::clone(storage);
    match tokio::task::spawn_blocking(move || storage.clean_old_backups()).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => error!("Failed to clean old backups: {}", e),
        Err(e) => error!("Backup cleanup task panicked: {}", e),
    }
}
