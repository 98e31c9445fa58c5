//! Zan - personal task tracker backed by a single JSON file
//!
//! The [`App`] service owns the in-memory collection; [`JsonStorage`]
//! persists it and [`BackupScheduler`] snapshots it in the background.

pub mod app;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod storage;

pub use app::App;
pub use config::Config;
pub use error::{AppError, Result};
pub use scheduler::BackupScheduler;
pub use storage::JsonStorage;
