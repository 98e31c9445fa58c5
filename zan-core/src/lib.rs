//! Zan Core - Pure domain logic for task tracking
//!
//! This crate contains no I/O operations. Loading, saving and backups
//! are handled by the storage adapter in the `zan` crate.

pub mod collection;
pub mod error;
pub mod filter;
pub mod task;

pub use collection::{Settings, TaskCollection, TaskStats};
pub use error::{CoreError, Result};
pub use filter::{FilterExt, TaskFilter, TaskSort};
pub use task::{Priority, Status, Task, TaskUpdate, sanitize};
