use clap::{Parser, Subcommand};
use std::path::PathBuf;

use zan_core::{Priority, Status};

#[derive(Parser)]
#[command(name = "zan")]
#[command(about = "A lightweight task tracker with automatic backups")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_version = concat!(
    "v",
    env!("CARGO_PKG_VERSION"),
    "\nCodeName: ",
    env!("CODENAME")
))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Adds a task
    Add {
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
        /// Longer description
        #[arg(long, short = 'd')]
        description: Option<String>,
        /// Priority (high, medium, low); defaults to the configured default
        #[arg(long, short = 'p')]
        priority: Option<Priority>,
        /// Tags for the task (can be specified multiple times)
        #[arg(long, short = 't', value_name = "TAG")]
        tag: Vec<String>,
    },

    /// Lists tasks with filtering and sorting
    List {
        /// Keep tasks with this status (repeatable, any may match)
        #[arg(long, short = 's')]
        status: Vec<Status>,
        /// Keep tasks with this priority (repeatable, any may match)
        #[arg(long, short = 'p')]
        priority: Vec<Priority>,
        /// Keep tasks carrying this tag (repeatable, all must match)
        #[arg(long, short = 't', value_name = "TAG")]
        tag: Vec<String>,
        /// Filter tasks containing text in title or description
        #[arg(long, short = 'q', value_name = "TERM")]
        search: Option<String>,
        /// Sort by created_at, updated_at or priority
        #[arg(long, value_name = "KEY")]
        sort: Option<String>,
        /// Ascending sort order
        #[arg(long)]
        asc: bool,
        /// Disable colors
        #[arg(long)]
        no_color: bool,
    },

    /// Shows task details
    Show { id: String },

    /// Updates fields of a task; omitted fields stay unchanged
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, short = 'd')]
        description: Option<String>,
        #[arg(long, short = 's')]
        status: Option<Status>,
        #[arg(long, short = 'p')]
        priority: Option<Priority>,
        /// Replace all tags (repeatable)
        #[arg(long, short = 't', value_name = "TAG")]
        tag: Vec<String>,
        /// Remove all tags
        #[arg(long, conflicts_with = "tag")]
        clear_tags: bool,
    },

    /// Marks a task as done
    Complete { id: String },

    /// Deletes a task
    Delete {
        id: String,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Lists all tags
    Tags,

    /// Shows task counts
    Stats,

    /// Writes all tasks to a file
    Export { path: PathBuf },

    /// Adds tasks from a file, skipping ids that already exist
    Import { path: PathBuf },

    /// Replaces all tasks and settings with a backup file
    Restore {
        path: PathBuf,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Creates a backup snapshot now
    Backup,

    /// Lists backup snapshots, oldest first
    Backups,
}
