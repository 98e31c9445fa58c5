use std::io::{self, Write};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use zan::{App, AppError, Config, JsonStorage, Result};
use zan_core::{Status, TaskFilter, TaskUpdate};

use crate::cli::{Cli, Commands};
use crate::display::{format_summary, format_task, format_task_details, supports_color};

mod cli;
mod display;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("zan=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cfg = Config::load()?;
    let storage = JsonStorage::from_config(&cfg)?;
    let app = App::start(storage, cfg.backup_interval())?;

    let result = run(&app, cli.command);
    app.shutdown().await;
    result
}

fn run(app: &App, command: Option<Commands>) -> Result<()> {
    let use_color = supports_color();

    match command.unwrap_or(Commands::List {
        status: Vec::new(),
        priority: Vec::new(),
        tag: Vec::new(),
        search: None,
        sort: None,
        asc: false,
        no_color: false,
    }) {
        Commands::Add {
            title,
            description,
            priority,
            tag,
        } => {
            let task = app.add_task(title.join(" "), description, priority, tag)?;
            println!("Task added: {} - {}", task.id, task.title);
        }

        Commands::List {
            status,
            priority,
            tag,
            search,
            sort,
            asc,
            no_color,
        } => {
            let filter = TaskFilter::new()
                .with_statuses(status)
                .with_priorities(priority)
                .with_tags(tag)
                .with_keyword(search);
            let mut tasks = app.filter_tasks(&filter);
            if let Some(key) = sort {
                tasks = app.sort_tasks(tasks, &key, asc);
            }

            if tasks.is_empty() {
                println!("No tasks found. Add a new task using 'zan add <title>'");
                return Ok(());
            }

            let use_color = use_color && !no_color;
            for task in &tasks {
                println!("{}", format_task(task, use_color));
            }
            println!();
            println!("{}", format_summary(app.get_task_stats(), use_color));
        }

        Commands::Show { id } => {
            let task = app.get_task_by_id(&id)?;
            println!("Task Details:\n  {}", format_task_details(&task, use_color));
        }

        Commands::Update {
            id,
            title,
            description,
            status,
            priority,
            tag,
            clear_tags,
        } => {
            let update = TaskUpdate {
                title,
                description,
                status,
                priority,
                tags: if clear_tags {
                    Some(Vec::new())
                } else if tag.is_empty() {
                    None
                } else {
                    Some(tag)
                },
            };
            if update.is_empty() {
                return Err(AppError::validation(
                    "update",
                    "At least one field to change must be provided",
                ));
            }

            let task = app.update_task(&id, update)?;
            println!("Updated task {}: {}", task.id, task.title);
        }

        Commands::Complete { id } => {
            let task = app.update_task(&id, TaskUpdate::new().status(Status::Done))?;
            println!("Task {} marked as DONE.", task.id);
        }

        Commands::Delete { id, force } => {
            if !force && !confirm(&format!("Delete task {}? This cannot be undone.", id))? {
                println!("Task deletion cancelled.");
                return Ok(());
            }
            let removed = app.delete_task(&id)?;
            println!("Removed: {}", removed.title);
        }

        Commands::Tags => {
            let tags = app.get_all_unique_tags();
            if tags.is_empty() {
                println!("No tags found.");
            } else {
                for tag in tags {
                    println!("#{}", tag);
                }
            }
        }

        Commands::Stats => {
            println!("{}", format_summary(app.get_task_stats(), use_color));
        }

        Commands::Export { path } => {
            app.export_tasks(&path)?;
            println!("Exported tasks to {}", path.display());
        }

        Commands::Import { path } => {
            let added = app.import_tasks(&path)?;
            println!("Imported {} new task(s) from {}", added, path.display());
        }

        Commands::Restore { path, force } => {
            if !force && !confirm("Restore from backup? Current tasks and settings will be replaced.")? {
                println!("Cancelled.");
                return Ok(());
            }
            app.restore_backup(&path)?;
            println!("Restored {} tasks from {}", app.get_task_stats().total, path.display());
        }

        Commands::Backup => {
            let path = app.create_backup()?;
            println!("Backup written to {}", path.display());
        }

        Commands::Backups => {
            let backups = app.list_backups()?;
            if backups.is_empty() {
                println!("No backups found in {}", app.storage().backup_dir().display());
            } else {
                for path in backups {
                    println!("{}", path.display());
                }
            }
        }
    }

    Ok(())
}

/// Ask user for confirmation
fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(input.trim().eq_ignore_ascii_case("y"))
}
