//! Task display formatting module
//!
//! Handles colored output for task lists and details

use colored::*;

use zan_core::{Priority, Status, Task, TaskStats};

const SHORT_ID_LEN: usize = 8;
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Check if terminal supports colors
pub fn supports_color() -> bool {
    atty::is(atty::Stream::Stdout)
}

fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Todo => "●",
        Status::InProgress => "◐",
        Status::Done => "✓",
        Status::Pending => "⏸",
    }
}

fn paint_priority(priority: Priority, use_color: bool) -> String {
    let label = format!("{:<6}", priority.as_str());
    if !use_color {
        return label;
    }
    match priority {
        Priority::High => label.red().to_string(),
        Priority::Medium => label.yellow().to_string(),
        Priority::Low => label.green().to_string(),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

/// Format a task as a single list line
pub fn format_task(task: &Task, use_color: bool) -> String {
    let id = if use_color {
        short_id(&task.id).cyan().to_string()
    } else {
        short_id(&task.id).to_string()
    };

    let title = if use_color && task.is_done() {
        task.title.green().to_string()
    } else {
        task.title.clone()
    };

    let tags_str = if task.tags.is_empty() {
        String::new()
    } else {
        let joined = task
            .tags
            .iter()
            .map(|t| format!("#{}", t))
            .collect::<Vec<_>>()
            .join(" ");
        if use_color {
            format!(" {}", joined.magenta())
        } else {
            format!(" {}", joined)
        }
    };

    format!(
        "{:<8} {} {} {}{}",
        id,
        status_icon(task.status),
        paint_priority(task.priority, use_color),
        title,
        tags_str
    )
}

/// Format every field of a task, one per line
pub fn format_task_details(task: &Task, use_color: bool) -> String {
    let mut parts = vec![
        format!("ID:          {}", task.id),
        format!("Title:       {}", task.title),
        format!(
            "Description: {}",
            task.description.as_deref().unwrap_or("")
        ),
        format!("Status:      {} {}", status_icon(task.status), task.status),
        format!("Priority:    {}", paint_priority(task.priority, use_color)),
        format!("Tags:        {}", task.tags.join(", ")),
        format!("Created At:  {}", task.created_at.format(TIME_FORMAT)),
        format!("Updated At:  {}", task.updated_at.format(TIME_FORMAT)),
    ];

    if let Some(done) = &task.completed_at {
        parts.push(format!("Completed At: {}", done.format(TIME_FORMAT)));
    }

    parts.join("\n  ")
}

/// Format a summary line for task list
pub fn format_summary(stats: TaskStats, use_color: bool) -> String {
    let completed = format!("Completed: {}", stats.completed);
    let completed = if use_color {
        completed.green().to_string()
    } else {
        completed
    };

    format!(
        "Total: {} | Incomplete: {} | {}",
        stats.total, stats.incomplete, completed
    )
}
