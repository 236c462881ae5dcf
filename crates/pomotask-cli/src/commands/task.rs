//! Task management commands for CLI.

use chrono::NaiveDate;
use clap::{Subcommand, ValueEnum};
use pomotask_core::task::batch::{COMPLETED_TASK_RETENTION_DAYS, SESSION_RETENTION_DAYS};
use pomotask_core::{
    NewTask, Priority, SortOrder, TaskBatch, TaskListFilter, TaskOrderField, TaskPatch, TaskRepo,
    TaskStatus,
};

use crate::common::{print_json, App};

#[derive(Clone, Copy, ValueEnum)]
pub enum OrderBy {
    Created,
    Updated,
    Due,
    Priority,
}

impl From<OrderBy> for TaskOrderField {
    fn from(value: OrderBy) -> Self {
        match value {
            OrderBy::Created => TaskOrderField::CreatedAt,
            OrderBy::Updated => TaskOrderField::UpdatedAt,
            OrderBy::Due => TaskOrderField::DueDate,
            OrderBy::Priority => TaskOrderField::Priority,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Order {
    Asc,
    Desc,
}

impl From<Order> for SortOrder {
    fn from(value: Order) -> Self {
        match value {
            Order::Asc => SortOrder::Asc,
            Order::Desc => SortOrder::Desc,
        }
    }
}

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task
    Create {
        /// Task title
        title: String,
        /// Task description
        #[arg(long)]
        description: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        /// high, medium or low (default: medium)
        #[arg(long)]
        priority: Option<Priority>,
        /// Planned pomodoros, 1-100 (default: 1)
        #[arg(long)]
        target: Option<i64>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<NaiveDate>,
    },
    /// List tasks
    List {
        /// Filter by status (pending, in_progress, completed)
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long, value_enum, default_value = "created")]
        order_by: OrderBy,
        #[arg(long, value_enum, default_value = "desc")]
        order: Order,
    },
    /// Get task details
    Get {
        /// Task ID
        id: String,
    },
    /// Update a task
    Update {
        /// Task ID
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Comma-separated tags (empty clears them)
        #[arg(long)]
        tags: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        target: Option<i64>,
        /// New due date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<NaiveDate>,
        /// Remove the due date
        #[arg(long)]
        clear_due: bool,
    },
    /// Delete a task (its focus sessions are kept)
    Delete {
        /// Task ID
        id: String,
    },
    /// Mark a task completed
    Complete {
        /// Task ID
        id: String,
    },
    /// Reopen a completed task
    Reopen {
        /// Task ID
        id: String,
        /// Status to restore (pending or in_progress)
        #[arg(long, default_value = "pending")]
        status: TaskStatus,
    },
    /// Operate on several tasks at once
    Batch {
        #[command(subcommand)]
        action: BatchAction,
    },
}

#[derive(Subcommand)]
pub enum BatchAction {
    /// Delete the listed tasks
    Delete { ids: Vec<String> },
    /// Complete the listed tasks, skipping ones already completed
    Complete { ids: Vec<String> },
    /// Set the priority of the listed tasks
    Priority {
        priority: Priority,
        ids: Vec<String>,
    },
    /// Set the status of the listed tasks
    Status {
        status: TaskStatus,
        ids: Vec<String>,
    },
    /// Delete tasks completed more than N days ago
    CleanupTasks {
        #[arg(long, default_value_t = COMPLETED_TASK_RETENTION_DAYS)]
        days: i64,
    },
    /// Delete focus sessions older than N days
    CleanupSessions {
        #[arg(long, default_value_t = SESSION_RETENTION_DAYS)]
        days: i64,
    },
}

fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn run(action: TaskAction) -> Result<(), Box<dyn std::error::Error>> {
    let app = App::open()?;
    let ctx = app.session()?;
    let repo = TaskRepo::new(app.db.as_ref(), &ctx);

    match action {
        TaskAction::Create {
            title,
            description,
            tags,
            priority,
            target,
            due,
        } => {
            let task = repo.create(&NewTask {
                title,
                description,
                tags: tags.as_deref().map(split_tags).unwrap_or_default(),
                priority,
                pomodoro_target: target,
                due_date: due,
            })?;
            print_json(&task)?;
        }
        TaskAction::List {
            status,
            order_by,
            order,
        } => {
            let tasks = repo.list(&TaskListFilter {
                status,
                order_by: order_by.into(),
                order: order.into(),
            })?;
            print_json(&tasks)?;
        }
        TaskAction::Get { id } => print_json(&repo.get(&id)?)?,
        TaskAction::Update {
            id,
            title,
            description,
            tags,
            priority,
            target,
            due,
            clear_due,
        } => {
            let patch = TaskPatch {
                title,
                description,
                tags: tags.as_deref().map(split_tags),
                priority,
                pomodoro_target: target,
                due_date: if clear_due { Some(None) } else { due.map(Some) },
            };
            if patch.is_empty() {
                return Err("nothing to update".into());
            }
            print_json(&repo.update(&id, &patch)?)?;
        }
        TaskAction::Delete { id } => {
            repo.delete(&id)?;
            println!("Task deleted: {id}");
        }
        TaskAction::Complete { id } => print_json(&repo.complete(&id)?)?,
        TaskAction::Reopen { id, status } => print_json(&repo.uncomplete(&id, status)?)?,
        TaskAction::Batch { action } => {
            let batch = TaskBatch::new(app.db.as_ref(), &ctx);
            let outcome = match action {
                BatchAction::Delete { ids } => batch.delete(&ids)?,
                BatchAction::Complete { ids } => batch.complete(&ids)?,
                BatchAction::Priority { priority, ids } => batch.set_priority(&ids, priority)?,
                BatchAction::Status { status, ids } => batch.set_status(&ids, status)?,
                BatchAction::CleanupTasks { days } => batch.cleanup_completed_tasks(days)?,
                BatchAction::CleanupSessions { days } => batch.cleanup_old_sessions(days)?,
            };
            print_json(&outcome)?;
        }
    }
    Ok(())
}
