//! Data export as JSON documents or CSV tables.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Result, ValidationError};
use crate::identity::SessionContext;
use crate::profile::ProfileRepo;
use crate::session::{FocusSession, SessionFilter, SessionLog};
use crate::stats::{daily_counts, round1};
use crate::storage::{RecordStore, SortOrder};
use crate::task::{Priority, Task, TaskListFilter, TaskOrderField, TaskRepo, TaskStatus};

const TASK_CSV_HEADER: [&str; 8] = [
    "title",
    "description",
    "priority",
    "status",
    "pomodoroTarget",
    "pomodoroCompleted",
    "createdAt",
    "completedAt",
];

const SESSION_CSV_HEADER: [&str; 5] = ["taskTitle", "durationMinutes", "startedAt", "endedAt", "completed"];

/// Title shown for sessions that were not bound to a task.
pub const INDEPENDENT_SESSION_TITLE: &str = "independent";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    All,
    Tasks,
    #[serde(alias = "pomodoros")]
    Sessions,
    Statistics,
}

impl FromStr for ExportKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(ExportKind::All),
            "tasks" => Ok(ExportKind::Tasks),
            "sessions" | "pomodoros" => Ok(ExportKind::Sessions),
            "statistics" => Ok(ExportKind::Statistics),
            other => Err(ValidationError::InvalidValue {
                field: "kind".into(),
                message: format!("unknown export kind '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(ValidationError::InvalidValue {
                field: "format".into(),
                message: format!("unknown export format '{other}'"),
            }),
        }
    }
}

/// Export body. CSV is only produced for tasks and sessions.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportContent {
    Json(Value),
    Csv(String),
}

impl fmt::Display for ExportContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportContent::Json(value) => {
                let text = serde_json::to_string_pretty(value).map_err(|_| fmt::Error)?;
                f.write_str(&text)
            }
            ExportContent::Csv(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportDocument {
    pub kind: ExportKind,
    pub format: ExportFormat,
    pub exported_at: DateTime<Utc>,
    pub content: ExportContent,
}

pub struct Exporter<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    ctx: &'a SessionContext,
}

impl<'a, S: RecordStore + ?Sized> Exporter<'a, S> {
    pub fn new(store: &'a S, ctx: &'a SessionContext) -> Self {
        Self { store, ctx }
    }

    fn tasks(&self) -> Result<Vec<Task>> {
        TaskRepo::new(self.store, self.ctx).list(&TaskListFilter {
            status: None,
            order_by: TaskOrderField::CreatedAt,
            order: SortOrder::Desc,
        })
    }

    fn sessions(&self) -> Result<Vec<FocusSession>> {
        SessionLog::new(self.store, self.ctx).list(&SessionFilter::default())
    }

    pub fn export(&self, kind: ExportKind, format: ExportFormat) -> Result<ExportDocument> {
        let offset = self.ctx.offset();
        let content = match (kind, format) {
            (ExportKind::Tasks, ExportFormat::Csv) => {
                ExportContent::Csv(tasks_csv(&self.tasks()?, offset))
            }
            (ExportKind::Sessions, ExportFormat::Csv) => {
                ExportContent::Csv(sessions_csv(&self.sessions()?, offset))
            }
            (ExportKind::Tasks, _) => ExportContent::Json(serde_json::to_value(self.tasks()?)?),
            (ExportKind::Sessions, _) => {
                ExportContent::Json(serde_json::to_value(self.sessions()?)?)
            }
            (ExportKind::All, _) => ExportContent::Json(self.everything()?),
            (ExportKind::Statistics, _) => ExportContent::Json(self.statistics()?),
        };
        tracing::info!(?kind, ?format, "data exported");
        Ok(ExportDocument {
            kind,
            format,
            exported_at: self.ctx.now(),
            content,
        })
    }

    fn everything(&self) -> Result<Value> {
        let profile = ProfileRepo::new(self.store, self.ctx.owner_id()).find()?;
        Ok(json!({
            "user": profile,
            "tasks": self.tasks()?,
            "sessions": self.sessions()?,
            "settings": self.ctx.settings(),
        }))
    }

    fn statistics(&self) -> Result<Value> {
        let tasks = self.tasks()?;
        let sessions = SessionLog::new(self.store, self.ctx).all_completed()?;
        let total_minutes: u64 = sessions.iter().map(|s| u64::from(s.duration_minutes)).sum();
        let with_status = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();
        let with_priority =
            |priority: Priority| tasks.iter().filter(|t| t.priority == priority).count();
        let active_days = daily_counts(&sessions, self.ctx.offset()).len().max(1);

        Ok(json!({
            "summary": {
                "totalPomodoros": sessions.len(),
                "totalHours": round2(total_minutes as f64 / 60.0),
                "totalTasks": tasks.len(),
                "completedTasks": with_status(TaskStatus::Completed),
                "inProgressTasks": with_status(TaskStatus::InProgress),
                "pendingTasks": with_status(TaskStatus::Pending),
                "avgPomodorosPerActiveDay": round1(sessions.len() as f64 / active_days as f64),
            },
            "priority": {
                "high": with_priority(Priority::High),
                "medium": with_priority(Priority::Medium),
                "low": with_priority(Priority::Low),
            },
            "generatedAt": self.ctx.now(),
        }))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Quote a field when it holds a separator, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_row<I, T>(fields: I) -> String
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    fields
        .into_iter()
        .map(|f| csv_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

fn local_timestamp(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

pub fn tasks_csv(tasks: &[Task], offset: FixedOffset) -> String {
    let mut lines = vec![csv_row(TASK_CSV_HEADER)];
    for task in tasks {
        lines.push(csv_row([
            task.title.clone(),
            task.description.clone(),
            task.priority.to_string(),
            task.status.to_string(),
            task.pomodoro_target.to_string(),
            task.pomodoro_completed.to_string(),
            local_timestamp(task.created_at, offset),
            task.completed_at
                .map(|at| local_timestamp(at, offset))
                .unwrap_or_default(),
        ]));
    }
    lines.join("\n")
}

pub fn sessions_csv(sessions: &[FocusSession], offset: FixedOffset) -> String {
    let mut lines = vec![csv_row(SESSION_CSV_HEADER)];
    for session in sessions {
        let title = if session.task_title_snapshot.is_empty() {
            INDEPENDENT_SESSION_TITLE
        } else {
            session.task_title_snapshot.as_str()
        };
        lines.push(csv_row([
            title.to_string(),
            session.duration_minutes.to_string(),
            local_timestamp(session.started_at, offset),
            local_timestamp(session.ended_at, offset),
            if session.completed { "yes" } else { "no" }.to_string(),
        ]));
    }
    lines.join("\n")
}
