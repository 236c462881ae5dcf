//! Task records.
//!
//! Tasks carry a pomodoro target and a completed-pomodoro counter that only
//! completed focus sessions bound to the task advance. `completedAt` is set
//! exactly when `status` is `completed`.

pub mod batch;
pub mod repo;

pub use batch::{BatchOutcome, TaskBatch};
pub use repo::{TaskListFilter, TaskOrderField, TaskRepo};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 500;
pub const MAX_TAGS: usize = 10;
pub const POMODORO_TARGET_MAX: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    /// Sort rank, highest priority first.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(ValidationError::InvalidPriority(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(ValidationError::InvalidStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub owner_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: TaskStatus,
    pub pomodoro_target: u32,
    #[serde(default)]
    pub pomodoro_completed: u32,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// True once the completed count has reached the target.
    pub fn target_reached(&self) -> bool {
        self.pomodoro_completed >= self.pomodoro_target
    }
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Defaults to 1.
    #[serde(default)]
    pub pomodoro_target: Option<i64>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial task update. Only supplied fields are validated and written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub priority: Option<Priority>,
    pub pomodoro_target: Option<i64>,
    /// `Some(None)` clears the due date.
    pub due_date: Option<Option<NaiveDate>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.tags.is_none()
            && self.priority.is_none()
            && self.pomodoro_target.is_none()
            && self.due_date.is_none()
    }
}

/// Trim and bound a title.
pub fn validate_title(title: &str) -> Result<String, ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    let len = trimmed.chars().count();
    if len > TITLE_MAX_CHARS {
        return Err(ValidationError::TitleTooLong {
            len,
            max: TITLE_MAX_CHARS,
        });
    }
    Ok(trimmed.to_string())
}

pub fn validate_pomodoro_target(target: i64) -> Result<u32, ValidationError> {
    if !(1..=i64::from(POMODORO_TARGET_MAX)).contains(&target) {
        return Err(ValidationError::InvalidPomodoroTarget(target));
    }
    Ok(target as u32)
}

/// Trim, then truncate to the description limit.
pub fn normalize_description(description: &str) -> String {
    description
        .trim()
        .chars()
        .take(DESCRIPTION_MAX_CHARS)
        .collect()
}

/// Drop blank tags and keep at most [`MAX_TAGS`].
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .take(MAX_TAGS)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_trimmed_and_bounded() {
        assert_eq!(validate_title("  write report ").unwrap(), "write report");
        assert_eq!(validate_title("   "), Err(ValidationError::EmptyTitle));
        let long = "x".repeat(101);
        assert_eq!(
            validate_title(&long),
            Err(ValidationError::TitleTooLong { len: 101, max: 100 })
        );
        assert!(validate_title(&"x".repeat(100)).is_ok());
    }

    #[test]
    fn title_length_counts_characters() {
        let title = "番".repeat(100);
        assert!(validate_title(&title).is_ok());
    }

    #[test]
    fn target_bounds() {
        assert_eq!(validate_pomodoro_target(1).unwrap(), 1);
        assert_eq!(validate_pomodoro_target(100).unwrap(), 100);
        assert!(validate_pomodoro_target(0).is_err());
        assert!(validate_pomodoro_target(101).is_err());
    }

    #[test]
    fn description_is_truncated() {
        let desc = format!("  {}  ", "a".repeat(600));
        assert_eq!(normalize_description(&desc).chars().count(), 500);
    }

    #[test]
    fn tags_are_capped() {
        let tags: Vec<String> = (0..15).map(|i| format!("t{i}")).collect();
        let kept = normalize_tags(&tags);
        assert_eq!(kept.len(), 10);
        assert_eq!(kept[0], "t0");
    }

    #[test]
    fn enums_parse_and_serialize() {
        assert_eq!("in_progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert!("urgent".parse::<Priority>().is_err());
        assert_eq!(
            serde_json::to_value(TaskStatus::InProgress).unwrap(),
            serde_json::json!("in_progress")
        );
        assert!(Priority::High.rank() < Priority::Low.rank());
    }
}
