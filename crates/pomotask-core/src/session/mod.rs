//! Focus session records.
//!
//! One [`FocusSession`] is written per completed pomodoro. Sessions are
//! immutable apart from the note and the title snapshot, and they outlive the
//! task they were bound to.

mod log;

pub use log::{SessionFilter, SessionLog};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSession {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub task_id: Option<String>,
    /// Title of the bound task when the session finished; empty when
    /// independent.
    #[serde(default)]
    pub task_title_snapshot: String,
    pub duration_minutes: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    #[serde(default = "default_completed")]
    pub completed: bool,
    #[serde(default)]
    pub note: String,
}

fn default_completed() -> bool {
    true
}

impl FocusSession {
    pub fn is_independent(&self) -> bool {
        self.task_id.is_none()
    }
}

/// A finished pomodoro that has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDraft {
    pub task_id: Option<String>,
    pub task_title_snapshot: String,
    pub duration_minutes: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl SessionDraft {
    /// Wall-clock duration rounded to whole minutes.
    pub fn minutes_between(started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> u32 {
        let ms = (ended_at - started_at).num_milliseconds().max(0);
        ((ms as f64) / 60_000.0).round() as u32
    }
}
