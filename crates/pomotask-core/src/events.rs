use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::FocusSession;
use crate::timer::{BreakKind, TimerPhase, TimerSnapshot};

/// Every timer state change produces an Event.
/// Front ends render them; the runtime broadcasts them to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        duration_secs: u32,
        bound_task_id: Option<String>,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    TimerResumed {
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    TimerAbandoned {
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    /// A pomodoro finished and its session was written.
    PomodoroCompleted {
        session: FocusSession,
        /// Completed while restoring a suspended timer.
        recovered: bool,
        at: DateTime<Utc>,
    },
    /// The session write failed; the draft is kept for `retry_record`.
    SessionRecordFailed {
        message: String,
        at: DateTime<Utc>,
    },
    /// The session was written but the bound task's counter was not advanced.
    TaskProgressFailed {
        task_id: String,
        message: String,
        at: DateTime<Utc>,
    },
    BreakStarted {
        kind: BreakKind,
        duration_secs: u32,
        at: DateTime<Utc>,
    },
    BreakFinished {
        kind: Option<BreakKind>,
        at: DateTime<Utc>,
    },
    BreakSkipped {
        at: DateTime<Utc>,
    },
    /// A persisted timer was picked up again after a restart.
    TimerRecovered {
        phase: TimerPhase,
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    /// A command was refused; the timer state is unchanged.
    CommandRejected {
        command: String,
        message: String,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        snapshot: TimerSnapshot,
        at: DateTime<Utc>,
    },
}
