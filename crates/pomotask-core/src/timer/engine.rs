//! Timer engine implementation.
//!
//! The timer engine is a wall-clock-anchored state machine. It does not use
//! internal threads and never reads the clock itself: every command takes the
//! current epoch milliseconds, and the caller drives `tick()` once per second.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> (Paused | Completing)
//! Paused -> Running
//! Completing -> (Break | Idle)
//! Break -> Idle
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new();
//! engine.start(25, None, now_ms)?;
//! // In a loop:
//! engine.tick(now_ms); // Returns Some(TickOutcome) when the phase ends
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use super::persist::PersistedTimerState;
use crate::clock::ms_to_datetime;
use crate::error::TimerError;
use crate::session::SessionDraft;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    Idle,
    Running,
    Paused,
    /// A pomodoro ran out and its session has not been written yet.
    Completing,
    Break,
}

impl TimerPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerPhase::Idle => "idle",
            TimerPhase::Running => "running",
            TimerPhase::Paused => "paused",
            TimerPhase::Completing => "completing",
            TimerPhase::Break => "break",
        }
    }
}

impl fmt::Display for TimerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakKind {
    Short,
    Long,
}

/// `completed_before` is the number of pomodoros finished today before the
/// one that just ended.
pub fn is_long_break(completed_before: u64, long_break_interval: u32) -> bool {
    let interval = u64::from(long_break_interval.max(1));
    (completed_before + 1) % interval == 0
}

/// A pomodoro that ran to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub started_at_ms: i64,
    pub ended_at_ms: i64,
    pub bound_task_id: Option<String>,
    /// Synthesized while restoring a suspended timer.
    pub recovered: bool,
}

impl Completion {
    pub fn duration_minutes(&self) -> u32 {
        SessionDraft::minutes_between(
            ms_to_datetime(self.started_at_ms),
            ms_to_datetime(self.ended_at_ms),
        )
    }
}

/// What a tick (or a restore) finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Completed(Completion),
    BreakFinished(Option<BreakKind>),
}

/// Serializable view of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub phase: TimerPhase,
    pub remaining_secs: u32,
    pub total_secs: u32,
    pub started_at_ms: Option<i64>,
    pub bound_task_id: Option<String>,
    /// The running break, or the break on offer while idle.
    pub break_kind: Option<BreakKind>,
    /// A break may be started (or skipped) from idle.
    pub break_ready: bool,
}

/// Core timer engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerEngine {
    phase: TimerPhase,
    /// Wall-clock anchor. While running this is `now - elapsed`.
    started_at_ms: Option<i64>,
    total_secs: u32,
    remaining_secs: u32,
    bound_task_id: Option<String>,
    break_kind: Option<BreakKind>,
    /// Set while `completing`.
    ended_at_ms: Option<i64>,
    /// The break offered after a recorded completion.
    offered_break: Option<BreakKind>,
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerEngine {
    pub fn new() -> Self {
        Self {
            phase: TimerPhase::Idle,
            started_at_ms: None,
            total_secs: 0,
            remaining_secs: 0,
            bound_task_id: None,
            break_kind: None,
            ended_at_ms: None,
            offered_break: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn total_secs(&self) -> u32 {
        self.total_secs
    }

    pub fn started_at_ms(&self) -> Option<i64> {
        self.started_at_ms
    }

    pub fn bound_task_id(&self) -> Option<&str> {
        self.bound_task_id.as_deref()
    }

    pub fn break_kind(&self) -> Option<BreakKind> {
        self.break_kind
    }

    pub fn break_ready(&self) -> bool {
        self.offered_break.is_some()
    }

    pub fn offered_break(&self) -> Option<BreakKind> {
        self.offered_break
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            phase: self.phase,
            remaining_secs: self.remaining_secs,
            total_secs: self.total_secs,
            started_at_ms: self.started_at_ms,
            bound_task_id: self.bound_task_id.clone(),
            break_kind: self.break_kind.or(self.offered_break),
            break_ready: self.break_ready(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(
        &mut self,
        minutes: u32,
        bound_task_id: Option<String>,
        now_ms: i64,
    ) -> Result<(), TimerError> {
        self.expect_phase("start", &[TimerPhase::Idle])?;
        if minutes == 0 {
            return Err(TimerError::ZeroDuration);
        }
        self.phase = TimerPhase::Running;
        self.started_at_ms = Some(now_ms);
        self.total_secs = minutes.saturating_mul(60);
        self.remaining_secs = self.total_secs;
        self.bound_task_id = bound_task_id;
        self.break_kind = None;
        self.offered_break = None;
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), TimerError> {
        self.expect_phase("pause", &[TimerPhase::Running])?;
        self.phase = TimerPhase::Paused;
        Ok(())
    }

    /// Re-anchor the start so that `now - started_at` equals the elapsed time.
    pub fn resume(&mut self, now_ms: i64) -> Result<(), TimerError> {
        self.expect_phase("resume", &[TimerPhase::Paused])?;
        let elapsed_secs = self.total_secs.saturating_sub(self.remaining_secs);
        self.started_at_ms = Some(now_ms - i64::from(elapsed_secs) * 1000);
        self.phase = TimerPhase::Running;
        Ok(())
    }

    /// Drop the current pomodoro without recording anything.
    pub fn abandon(&mut self) -> Result<(), TimerError> {
        self.expect_phase("abandon", &[TimerPhase::Running, TimerPhase::Paused])?;
        self.reset();
        Ok(())
    }

    /// The completed session has been written; go idle with `offer` on offer.
    pub fn finish_completion(&mut self, offer: BreakKind) -> Result<(), TimerError> {
        self.expect_phase("finish completion", &[TimerPhase::Completing])?;
        self.reset();
        self.offered_break = Some(offer);
        Ok(())
    }

    /// Give up on an unwritten completion.
    pub fn discard_completion(&mut self) -> Result<(), TimerError> {
        self.expect_phase("discard completion", &[TimerPhase::Completing])?;
        self.reset();
        Ok(())
    }

    /// Breaks start only from the idle state right after a completion. Yields
    /// the kind on offer.
    pub fn break_offer(&self) -> Result<BreakKind, TimerError> {
        match (self.phase, self.offered_break) {
            (TimerPhase::Idle, Some(kind)) => Ok(kind),
            _ => Err(TimerError::InvalidTransition {
                action: "start a break",
                phase: self.phase,
            }),
        }
    }

    pub fn start_break(
        &mut self,
        kind: BreakKind,
        minutes: u32,
        now_ms: i64,
    ) -> Result<(), TimerError> {
        self.break_offer()?;
        if minutes == 0 {
            return Err(TimerError::ZeroDuration);
        }
        self.phase = TimerPhase::Break;
        self.started_at_ms = Some(now_ms);
        self.total_secs = minutes.saturating_mul(60);
        self.remaining_secs = self.total_secs;
        self.bound_task_id = None;
        self.break_kind = Some(kind);
        self.offered_break = None;
        Ok(())
    }

    pub fn skip_break(&mut self) -> Result<(), TimerError> {
        let skippable = self.phase == TimerPhase::Break
            || (self.phase == TimerPhase::Idle && self.offered_break.is_some());
        if !skippable {
            return Err(TimerError::InvalidTransition {
                action: "skip a break",
                phase: self.phase,
            });
        }
        self.reset();
        Ok(())
    }

    /// Back to idle, forgetting everything.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Count down one second. The countdown never lags the wall clock, so a
    /// late tick catches up instead of drifting.
    pub fn tick(&mut self, now_ms: i64) -> Option<TickOutcome> {
        if !matches!(self.phase, TimerPhase::Running | TimerPhase::Break) {
            return None;
        }

        let by_count = self.remaining_secs.saturating_sub(1);
        self.remaining_secs = by_count.min(self.wall_remaining(now_ms));
        if self.remaining_secs > 0 {
            return None;
        }

        match self.phase {
            TimerPhase::Running => Some(TickOutcome::Completed(self.complete(now_ms, false))),
            _ => {
                let kind = self.break_kind;
                self.reset();
                Some(TickOutcome::BreakFinished(kind))
            }
        }
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// State worth persisting, or `None` when the slot should be cleared.
    ///
    /// A completion whose session is not written yet keeps its slot, and an
    /// idle timer with a break on offer persists just that offer.
    pub fn to_persisted(&self) -> Option<PersistedTimerState> {
        if self.phase == TimerPhase::Idle {
            return self.offered_break.map(|kind| PersistedTimerState {
                phase: TimerPhase::Idle,
                started_at_epoch_ms: 0,
                planned_duration_minutes: 0,
                bound_task_id: None,
                paused_remaining_seconds: None,
                break_kind: Some(kind),
                ended_at_epoch_ms: None,
            });
        }
        let mut state = PersistedTimerState {
            phase: self.phase,
            started_at_epoch_ms: self.started_at_ms?,
            planned_duration_minutes: self.total_secs / 60,
            bound_task_id: self.bound_task_id.clone(),
            paused_remaining_seconds: None,
            break_kind: None,
            ended_at_epoch_ms: None,
        };
        match self.phase {
            TimerPhase::Break => state.break_kind = self.break_kind,
            TimerPhase::Paused => state.paused_remaining_seconds = Some(self.remaining_secs),
            TimerPhase::Completing => state.ended_at_epoch_ms = self.ended_at_ms,
            TimerPhase::Running | TimerPhase::Idle => {}
        }
        Some(state)
    }

    /// Rebuild an engine from a persisted state at `now_ms`.
    ///
    /// A running pomodoro whose time is up completes right away with its
    /// duration measured up to `now_ms`; a break whose time is up finishes to
    /// idle. A persisted completion is handed back for recording again.
    /// Paused state and a break offer come back verbatim.
    pub fn restore(state: &PersistedTimerState, now_ms: i64) -> (Self, Option<TickOutcome>) {
        let mut engine = Self::new();
        if state.phase == TimerPhase::Idle {
            engine.offered_break = state.break_kind;
            return (engine, None);
        }
        let total_secs = state.planned_duration_minutes.saturating_mul(60);
        if total_secs == 0 {
            return (engine, None);
        }
        engine.started_at_ms = Some(state.started_at_epoch_ms);
        engine.total_secs = total_secs;
        engine.bound_task_id = state.bound_task_id.clone();

        match state.phase {
            TimerPhase::Running | TimerPhase::Break => {
                engine.phase = state.phase;
                engine.break_kind = state.break_kind.filter(|_| state.phase == TimerPhase::Break);
                engine.remaining_secs = engine.wall_remaining(now_ms);
                if engine.remaining_secs > 0 {
                    return (engine, None);
                }
                if state.phase == TimerPhase::Running {
                    let completion = engine.complete(now_ms, true);
                    (engine, Some(TickOutcome::Completed(completion)))
                } else {
                    let kind = engine.break_kind;
                    engine.reset();
                    (engine, Some(TickOutcome::BreakFinished(kind)))
                }
            }
            TimerPhase::Paused => {
                engine.phase = TimerPhase::Paused;
                engine.remaining_secs = state
                    .paused_remaining_seconds
                    .unwrap_or(total_secs)
                    .min(total_secs);
                (engine, None)
            }
            TimerPhase::Completing => {
                let ended_at = state.ended_at_epoch_ms.unwrap_or(now_ms);
                let completion = engine.complete(ended_at, true);
                (engine, Some(TickOutcome::Completed(completion)))
            }
            TimerPhase::Idle => (Self::new(), None),
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn expect_phase(&self, action: &'static str, allowed: &[TimerPhase]) -> Result<(), TimerError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(TimerError::InvalidTransition {
                action,
                phase: self.phase,
            })
        }
    }

    /// Seconds left according to the wall clock alone.
    fn wall_remaining(&self, now_ms: i64) -> u32 {
        let Some(started) = self.started_at_ms else {
            return self.total_secs;
        };
        let elapsed_secs = ((now_ms - started).max(0) / 1000).min(i64::from(u32::MAX)) as u32;
        self.total_secs.saturating_sub(elapsed_secs)
    }

    fn complete(&mut self, now_ms: i64, recovered: bool) -> Completion {
        self.phase = TimerPhase::Completing;
        self.remaining_secs = 0;
        self.ended_at_ms = Some(now_ms);
        Completion {
            started_at_ms: self.started_at_ms.unwrap_or(now_ms),
            ended_at_ms: now_ms,
            bound_task_id: self.bound_task_id.clone(),
            recovered,
        }
    }
}
