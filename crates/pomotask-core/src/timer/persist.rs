//! Suspend/resume persistence of the timer.
//!
//! The timer keeps exactly one record, under [`TIMER_STATE_KEY`] in the
//! store's key-value slot. It outlives the countdown until the session is
//! written and any offered break is taken or skipped. Failures here are logged and never fail the
//! command that triggered them.

use serde::{Deserialize, Serialize};

use super::engine::{BreakKind, TimerPhase};
use crate::storage::StateSlot;

pub const TIMER_STATE_KEY: &str = "timerState";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTimerState {
    pub phase: TimerPhase,
    pub started_at_epoch_ms: i64,
    pub planned_duration_minutes: u32,
    #[serde(default)]
    pub bound_task_id: Option<String>,
    #[serde(default)]
    pub paused_remaining_seconds: Option<u32>,
    /// The running break, or on an idle state the break on offer.
    #[serde(default)]
    pub break_kind: Option<BreakKind>,
    /// When a `completing` pomodoro ran out.
    #[serde(default)]
    pub ended_at_epoch_ms: Option<i64>,
}

/// Read the persisted state. Missing, unreadable and corrupt slots all
/// read as idle.
pub fn load_state<S: StateSlot + ?Sized>(slot: &S) -> Option<PersistedTimerState> {
    let raw = match slot.slot_get(TIMER_STATE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read persisted timer state");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(state) => Some(state),
        Err(e) => {
            tracing::warn!(error = %e, "discarding corrupt persisted timer state");
            None
        }
    }
}

/// Write `state`, or clear the slot when `None`.
pub fn store_state<S: StateSlot + ?Sized>(slot: &S, state: Option<&PersistedTimerState>) {
    let result = match state {
        Some(state) => match serde_json::to_string(state) {
            Ok(json) => slot.slot_set(TIMER_STATE_KEY, &json),
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode timer state");
                return;
            }
        },
        None => slot.slot_remove(TIMER_STATE_KEY),
    };
    if let Err(e) = result {
        tracing::warn!(error = %e, "failed to persist timer state");
    }
}
