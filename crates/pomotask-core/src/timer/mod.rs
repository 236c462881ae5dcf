//! Pomodoro timer.
//!
//! - [`TimerEngine`]: pure wall-clock state machine
//! - [`FocusTimer`]: the engine bound to a record store and session context
//! - [`runtime`]: tokio loop that owns a `FocusTimer` and ticks it

mod controller;
mod engine;
mod persist;
pub mod runtime;

pub use controller::{is_invalid_transition, FocusTimer};
pub use engine::{
    is_long_break, BreakKind, Completion, TickOutcome, TimerEngine, TimerPhase, TimerSnapshot,
};
pub use persist::{load_state, store_state, PersistedTimerState, TIMER_STATE_KEY};
pub use runtime::{TimerCommand, TimerHandle};
