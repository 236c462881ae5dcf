//! # Pomotask Core Library
//!
//! This library provides the core business logic for Pomotask, a task list
//! paired with a Pomodoro focus timer. Everything is available through the
//! standalone `pomotask` CLI, which is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Timer**: A wall-clock-anchored state machine. The caller drives it by
//!   invoking `tick()` once per second; a tokio runtime loop does this for
//!   long-running front ends. Its state survives suspension through a single
//!   persisted slot.
//! - **Storage**: A per-user, per-collection record store with a typed query
//!   builder. SQLite backs the CLI; an in-memory store backs tests.
//! - **Statistics**: Pure aggregation over completed focus sessions, plus a
//!   service that loads the records it needs.
//! - **Identity**: Every operation runs inside a [`SessionContext`] that names
//!   the owner and carries their settings and clock.
//!
//! ## Key Components
//!
//! - [`FocusTimer`]: Timer state machine bound to a store
//! - [`TaskRepo`] / [`TaskBatch`]: Task CRUD and bulk maintenance
//! - [`SessionLog`]: Completed focus sessions
//! - [`StatsService`]: Overview, buckets, streaks and task analysis
//! - [`Database`]: SQLite record store
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod export;
pub mod identity;
pub mod profile;
pub mod session;
pub mod settings;
pub mod stats;
pub mod storage;
pub mod task;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, Result, StoreError, TimerError, ValidationError};
pub use events::Event;
pub use export::{ExportContent, ExportDocument, ExportFormat, ExportKind, Exporter};
pub use identity::{require_owner, IdentityProvider, SessionContext, StaticIdentity};
pub use profile::{ProfileRepo, UserProfile};
pub use session::{FocusSession, SessionDraft, SessionFilter, SessionLog};
pub use settings::{SettingsPatch, SettingsRepo, UserSettings};
pub use stats::{Granularity, StatsReport, StatsRequest, StatsService};
pub use storage::{Config, Database, MemoryStore, Query, RecordStore, SortOrder, StateSlot};
pub use task::{
    NewTask, Priority, Task, TaskBatch, TaskListFilter, TaskOrderField, TaskPatch, TaskRepo,
    TaskStatus,
};
pub use timer::{FocusTimer, TimerEngine, TimerHandle, TimerPhase, TimerSnapshot};
