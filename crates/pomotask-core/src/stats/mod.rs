//! Statistics over focus sessions and tasks.
//!
//! [`aggregate`] and [`views`] are pure functions over records that are
//! already owner-scoped. [`StatsService`] loads those records from a store
//! and is what the CLI and batch callers use.

pub mod aggregate;
mod service;
pub mod views;

pub use aggregate::{
    bucket_by, bucket_key, daily_counts, overview, round1, streak, task_analysis, week_start, Bucket,
    Granularity, Overview, PriorityBreakdown, StatusCounts, TaskAnalysis, STREAK_WINDOW_DAYS,
};
pub use service::{StatsReport, StatsRequest, StatsService};
pub use views::{today_summary, week_view, DayBar, TodaySummary, WeekView};
