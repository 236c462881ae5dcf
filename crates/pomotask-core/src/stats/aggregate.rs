//! Pure aggregation over focus sessions and tasks.
//!
//! Inputs are already owner-scoped and, for sessions, restricted to
//! completed ones. Every function is deterministic: same input, same output.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::local_date;
use crate::session::FocusSession;
use crate::task::{Priority, Task, TaskStatus};

/// Days looked back when counting a streak.
pub const STREAK_WINDOW_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
}

/// Sessions grouped under one day, week or month key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    /// `YYYY-MM-DD` for days and weeks (the Monday), `YYYY-MM` for months.
    pub key: String,
    pub count: u32,
    pub total_minutes: u32,
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

pub fn bucket_key(at: DateTime<Utc>, granularity: Granularity, offset: FixedOffset) -> String {
    let date = local_date(at, offset);
    match granularity {
        Granularity::Day => date.format("%Y-%m-%d").to_string(),
        Granularity::Week => week_start(date).format("%Y-%m-%d").to_string(),
        Granularity::Month => date.format("%Y-%m").to_string(),
    }
}

/// Group sessions by local start date, ascending by key.
pub fn bucket_by(
    sessions: &[FocusSession],
    granularity: Granularity,
    offset: FixedOffset,
) -> Vec<Bucket> {
    let mut buckets: BTreeMap<String, Bucket> = BTreeMap::new();
    for session in sessions {
        let key = bucket_key(session.started_at, granularity, offset);
        let bucket = buckets.entry(key.clone()).or_insert_with(|| Bucket {
            key,
            count: 0,
            total_minutes: 0,
        });
        bucket.count += 1;
        bucket.total_minutes += session.duration_minutes;
    }
    buckets.into_values().collect()
}

/// Per-day session counts keyed by local date.
pub fn daily_counts(sessions: &[FocusSession], offset: FixedOffset) -> BTreeMap<NaiveDate, u32> {
    let mut counts = BTreeMap::new();
    for session in sessions {
        *counts.entry(local_date(session.started_at, offset)).or_insert(0) += 1;
    }
    counts
}

/// Consecutive days with at least one session, counting back from `today`.
///
/// Counting starts at today itself, so a day without sessions yet yields 0
/// even if yesterday had some.
pub fn streak(daily: &BTreeMap<NaiveDate, u32>, today: NaiveDate, window_days: u32) -> u32 {
    let mut days = 0;
    for back in 0..window_days {
        let date = today - Duration::days(i64::from(back));
        if daily.get(&date).copied().unwrap_or(0) == 0 {
            break;
        }
        days += 1;
    }
    days
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_pomodoros: u64,
    pub total_minutes: u64,
    pub total_hours: f64,
    pub completed_tasks: u64,
    pub total_tasks: u64,
    pub completion_rate: f64,
    pub register_days: i64,
    pub avg_daily: f64,
}

pub fn overview(
    sessions: &[FocusSession],
    tasks: &[Task],
    user_created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Overview {
    let total_pomodoros = sessions.len() as u64;
    let total_minutes: u64 = sessions.iter().map(|s| u64::from(s.duration_minutes)).sum();
    let total_tasks = tasks.len() as u64;
    let completed_tasks = tasks.iter().filter(|t| t.is_completed()).count() as u64;

    let completion_rate = if total_tasks > 0 {
        round1(completed_tasks as f64 / total_tasks as f64 * 100.0)
    } else {
        0.0
    };
    let elapsed_days = (now - user_created_at).num_milliseconds().div_euclid(86_400_000);
    let register_days = (elapsed_days + 1).max(1);

    Overview {
        total_pomodoros,
        total_minutes,
        total_hours: round1(total_minutes as f64 / 60.0),
        completed_tasks,
        total_tasks,
        completion_rate,
        register_days,
        avg_daily: round1(total_pomodoros as f64 / register_days as f64),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub pending: u64,
    pub in_progress: u64,
    pub completed: u64,
}

impl StatusCounts {
    fn add(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::InProgress => self.in_progress += 1,
            TaskStatus::Completed => self.completed += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.pending + self.in_progress + self.completed
    }
}

/// Status distribution for each priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityBreakdown {
    pub high: StatusCounts,
    pub medium: StatusCounts,
    pub low: StatusCounts,
}

impl PriorityBreakdown {
    pub fn get(&self, priority: Priority) -> &StatusCounts {
        match priority {
            Priority::High => &self.high,
            Priority::Medium => &self.medium,
            Priority::Low => &self.low,
        }
    }

    fn get_mut(&mut self, priority: Priority) -> &mut StatusCounts {
        match priority {
            Priority::High => &mut self.high,
            Priority::Medium => &mut self.medium,
            Priority::Low => &mut self.low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAnalysis {
    pub priority_stats: PriorityBreakdown,
    pub status_stats: StatusCounts,
    /// Mean completed pomodoros over tasks with at least one.
    pub avg_pomodoros_per_task: f64,
    pub independent_pomodoros: u64,
    pub total_tasks: u64,
}

pub fn task_analysis(tasks: &[Task], sessions: &[FocusSession]) -> TaskAnalysis {
    let mut priority_stats = PriorityBreakdown::default();
    let mut status_stats = StatusCounts::default();
    for task in tasks {
        priority_stats.get_mut(task.priority).add(task.status);
        status_stats.add(task.status);
    }

    let worked: Vec<u32> = tasks
        .iter()
        .map(|t| t.pomodoro_completed)
        .filter(|&n| n > 0)
        .collect();
    let avg_pomodoros_per_task = if worked.is_empty() {
        0.0
    } else {
        let sum: u64 = worked.iter().map(|&n| u64::from(n)).sum();
        round1(sum as f64 / worked.len() as f64)
    };

    TaskAnalysis {
        priority_stats,
        status_stats,
        avg_pomodoros_per_task,
        independent_pomodoros: sessions.iter().filter(|s| s.is_independent()).count() as u64,
        total_tasks: tasks.len() as u64,
    }
}
