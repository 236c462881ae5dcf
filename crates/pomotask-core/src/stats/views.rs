//! Client-facing summaries built on top of [`aggregate`](super::aggregate).

use chrono::{Duration, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use super::aggregate::{daily_counts, round1, streak, STREAK_WINDOW_DAYS};
use crate::clock::local_date;
use crate::session::FocusSession;
use crate::task::Task;

/// Days shown in the week chart.
pub const WEEK_CHART_DAYS: u32 = 7;

/// One bar of the week chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayBar {
    pub date: NaiveDate,
    /// `today` for the current day, `MM-DD` otherwise.
    pub label: String,
    pub count: u32,
    /// Bar height as a percentage of the busiest day in the chart.
    pub height_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekView {
    /// Oldest day first, today last.
    pub days: Vec<DayBar>,
    pub total: u32,
    /// Focus minutes over the chart's days.
    pub total_minutes: u32,
    /// Tasks whose completion falls on one of the chart's days.
    pub completed_tasks: u32,
    pub avg_daily: f64,
    pub max_daily: u32,
    pub streak_days: u32,
}

/// Build the seven-day chart ending at `today`.
///
/// `sessions` may span more than a week; older ones only feed the streak.
pub fn week_view(
    sessions: &[FocusSession],
    tasks: &[Task],
    today: NaiveDate,
    offset: FixedOffset,
) -> WeekView {
    let daily = daily_counts(sessions, offset);
    let first = today - Duration::days(i64::from(WEEK_CHART_DAYS) - 1);
    let in_chart = |date: NaiveDate| (first..=today).contains(&date);

    let dates: Vec<NaiveDate> = (0..WEEK_CHART_DAYS)
        .rev()
        .map(|back| today - Duration::days(i64::from(back)))
        .collect();
    let counts: Vec<u32> = dates
        .iter()
        .map(|d| daily.get(d).copied().unwrap_or(0))
        .collect();

    let max_daily = counts.iter().copied().max().unwrap_or(0);
    let scale = f64::from(max_daily.max(1));
    let days = dates
        .iter()
        .zip(&counts)
        .map(|(&date, &count)| DayBar {
            date,
            label: if date == today {
                "today".to_string()
            } else {
                date.format("%m-%d").to_string()
            },
            count,
            height_pct: f64::from(count) / scale * 100.0,
        })
        .collect();

    let total: u32 = counts.iter().sum();
    let total_minutes = sessions
        .iter()
        .filter(|s| in_chart(local_date(s.started_at, offset)))
        .map(|s| s.duration_minutes)
        .sum();
    let completed_tasks = tasks
        .iter()
        .filter_map(|t| t.completed_at)
        .filter(|&at| in_chart(local_date(at, offset)))
        .count() as u32;
    let active = counts.iter().filter(|&&c| c > 0).count();
    let avg_daily = if active == 0 {
        0.0
    } else {
        round1(f64::from(total) / active as f64)
    };

    WeekView {
        days,
        total,
        total_minutes,
        completed_tasks,
        avg_daily,
        max_daily,
        streak_days: streak(&daily, today, STREAK_WINDOW_DAYS),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodaySummary {
    pub date: NaiveDate,
    pub pomodoros: u32,
    pub focus_minutes: u32,
    pub tasks_completed: u32,
}

pub fn today_summary(
    sessions: &[FocusSession],
    tasks: &[Task],
    today: NaiveDate,
    offset: FixedOffset,
) -> TodaySummary {
    let todays: Vec<&FocusSession> = sessions
        .iter()
        .filter(|s| local_date(s.started_at, offset) == today)
        .collect();
    let tasks_completed = tasks
        .iter()
        .filter_map(|t| t.completed_at)
        .filter(|&at| local_date(at, offset) == today)
        .count() as u32;

    TodaySummary {
        date: today,
        pomodoros: todays.len() as u32,
        focus_minutes: todays.iter().map(|s| s.duration_minutes).sum(),
        tasks_completed,
    }
}
