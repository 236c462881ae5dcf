use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::aggregate::{
    bucket_by, overview, task_analysis, Bucket, Granularity, Overview, TaskAnalysis,
    STREAK_WINDOW_DAYS,
};
use super::views::{today_summary, week_view, TodaySummary, WeekView};
use crate::clock::day_bounds;
use crate::error::{Result, ValidationError};
use crate::identity::SessionContext;
use crate::profile::ProfileRepo;
use crate::session::{FocusSession, SessionLog};
use crate::task::{Task, TaskListFilter, TaskRepo};
use crate::storage::RecordStore;

/// A statistics request as accepted by the batch entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StatsRequest {
    Overview,
    Daily { start: NaiveDate, end: NaiveDate },
    Weekly { start: NaiveDate, end: NaiveDate },
    Monthly { start: NaiveDate, end: NaiveDate },
    TaskAnalysis,
    Week,
    Today,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum StatsReport {
    Overview(Overview),
    Buckets(Vec<Bucket>),
    TaskAnalysis(TaskAnalysis),
    Week(WeekView),
    Today(TodaySummary),
}

/// Reads owner-scoped records and hands them to the pure aggregators.
pub struct StatsService<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    ctx: &'a SessionContext,
}

impl<'a, S: RecordStore + ?Sized> StatsService<'a, S> {
    pub fn new(store: &'a S, ctx: &'a SessionContext) -> Self {
        Self { store, ctx }
    }

    fn sessions(&self) -> SessionLog<'a, S> {
        SessionLog::new(self.store, self.ctx)
    }

    fn all_tasks(&self) -> Result<Vec<Task>> {
        TaskRepo::new(self.store, self.ctx).list(&TaskListFilter::default())
    }

    fn sessions_in(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<FocusSession>> {
        if start > end {
            return Err(ValidationError::InvalidValue {
                field: "start".into(),
                message: format!("{start} is after {end}"),
            }
            .into());
        }
        let (from, _) = day_bounds(start, self.ctx.offset());
        let (_, to) = day_bounds(end, self.ctx.offset());
        self.sessions().completed_between(from, to)
    }

    pub fn overview(&self) -> Result<Overview> {
        let now = self.ctx.now();
        let registered = ProfileRepo::new(self.store, self.ctx.owner_id())
            .find()?
            .map(|p| p.created_at)
            .unwrap_or(now);
        let sessions = self.sessions().all_completed()?;
        let tasks = self.all_tasks()?;
        Ok(overview(&sessions, &tasks, registered, now))
    }

    pub fn buckets(
        &self,
        granularity: Granularity,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bucket>> {
        let sessions = self.sessions_in(start, end)?;
        Ok(bucket_by(&sessions, granularity, self.ctx.offset()))
    }

    pub fn daily(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bucket>> {
        self.buckets(Granularity::Day, start, end)
    }

    pub fn weekly(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bucket>> {
        self.buckets(Granularity::Week, start, end)
    }

    pub fn monthly(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bucket>> {
        self.buckets(Granularity::Month, start, end)
    }

    pub fn task_analysis(&self) -> Result<TaskAnalysis> {
        let tasks = self.all_tasks()?;
        let sessions = self.sessions().all_completed()?;
        Ok(task_analysis(&tasks, &sessions))
    }

    /// Seven-day chart plus streak, reading just enough history for both.
    pub fn week(&self) -> Result<WeekView> {
        let today = self.ctx.today();
        let first = today - Duration::days(i64::from(STREAK_WINDOW_DAYS) - 1);
        let sessions = self.sessions_in(first, today)?;
        let tasks = self.all_tasks()?;
        Ok(week_view(&sessions, &tasks, today, self.ctx.offset()))
    }

    pub fn today(&self) -> Result<TodaySummary> {
        let sessions = self.sessions().today()?;
        let tasks = self.all_tasks()?;
        Ok(today_summary(
            &sessions,
            &tasks,
            self.ctx.today(),
            self.ctx.offset(),
        ))
    }

    pub fn run(&self, request: &StatsRequest) -> Result<StatsReport> {
        tracing::debug!(?request, "computing statistics");
        Ok(match *request {
            StatsRequest::Overview => StatsReport::Overview(self.overview()?),
            StatsRequest::Daily { start, end } => StatsReport::Buckets(self.daily(start, end)?),
            StatsRequest::Weekly { start, end } => StatsReport::Buckets(self.weekly(start, end)?),
            StatsRequest::Monthly { start, end } => {
                StatsReport::Buckets(self.monthly(start, end)?)
            }
            StatsRequest::TaskAnalysis => StatsReport::TaskAnalysis(self.task_analysis()?),
            StatsRequest::Week => StatsReport::Week(self.week()?),
            StatsRequest::Today => StatsReport::Today(self.today()?),
        })
    }
}
