use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{FocusSession, SessionDraft};
use crate::clock::{day_bounds, local_date};
use crate::error::{CoreError, Result};
use crate::identity::SessionContext;
use crate::storage::{encode, Collection, Fields, Query, RecordStore, SortOrder};

/// History filter. Both range bounds are inclusive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub task_id: Option<String>,
}

/// Owner-scoped access to focus sessions.
pub struct SessionLog<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    ctx: &'a SessionContext,
}

impl<'a, S: RecordStore + ?Sized> SessionLog<'a, S> {
    pub fn new(store: &'a S, ctx: &'a SessionContext) -> Self {
        Self { store, ctx }
    }

    fn base(&self) -> Query {
        Query::new(Collection::FocusSessions, self.ctx.owner_id())
    }

    fn decode_all(&self, query: &Query) -> Result<Vec<FocusSession>> {
        self.store
            .query(query)?
            .iter()
            .map(|doc| doc.decode(Collection::FocusSessions).map_err(CoreError::from))
            .collect()
    }

    /// Write a completed session.
    pub fn record(&self, draft: &SessionDraft) -> Result<FocusSession> {
        let mut session = FocusSession {
            id: String::new(),
            owner_id: self.ctx.owner_id().to_string(),
            task_id: draft.task_id.clone(),
            task_title_snapshot: draft.task_title_snapshot.clone(),
            duration_minutes: draft.duration_minutes,
            started_at: draft.started_at,
            ended_at: draft.ended_at,
            completed: true,
            note: String::new(),
        };
        session.id = self.store.create(
            Collection::FocusSessions,
            self.ctx.owner_id(),
            encode(&session)?,
        )?;
        tracing::info!(
            session_id = %session.id,
            duration_minutes = session.duration_minutes,
            "focus session recorded"
        );
        Ok(session)
    }

    /// Sessions matching `filter`, newest first.
    pub fn list(&self, filter: &SessionFilter) -> Result<Vec<FocusSession>> {
        let mut query = self.base().order_by("startedAt", SortOrder::Desc);
        if filter.start.is_some() || filter.end.is_some() {
            query = query.between(
                "startedAt",
                filter.start.unwrap_or(DateTime::<Utc>::MIN_UTC),
                filter.end.unwrap_or(DateTime::<Utc>::MAX_UTC),
            );
        }
        if let Some(task_id) = &filter.task_id {
            query = query.eq("taskId", task_id.as_str());
        }
        self.decode_all(&query)
    }

    /// Completed sessions started within `[start, end]`, oldest first.
    pub fn completed_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FocusSession>> {
        let query = self
            .base()
            .eq("completed", true)
            .between("startedAt", start, end)
            .order_by("startedAt", SortOrder::Asc);
        self.decode_all(&query)
    }

    /// Every completed session, oldest first.
    pub fn all_completed(&self) -> Result<Vec<FocusSession>> {
        let query = self
            .base()
            .eq("completed", true)
            .order_by("startedAt", SortOrder::Asc);
        self.decode_all(&query)
    }

    /// Completed sessions started today in the display timezone.
    pub fn today(&self) -> Result<Vec<FocusSession>> {
        let (start, end) = day_bounds(self.ctx.today(), self.ctx.offset());
        self.completed_between(start, end)
    }

    pub fn count_today(&self) -> Result<u64> {
        let (start, end) = day_bounds(self.ctx.today(), self.ctx.offset());
        let query = self
            .base()
            .eq("completed", true)
            .between("startedAt", start, end);
        Ok(self.store.count(&query)?)
    }

    /// Completed sessions that ended on the local day of `at`, up to and
    /// including `at`.
    pub fn count_ended_through(&self, at: DateTime<Utc>) -> Result<u64> {
        let (day_start, _) = day_bounds(local_date(at, self.ctx.offset()), self.ctx.offset());
        let query = self
            .base()
            .eq("completed", true)
            .between("endedAt", day_start, at);
        Ok(self.store.count(&query)?)
    }

    fn owned(&self, id: &str) -> Result<FocusSession> {
        let doc = self
            .store
            .get(Collection::FocusSessions, id)?
            .filter(|doc| doc.owner_id == self.ctx.owner_id())
            .ok_or_else(|| CoreError::not_found(Collection::FocusSessions.as_str(), id))?;
        Ok(doc.decode(Collection::FocusSessions)?)
    }

    pub fn get(&self, id: &str) -> Result<FocusSession> {
        self.owned(id)
    }

    pub fn set_note(&self, id: &str, note: &str) -> Result<FocusSession> {
        let mut session = self.owned(id)?;
        session.note = note.trim().to_string();
        let mut fields = Fields::new();
        fields.insert("note".into(), Value::String(session.note.clone()));
        self.store.update(Collection::FocusSessions, id, fields)?;
        Ok(session)
    }

    pub fn set_title_snapshot(&self, id: &str, title: &str) -> Result<FocusSession> {
        let mut session = self.owned(id)?;
        session.task_title_snapshot = title.trim().to_string();
        let mut fields = Fields::new();
        fields.insert(
            "taskTitleSnapshot".into(),
            Value::String(session.task_title_snapshot.clone()),
        );
        self.store.update(Collection::FocusSessions, id, fields)?;
        Ok(session)
    }
}
