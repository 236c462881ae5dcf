//! Bulk task and session maintenance.
//!
//! Every operation resolves the caller's own records first (`id IN ids AND
//! ownerId == caller`) and only touches those.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::repo::patch_fields;
use super::{Priority, TaskStatus};
use crate::error::{CoreError, Result, ValidationError};
use crate::identity::SessionContext;
use crate::storage::{Collection, Document, Query, RecordStore};

pub const COMPLETED_TASK_RETENTION_DAYS: i64 = 30;
pub const SESSION_RETENTION_DAYS: i64 = 90;

/// Number of records an operation changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub affected: usize,
}

pub struct TaskBatch<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    ctx: &'a SessionContext,
}

impl<'a, S: RecordStore + ?Sized> TaskBatch<'a, S> {
    pub fn new(store: &'a S, ctx: &'a SessionContext) -> Self {
        Self { store, ctx }
    }

    fn owned(&self, ids: &[String], query: Query) -> Result<Vec<Document>> {
        if ids.is_empty() {
            return Err(ValidationError::EmptyCollection("task ids".into()).into());
        }
        let docs = self.store.query(&query.one_of("id", ids.iter().cloned()))?;
        if docs.is_empty() {
            return Err(CoreError::not_found(Collection::Tasks.as_str(), ids.join(",")));
        }
        Ok(docs)
    }

    fn tasks_query(&self) -> Query {
        Query::new(Collection::Tasks, self.ctx.owner_id())
    }

    pub fn delete(&self, ids: &[String]) -> Result<BatchOutcome> {
        let docs = self.owned(ids, self.tasks_query())?;
        for doc in &docs {
            self.store.delete(Collection::Tasks, &doc.id)?;
        }
        tracing::info!(count = docs.len(), "batch deleted tasks");
        Ok(BatchOutcome {
            affected: docs.len(),
        })
    }

    /// Complete every listed task that is not already completed.
    pub fn complete(&self, ids: &[String]) -> Result<BatchOutcome> {
        let query = self
            .tasks_query()
            .ne("status", TaskStatus::Completed.as_str());
        let docs = self.owned(ids, query)?;
        let now = serde_json::to_value(self.ctx.now())?;
        for doc in &docs {
            self.store.update(
                Collection::Tasks,
                &doc.id,
                patch_fields([
                    ("status", Value::from(TaskStatus::Completed.as_str())),
                    ("completedAt", now.clone()),
                    ("updatedAt", now.clone()),
                ]),
            )?;
        }
        Ok(BatchOutcome {
            affected: docs.len(),
        })
    }

    pub fn set_priority(&self, ids: &[String], priority: Priority) -> Result<BatchOutcome> {
        let docs = self.owned(ids, self.tasks_query())?;
        let now = serde_json::to_value(self.ctx.now())?;
        for doc in &docs {
            self.store.update(
                Collection::Tasks,
                &doc.id,
                patch_fields([
                    ("priority", Value::from(priority.as_str())),
                    ("updatedAt", now.clone()),
                ]),
            )?;
        }
        Ok(BatchOutcome {
            affected: docs.len(),
        })
    }

    /// Set the status of every listed task, setting or clearing `completedAt`
    /// to match.
    pub fn set_status(&self, ids: &[String], status: TaskStatus) -> Result<BatchOutcome> {
        let docs = self.owned(ids, self.tasks_query())?;
        let now = serde_json::to_value(self.ctx.now())?;
        let completed_at = if status == TaskStatus::Completed {
            now.clone()
        } else {
            Value::Null
        };
        for doc in &docs {
            self.store.update(
                Collection::Tasks,
                &doc.id,
                patch_fields([
                    ("status", Value::from(status.as_str())),
                    ("completedAt", completed_at.clone()),
                    ("updatedAt", now.clone()),
                ]),
            )?;
        }
        Ok(BatchOutcome {
            affected: docs.len(),
        })
    }

    /// Delete tasks completed more than `days_to_keep` days ago.
    pub fn cleanup_completed_tasks(&self, days_to_keep: i64) -> Result<BatchOutcome> {
        let cutoff = self.ctx.now() - Duration::days(days_to_keep);
        let query = self
            .tasks_query()
            .eq("status", TaskStatus::Completed.as_str())
            .before("completedAt", cutoff);
        let docs = self.store.query(&query)?;
        for doc in &docs {
            self.store.delete(Collection::Tasks, &doc.id)?;
        }
        tracing::info!(count = docs.len(), days_to_keep, "cleaned up completed tasks");
        Ok(BatchOutcome {
            affected: docs.len(),
        })
    }

    /// Delete focus sessions started more than `days_to_keep` days ago.
    pub fn cleanup_old_sessions(&self, days_to_keep: i64) -> Result<BatchOutcome> {
        let cutoff = self.ctx.now() - Duration::days(days_to_keep);
        let query = Query::new(Collection::FocusSessions, self.ctx.owner_id())
            .before("startedAt", cutoff);
        let docs = self.store.query(&query)?;
        for doc in &docs {
            self.store.delete(Collection::FocusSessions, &doc.id)?;
        }
        tracing::info!(count = docs.len(), days_to_keep, "cleaned up old sessions");
        Ok(BatchOutcome {
            affected: docs.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::settings::UserSettings;
    use crate::storage::MemoryStore;
    use crate::task::{NewTask, TaskRepo};
    use chrono::{Offset, TimeZone, Utc};
    use std::sync::Arc;

    fn setup(owner: &str, clock: &ManualClock) -> SessionContext {
        SessionContext::new(
            owner,
            UserSettings::default(),
            Arc::new(clock.clone()),
            Utc.fix(),
        )
    }

    #[test]
    fn empty_id_list_is_rejected() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(0);
        let ctx = setup("u1", &clock);
        let err = TaskBatch::new(&store, &ctx).delete(&[]).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::EmptyCollection(_))
        ));
    }

    #[test]
    fn batch_only_touches_own_tasks() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(0);
        let mine = setup("u1", &clock);
        let theirs = setup("u2", &clock);
        let a = TaskRepo::new(&store, &mine).create(&NewTask::titled("a")).unwrap();
        let b = TaskRepo::new(&store, &theirs).create(&NewTask::titled("b")).unwrap();

        let outcome = TaskBatch::new(&store, &mine)
            .delete(&[a.id.clone(), b.id.clone()])
            .unwrap();
        assert_eq!(outcome.affected, 1);
        assert!(TaskRepo::new(&store, &theirs).get(&b.id).is_ok());
    }

    #[test]
    fn complete_skips_already_completed() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(0);
        let ctx = setup("u1", &clock);
        let repo = TaskRepo::new(&store, &ctx);
        let a = repo.create(&NewTask::titled("a")).unwrap();
        let b = repo.create(&NewTask::titled("b")).unwrap();
        repo.complete(&a.id).unwrap();

        let outcome = TaskBatch::new(&store, &ctx)
            .complete(&[a.id.clone(), b.id.clone()])
            .unwrap();
        assert_eq!(outcome.affected, 1);
        assert!(repo.get(&b.id).unwrap().completed_at.is_some());
    }

    #[test]
    fn set_status_clears_completed_at() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(0);
        let ctx = setup("u1", &clock);
        let repo = TaskRepo::new(&store, &ctx);
        let a = repo.create(&NewTask::titled("a")).unwrap();
        let batch = TaskBatch::new(&store, &ctx);

        batch.set_status(&[a.id.clone()], TaskStatus::Completed).unwrap();
        assert!(repo.get(&a.id).unwrap().completed_at.is_some());
        batch.set_status(&[a.id.clone()], TaskStatus::Pending).unwrap();
        assert!(repo.get(&a.id).unwrap().completed_at.is_none());

        batch.set_priority(&[a.id.clone()], Priority::Low).unwrap();
        assert_eq!(repo.get(&a.id).unwrap().priority, Priority::Low);
    }

    #[test]
    fn cleanup_respects_retention_window() {
        let store = MemoryStore::new();
        let clock = ManualClock::at(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
        let ctx = setup("u1", &clock);
        let repo = TaskRepo::new(&store, &ctx);
        let old = repo.create(&NewTask::titled("old")).unwrap();
        repo.complete(&old.id).unwrap();

        clock.advance_secs(20 * 86_400);
        let recent = repo.create(&NewTask::titled("recent")).unwrap();
        repo.complete(&recent.id).unwrap();
        repo.create(&NewTask::titled("open")).unwrap();

        clock.advance_secs(15 * 86_400);
        let outcome = TaskBatch::new(&store, &ctx)
            .cleanup_completed_tasks(COMPLETED_TASK_RETENTION_DAYS)
            .unwrap();
        assert_eq!(outcome.affected, 1);
        assert!(repo.find(&old.id).unwrap().is_none());
        assert!(repo.find(&recent.id).unwrap().is_some());
    }
}
