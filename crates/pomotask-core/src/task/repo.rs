//! Owner-scoped task operations.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    normalize_description, normalize_tags, validate_pomodoro_target, validate_title, NewTask,
    Task, TaskPatch, TaskStatus,
};
use crate::error::{CoreError, Result, ValidationError};
use crate::identity::SessionContext;
use crate::storage::{encode, Collection, Fields, Query, RecordStore, SortOrder};

/// Sortable task fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskOrderField {
    #[default]
    CreatedAt,
    UpdatedAt,
    DueDate,
    Priority,
}

impl TaskOrderField {
    pub fn field_name(&self) -> &'static str {
        match self {
            TaskOrderField::CreatedAt => "createdAt",
            TaskOrderField::UpdatedAt => "updatedAt",
            TaskOrderField::DueDate => "dueDate",
            TaskOrderField::Priority => "priority",
        }
    }
}

/// Listing options. Defaults to newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListFilter {
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub order_by: TaskOrderField,
    #[serde(default)]
    pub order: SortOrder,
}

pub(crate) fn patch_fields<const N: usize>(entries: [(&str, Value); N]) -> Fields {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

pub struct TaskRepo<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    ctx: &'a SessionContext,
}

impl<'a, S: RecordStore + ?Sized> TaskRepo<'a, S> {
    pub fn new(store: &'a S, ctx: &'a SessionContext) -> Self {
        Self { store, ctx }
    }

    pub fn list(&self, filter: &TaskListFilter) -> Result<Vec<Task>> {
        let mut query = Query::new(Collection::Tasks, self.ctx.owner_id());
        if let Some(status) = filter.status {
            query = query.eq("status", status.as_str());
        }
        // Priority is stored as a label; rank it after decoding.
        if filter.order_by != TaskOrderField::Priority {
            query = query.order_by(filter.order_by.field_name(), filter.order);
        }

        let mut tasks = self
            .store
            .query(&query)?
            .iter()
            .map(|doc| doc.decode::<Task>(Collection::Tasks))
            .collect::<Result<Vec<_>, _>>()?;

        if filter.order_by == TaskOrderField::Priority {
            tasks.sort_by_key(|t| t.priority.rank());
            if filter.order == SortOrder::Desc {
                tasks.reverse();
            }
        }
        Ok(tasks)
    }

    /// Fetch a task the caller owns.
    ///
    /// # Errors
    /// [`CoreError::NotFound`] when the task is missing or owned by someone else.
    pub fn get(&self, id: &str) -> Result<Task> {
        let doc = self
            .store
            .get(Collection::Tasks, id)?
            .filter(|doc| doc.owner_id == self.ctx.owner_id())
            .ok_or_else(|| CoreError::not_found(Collection::Tasks.as_str(), id))?;
        Ok(doc.decode(Collection::Tasks)?)
    }

    /// Like [`get`](Self::get) but maps a missing task to `None`.
    pub fn find(&self, id: &str) -> Result<Option<Task>> {
        match self.get(id) {
            Ok(task) => Ok(Some(task)),
            Err(CoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn create(&self, input: &NewTask) -> Result<Task> {
        let title = validate_title(&input.title)?;
        let pomodoro_target = validate_pomodoro_target(input.pomodoro_target.unwrap_or(1))?;
        let now = self.ctx.now();

        let mut task = Task {
            id: String::new(),
            owner_id: self.ctx.owner_id().to_string(),
            title,
            description: normalize_description(input.description.as_deref().unwrap_or_default()),
            tags: normalize_tags(&input.tags),
            priority: input.priority.unwrap_or_default(),
            status: TaskStatus::Pending,
            pomodoro_target,
            pomodoro_completed: 0,
            due_date: input.due_date,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        task.id = self
            .store
            .create(Collection::Tasks, self.ctx.owner_id(), encode(&task)?)?;
        tracing::info!(task_id = %task.id, "task created");
        Ok(task)
    }

    pub fn update(&self, id: &str, patch: &TaskPatch) -> Result<Task> {
        let title = patch.title.as_deref().map(validate_title).transpose()?;
        let target = patch
            .pomodoro_target
            .map(validate_pomodoro_target)
            .transpose()?;

        let mut task = self.get(id)?;
        let now = self.ctx.now();
        let mut fields = Fields::new();

        if let Some(title) = title {
            task.title = title;
            fields.insert("title".into(), Value::String(task.title.clone()));
        }
        if let Some(description) = &patch.description {
            task.description = normalize_description(description);
            fields.insert("description".into(), Value::String(task.description.clone()));
        }
        if let Some(tags) = &patch.tags {
            task.tags = normalize_tags(tags);
            fields.insert("tags".into(), serde_json::to_value(&task.tags)?);
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
            fields.insert("priority".into(), serde_json::to_value(priority)?);
        }
        if let Some(target) = target {
            task.pomodoro_target = target;
            fields.insert("pomodoroTarget".into(), Value::from(target));
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = due_date;
            fields.insert("dueDate".into(), serde_json::to_value(due_date)?);
        }
        task.updated_at = now;
        fields.insert("updatedAt".into(), serde_json::to_value(now)?);

        self.store.update(Collection::Tasks, id, fields)?;
        Ok(task)
    }

    /// Delete a task after checking ownership. Sessions bound to it are kept.
    pub fn delete(&self, id: &str) -> Result<()> {
        self.get(id)?;
        self.store.delete(Collection::Tasks, id)?;
        tracing::info!(task_id = id, "task deleted");
        Ok(())
    }

    pub fn complete(&self, id: &str) -> Result<Task> {
        let mut task = self.get(id)?;
        let now = self.ctx.now();
        task.status = TaskStatus::Completed;
        task.completed_at = Some(now);
        task.updated_at = now;
        self.store.update(
            Collection::Tasks,
            id,
            patch_fields([
                ("status", serde_json::to_value(task.status)?),
                ("completedAt", serde_json::to_value(now)?),
                ("updatedAt", serde_json::to_value(now)?),
            ]),
        )?;
        Ok(task)
    }

    /// Reopen a completed task with `restore` as its new status.
    pub fn uncomplete(&self, id: &str, restore: TaskStatus) -> Result<Task> {
        if restore == TaskStatus::Completed {
            return Err(ValidationError::InvalidStatus(restore.to_string()).into());
        }
        let mut task = self.get(id)?;
        let now = self.ctx.now();
        task.status = restore;
        task.completed_at = None;
        task.updated_at = now;
        self.store.update(
            Collection::Tasks,
            id,
            patch_fields([
                ("status", serde_json::to_value(restore)?),
                ("completedAt", Value::Null),
                ("updatedAt", serde_json::to_value(now)?),
            ]),
        )?;
        Ok(task)
    }

    /// Move a pending task to `in_progress`. Other statuses are left alone.
    pub fn start_progress(&self, id: &str) -> Result<Task> {
        let mut task = self.get(id)?;
        if task.status != TaskStatus::Pending {
            return Ok(task);
        }
        let now = self.ctx.now();
        task.status = TaskStatus::InProgress;
        task.updated_at = now;
        self.store.update(
            Collection::Tasks,
            id,
            patch_fields([
                ("status", serde_json::to_value(task.status)?),
                ("updatedAt", serde_json::to_value(now)?),
            ]),
        )?;
        tracing::debug!(task_id = id, "task moved to in_progress");
        Ok(task)
    }

    /// Count one completed pomodoro against the task, in a single update.
    pub fn increment_pomodoro(&self, id: &str) -> Result<Task> {
        let mut task = self.get(id)?;
        let now = self.ctx.now();
        task.pomodoro_completed = task.pomodoro_completed.saturating_add(1);
        task.updated_at = now;
        self.store.update(
            Collection::Tasks,
            id,
            patch_fields([
                ("pomodoroCompleted", Value::from(task.pomodoro_completed)),
                ("updatedAt", serde_json::to_value(now)?),
            ]),
        )?;
        Ok(task)
    }
}
