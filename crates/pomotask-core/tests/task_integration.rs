//! Integration tests for task management and batch maintenance.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Offset, TimeZone, Utc};
use pomotask_core::storage::Collection;
use pomotask_core::task::batch::{COMPLETED_TASK_RETENTION_DAYS, SESSION_RETENTION_DAYS};
use pomotask_core::{
    Clock, CoreError, Database, ManualClock, MemoryStore, NewTask, Priority, SessionContext,
    SessionDraft, SessionFilter, SessionLog, SortOrder, TaskBatch, TaskListFilter,
    TaskOrderField, TaskPatch, TaskRepo, TaskStatus, UserSettings, ValidationError,
};

fn context(owner: &str, clock: &ManualClock) -> SessionContext {
    SessionContext::new(
        owner,
        UserSettings::default(),
        Arc::new(clock.clone()),
        Utc.fix(),
    )
}

fn clock() -> ManualClock {
    ManualClock::at(Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap())
}

#[test]
fn test_empty_title_rejected_before_any_write() {
    let store = MemoryStore::new();
    // Any store write would fail loudly; validation must come first.
    store.fail_writes(true);
    let clock = clock();
    let ctx = context("owner-1", &clock);

    let err = TaskRepo::new(&store, &ctx)
        .create(&NewTask::titled("   "))
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Validation(ValidationError::EmptyTitle)
    ));
    assert_eq!(store.len(Collection::Tasks), 0);
}

#[test]
fn test_task_lifecycle_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_at(dir.path().join("tasks.db")).unwrap();
    let clock = clock();
    let ctx = context("owner-1", &clock);
    let repo = TaskRepo::new(&db, &ctx);

    let task = repo
        .create(&NewTask {
            title: "  Draft chapter  ".into(),
            description: Some("x".repeat(600)),
            tags: (0..12).map(|i| format!("tag{i}")).collect(),
            priority: Some(Priority::High),
            pomodoro_target: Some(6),
            due_date: NaiveDate::from_ymd_opt(2024, 6, 20),
        })
        .unwrap();
    assert_eq!(task.title, "Draft chapter");
    assert_eq!(task.description.chars().count(), 500);
    assert_eq!(task.tags.len(), 10);
    assert_eq!(task.status, TaskStatus::Pending);

    clock.advance_secs(60);
    let updated = repo
        .update(
            &task.id,
            &TaskPatch {
                priority: Some(Priority::Low),
                ..TaskPatch::default()
            },
        )
        .unwrap();
    assert_eq!(updated.priority, Priority::Low);
    assert_eq!(updated.title, "Draft chapter");
    assert!(updated.updated_at > task.updated_at);

    let done = repo.complete(&task.id).unwrap();
    assert!(done.completed_at.is_some());
    let reopened = repo.uncomplete(&task.id, TaskStatus::InProgress).unwrap();
    assert_eq!(reopened.status, TaskStatus::InProgress);
    assert!(reopened.completed_at.is_none());

    // Another user cannot see or delete it.
    let other = context("owner-2", &clock);
    let err = TaskRepo::new(&db, &other).delete(&task.id).unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));

    repo.delete(&task.id).unwrap();
    assert!(repo.find(&task.id).unwrap().is_none());
}

#[test]
fn test_priority_ordering() {
    let store = MemoryStore::new();
    let clock = clock();
    let ctx = context("owner-1", &clock);
    let repo = TaskRepo::new(&store, &ctx);
    for (title, priority) in [
        ("low", Priority::Low),
        ("high", Priority::High),
        ("medium", Priority::Medium),
    ] {
        repo.create(&NewTask {
            priority: Some(priority),
            ..NewTask::titled(title)
        })
        .unwrap();
    }

    let titles = |order| {
        repo.list(&TaskListFilter {
            status: None,
            order_by: TaskOrderField::Priority,
            order,
        })
        .unwrap()
        .into_iter()
        .map(|t| t.title)
        .collect::<Vec<_>>()
    };
    assert_eq!(titles(SortOrder::Asc), ["high", "medium", "low"]);
    assert_eq!(titles(SortOrder::Desc), ["low", "medium", "high"]);
}

#[test]
fn test_batch_operations_and_cleanup() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_at(dir.path().join("batch.db")).unwrap();
    let clock = clock();
    let ctx = context("owner-1", &clock);
    let repo = TaskRepo::new(&db, &ctx);

    let ids: Vec<String> = (0..3)
        .map(|i| repo.create(&NewTask::titled(format!("t{i}"))).unwrap().id)
        .collect();
    let batch = TaskBatch::new(&db, &ctx);

    let err = batch.complete(&[]).unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    assert_eq!(batch.complete(&ids[..2]).unwrap().affected, 2);
    // Already completed tasks are skipped.
    assert_eq!(batch.complete(&ids).unwrap().affected, 1);
    assert_eq!(batch.set_priority(&ids, Priority::High).unwrap().affected, 3);

    let log = SessionLog::new(&db, &ctx);
    let old = clock.now() - Duration::days(SESSION_RETENTION_DAYS + 5);
    log.record(&SessionDraft {
        task_id: Some(ids[0].clone()),
        task_title_snapshot: "t0".into(),
        duration_minutes: 25,
        started_at: old,
        ended_at: old + Duration::minutes(25),
    })
    .unwrap();

    // Nothing is old enough yet.
    assert_eq!(
        batch
            .cleanup_completed_tasks(COMPLETED_TASK_RETENTION_DAYS)
            .unwrap()
            .affected,
        0
    );

    clock.advance_secs((COMPLETED_TASK_RETENTION_DAYS + 1) * 86_400);
    let later = context("owner-1", &clock);
    let batch = TaskBatch::new(&db, &later);
    assert_eq!(
        batch
            .cleanup_completed_tasks(COMPLETED_TASK_RETENTION_DAYS)
            .unwrap()
            .affected,
        3
    );
    assert_eq!(
        batch
            .cleanup_old_sessions(SESSION_RETENTION_DAYS)
            .unwrap()
            .affected,
        1
    );
    assert!(SessionLog::new(&db, &later)
        .list(&SessionFilter::default())
        .unwrap()
        .is_empty());
}
