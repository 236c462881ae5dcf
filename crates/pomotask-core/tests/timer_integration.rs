//! Integration tests for the focus timer.
//!
//! Covers the countdown, pause/resume and recovery properties of the engine,
//! and the full start-to-session workflow against an on-disk database.

use std::sync::Arc;

use chrono::{Offset, TimeZone, Utc};
use pomotask_core::timer::{load_state, BreakKind, TickOutcome};
use pomotask_core::{
    Database, Event, FocusTimer, ManualClock, NewTask, SessionContext, SessionFilter, SessionLog,
    TaskRepo, TimerEngine, TimerPhase, UserSettings,
};
use proptest::prelude::*;

const T0: i64 = 1_717_999_200_000;

fn run_ticks(engine: &mut TimerEngine, now: &mut i64, n: u32) -> Option<TickOutcome> {
    let mut last = None;
    for _ in 0..n {
        *now += 1000;
        last = engine.tick(*now);
    }
    last
}

proptest! {
    #[test]
    fn countdown_completes_on_the_last_tick(minutes in 1u32..=5) {
        let mut engine = TimerEngine::new();
        let mut now = T0;
        engine.start(minutes, None, now).unwrap();

        let total = minutes * 60;
        prop_assert!(run_ticks(&mut engine, &mut now, total - 1).is_none());
        prop_assert_eq!(engine.remaining_secs(), 1);
        prop_assert_eq!(engine.phase(), TimerPhase::Running);

        let Some(TickOutcome::Completed(completion)) = engine.tick(now + 1000) else {
            return Err(TestCaseError::fail("expected a completion"));
        };
        prop_assert_eq!(completion.duration_minutes(), minutes);
        prop_assert_eq!(engine.phase(), TimerPhase::Completing);
        // A completing engine ignores further ticks.
        prop_assert!(engine.tick(now + 2000).is_none());
    }

    #[test]
    fn pause_resume_preserves_remaining(
        minutes in 1u32..=10,
        ticked in 0u32..59,
        paused_for_secs in 0i64..7200,
    ) {
        let mut engine = TimerEngine::new();
        let mut now = T0;
        engine.start(minutes, None, now).unwrap();
        run_ticks(&mut engine, &mut now, ticked);

        let before = engine.remaining_secs();
        engine.pause().unwrap();
        now += paused_for_secs * 1000;
        engine.resume(now).unwrap();
        prop_assert_eq!(engine.remaining_secs(), before);

        // The next tick counts down by exactly one second.
        prop_assert!(engine.tick(now + 1000).is_none());
        prop_assert_eq!(engine.remaining_secs(), before - 1);
    }

    #[test]
    fn recovery_after_expiry_completes_at_recovery_time(
        minutes in 1u32..=60,
        overshoot_secs in 0i64..86_400,
    ) {
        let mut engine = TimerEngine::new();
        engine.start(minutes, Some("t1".into()), T0).unwrap();
        let state = engine.to_persisted().unwrap();

        let recovered_at = T0 + (i64::from(minutes) * 60 + overshoot_secs) * 1000;
        let (engine, outcome) = TimerEngine::restore(&state, recovered_at);
        let Some(TickOutcome::Completed(completion)) = outcome else {
            return Err(TestCaseError::fail("expected a completion"));
        };
        prop_assert!(completion.recovered);
        prop_assert_eq!(completion.started_at_ms, T0);
        prop_assert_eq!(completion.ended_at_ms, recovered_at);
        prop_assert_eq!(completion.bound_task_id.as_deref(), Some("t1"));
        let expected = ((recovered_at - T0) as f64 / 60_000.0).round() as u32;
        prop_assert_eq!(completion.duration_minutes(), expected);
        prop_assert_eq!(engine.phase(), TimerPhase::Completing);
    }

    #[test]
    fn recovery_before_expiry_keeps_running(minutes in 1u32..=60, elapsed_frac in 0.0f64..0.99) {
        let mut engine = TimerEngine::new();
        engine.start(minutes, None, T0).unwrap();
        let state = engine.to_persisted().unwrap();

        let total = minutes * 60;
        let elapsed = (f64::from(total) * elapsed_frac) as u32;
        let (engine, outcome) = TimerEngine::restore(&state, T0 + i64::from(elapsed) * 1000);
        prop_assert!(outcome.is_none());
        prop_assert_eq!(engine.phase(), TimerPhase::Running);
        prop_assert_eq!(engine.remaining_secs(), total - elapsed);
    }

    #[test]
    fn abandon_always_returns_to_idle(minutes in 1u32..=5, ticked in 0u32..299, pause in any::<bool>()) {
        let mut engine = TimerEngine::new();
        let mut now = T0;
        engine.start(minutes, None, now).unwrap();
        let ticked = ticked.min(minutes * 60 - 1);
        run_ticks(&mut engine, &mut now, ticked);
        if pause {
            engine.pause().unwrap();
        }
        engine.abandon().unwrap();
        prop_assert_eq!(engine.phase(), TimerPhase::Idle);
        prop_assert!(engine.to_persisted().is_none());
        prop_assert!(engine.tick(now + 3_600_000).is_none());
    }
}

fn context(clock: &ManualClock) -> SessionContext {
    SessionContext::new(
        "owner-1",
        UserSettings::default(),
        Arc::new(clock.clone()),
        Utc.fix(),
    )
}

#[test]
fn test_full_pomodoro_workflow_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Database::open_at(dir.path().join("pomotask.db")).unwrap());
    let clock = ManualClock::at(Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap());
    let ctx = context(&clock);

    let task = TaskRepo::new(db.as_ref(), &ctx)
        .create(&NewTask::titled("Write report"))
        .unwrap();

    let mut timer = FocusTimer::new(ctx.clone(), db.clone());
    timer.start(None, Some(task.id.clone())).unwrap();
    assert!(load_state(db.as_ref()).is_some());

    let mut events = Vec::new();
    for _ in 0..25 * 60 {
        clock.advance_secs(1);
        events.extend(timer.tick().unwrap());
    }

    let completed: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::PomodoroCompleted { session, .. } => Some(session),
            _ => None,
        })
        .collect();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].duration_minutes, 25);
    assert_eq!(completed[0].task_title_snapshot, "Write report");
    let offer = load_state(db.as_ref()).unwrap();
    assert_eq!(offer.phase, TimerPhase::Idle);
    assert_eq!(offer.break_kind, Some(BreakKind::Short));

    let task = TaskRepo::new(db.as_ref(), &ctx).get(&task.id).unwrap();
    assert_eq!(task.pomodoro_completed, 1);

    let sessions = SessionLog::new(db.as_ref(), &ctx)
        .list(&SessionFilter::default())
        .unwrap();
    assert_eq!(sessions.len(), 1);
}

#[test]
fn test_recovery_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pomotask.db");
    let clock = ManualClock::at(Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap());

    {
        let db = Arc::new(Database::open_at(&path).unwrap());
        let mut timer = FocusTimer::new(context(&clock), db);
        timer.start(Some(25), None).unwrap();
    }

    // The process was suspended for 40 minutes.
    clock.advance_secs(40 * 60);
    let db = Arc::new(Database::open_at(&path).unwrap());
    let (timer, events) = FocusTimer::recover(context(&clock), db.clone());

    let session = events
        .iter()
        .find_map(|e| match e {
            Event::PomodoroCompleted { session, recovered, .. } => {
                assert!(*recovered);
                Some(session.clone())
            }
            _ => None,
        })
        .expect("recovered completion");
    assert_eq!(session.duration_minutes, 40);
    assert_eq!(timer.phase(), TimerPhase::Idle);
    assert!(timer.snapshot().break_ready);
    drop(timer);

    // Reopening again offers the same break instead of recording twice.
    let db = Arc::new(Database::open_at(&path).unwrap());
    let (mut timer, events) = FocusTimer::recover(context(&clock), db.clone());
    assert!(!events.iter().any(|e| matches!(e, Event::PomodoroCompleted { .. })));
    timer.start_break(None).unwrap();
    assert_eq!(timer.phase(), TimerPhase::Break);
    assert_eq!(SessionLog::new(db.as_ref(), &context(&clock)).all_completed().unwrap().len(), 1);
}

#[test]
fn test_long_break_after_fourth_pomodoro() {
    let db = Arc::new(Database::open_memory().unwrap());
    let clock = ManualClock::at(Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap());
    let mut timer = FocusTimer::new(context(&clock), db);

    for round in 1..=4 {
        timer.start(Some(1), None).unwrap();
        for _ in 0..60 {
            clock.advance_secs(1);
            timer.tick().unwrap();
        }
        let events = timer.start_break(None).unwrap();
        let Some(Event::BreakStarted { kind, duration_secs, .. }) = events.first() else {
            panic!("expected break start");
        };
        if round == 4 {
            assert_eq!(*duration_secs, 15 * 60);
            assert_eq!(*kind, BreakKind::Long);
        } else {
            assert_eq!(*kind, BreakKind::Short);
            assert_eq!(*duration_secs, 5 * 60);
        }
        timer.skip_break().unwrap();
    }
}
