//! The focus timer: the engine wired to the record store.
//!
//! [`FocusTimer`] owns a [`TimerEngine`], persists it on every phase change,
//! writes a focus session when a pomodoro completes and advances the bound
//! task's counter.

use std::sync::Arc;

use super::engine::{is_long_break, BreakKind, Completion, TickOutcome, TimerEngine, TimerPhase};
use super::persist::{load_state, store_state};
use super::TimerSnapshot;
use crate::clock::ms_to_datetime;
use crate::error::{CoreError, Result, TimerError};
use crate::events::Event;
use crate::identity::SessionContext;
use crate::session::{FocusSession, SessionDraft, SessionLog};
use crate::settings::UserSettings;
use crate::storage::{RecordStore, StateSlot};
use crate::task::{TaskRepo, TaskStatus};

#[derive(Debug, Clone)]
struct PendingSession {
    draft: SessionDraft,
    recovered: bool,
}

pub struct FocusTimer<S: RecordStore + StateSlot> {
    store: Arc<S>,
    ctx: SessionContext,
    engine: TimerEngine,
    pending: Option<PendingSession>,
    /// Task of the most recent pomodoro, reused by auto-start.
    last_task_id: Option<String>,
}

impl<S: RecordStore + StateSlot> FocusTimer<S> {
    /// An idle timer. Use [`recover`](Self::recover) to pick up persisted state.
    pub fn new(ctx: SessionContext, store: Arc<S>) -> Self {
        Self {
            store,
            ctx,
            engine: TimerEngine::new(),
            pending: None,
            last_task_id: None,
        }
    }

    /// Rebuild the timer from the persisted slot.
    ///
    /// A pomodoro that ran out while suspended is completed immediately; if
    /// its session cannot be written the failure is reported as an event and
    /// the draft is kept for [`retry_record`](Self::retry_record).
    pub fn recover(ctx: SessionContext, store: Arc<S>) -> (Self, Vec<Event>) {
        let mut timer = Self::new(ctx, store);
        let Some(state) = load_state(&*timer.store) else {
            return (timer, Vec::new());
        };

        let (engine, outcome) = TimerEngine::restore(&state, timer.ctx.now_ms());
        timer.engine = engine;
        timer.last_task_id = state.bound_task_id.clone();
        tracing::info!(phase = %state.phase, "recovering persisted timer");

        let events = match outcome {
            None => {
                timer.persist();
                vec![Event::TimerRecovered {
                    phase: timer.engine.phase(),
                    remaining_secs: timer.engine.remaining_secs(),
                    at: timer.ctx.now(),
                }]
            }
            Some(TickOutcome::Completed(completion)) => match timer.complete(completion) {
                Ok(events) => events,
                Err(e) => vec![Event::SessionRecordFailed {
                    message: e.to_string(),
                    at: timer.ctx.now(),
                }],
            },
            Some(TickOutcome::BreakFinished(kind)) => {
                timer.persist();
                vec![Event::BreakFinished {
                    kind,
                    at: timer.ctx.now(),
                }]
            }
        };
        (timer, events)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> TimerPhase {
        self.engine.phase()
    }

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        self.engine.snapshot()
    }

    pub fn snapshot_event(&self) -> Event {
        Event::StateSnapshot {
            snapshot: self.snapshot(),
            at: self.ctx.now(),
        }
    }

    /// The finished session still waiting to be written, if any.
    pub fn pending_session(&self) -> Option<&SessionDraft> {
        self.pending.as_ref().map(|p| &p.draft)
    }

    /// Settings changed elsewhere; later commands use the new values.
    pub fn set_settings(&mut self, settings: UserSettings) {
        self.ctx.set_settings(settings);
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a pomodoro of `minutes` (the user's setting when `None`),
    /// optionally bound to a task the caller owns.
    pub fn start(&mut self, minutes: Option<u32>, task_id: Option<String>) -> Result<Vec<Event>> {
        let minutes = minutes.unwrap_or(self.ctx.settings().pomodoro_duration);
        let mut next = self.engine.clone();
        next.start(minutes, task_id.clone(), self.ctx.now_ms())?;

        let repo = TaskRepo::new(&*self.store, &self.ctx);
        let task = task_id.as_deref().map(|id| repo.get(id)).transpose()?;
        if let Some(task) = task.filter(|t| t.status == TaskStatus::Pending) {
            if let Err(e) = repo.start_progress(&task.id) {
                tracing::warn!(task_id = %task.id, error = %e, "failed to mark task in progress");
            }
        }

        self.engine = next;
        self.last_task_id = task_id.clone();
        self.persist();
        tracing::info!(minutes, task_id = ?task_id, "pomodoro started");
        Ok(vec![Event::TimerStarted {
            duration_secs: self.engine.total_secs(),
            bound_task_id: task_id,
            at: self.ctx.now(),
        }])
    }

    pub fn pause(&mut self) -> Result<Vec<Event>> {
        self.engine.pause()?;
        self.persist();
        Ok(vec![Event::TimerPaused {
            remaining_secs: self.engine.remaining_secs(),
            at: self.ctx.now(),
        }])
    }

    pub fn resume(&mut self) -> Result<Vec<Event>> {
        self.engine.resume(self.ctx.now_ms())?;
        self.persist();
        Ok(vec![Event::TimerResumed {
            remaining_secs: self.engine.remaining_secs(),
            at: self.ctx.now(),
        }])
    }

    /// Stop the current pomodoro. Nothing is recorded.
    pub fn abandon(&mut self) -> Result<Vec<Event>> {
        let remaining_secs = self.engine.remaining_secs();
        self.engine.abandon()?;
        self.persist();
        tracing::info!(remaining_secs, "pomodoro abandoned");
        Ok(vec![Event::TimerAbandoned {
            remaining_secs,
            at: self.ctx.now(),
        }])
    }

    /// Kind of break on offer after the last recorded pomodoro.
    pub fn offered_break(&self) -> Option<BreakKind> {
        self.engine.offered_break()
    }

    /// Start the break offered after a completion. `minutes` overrides the
    /// configured length.
    pub fn start_break(&mut self, minutes: Option<u32>) -> Result<Vec<Event>> {
        let kind = self.engine.break_offer()?;
        let settings = self.ctx.settings();
        let minutes = minutes.unwrap_or(match kind {
            BreakKind::Long => settings.long_break,
            BreakKind::Short => settings.short_break,
        });
        self.engine.start_break(kind, minutes, self.ctx.now_ms())?;
        self.persist();
        tracing::info!(?kind, minutes, "break started");
        Ok(vec![Event::BreakStarted {
            kind,
            duration_secs: self.engine.total_secs(),
            at: self.ctx.now(),
        }])
    }

    pub fn skip_break(&mut self) -> Result<Vec<Event>> {
        self.engine.skip_break()?;
        self.persist();
        Ok(vec![Event::BreakSkipped { at: self.ctx.now() }])
    }

    /// Advance one second. A completion whose session write fails returns
    /// the error; the timer stays in `completing` until
    /// [`retry_record`](Self::retry_record) or
    /// [`discard_pending`](Self::discard_pending).
    pub fn tick(&mut self) -> Result<Vec<Event>> {
        match self.engine.tick(self.ctx.now_ms()) {
            None => Ok(Vec::new()),
            Some(TickOutcome::Completed(completion)) => self.complete(completion),
            Some(TickOutcome::BreakFinished(kind)) => {
                self.persist();
                tracing::info!(?kind, "break finished");
                let mut events = vec![Event::BreakFinished {
                    kind,
                    at: self.ctx.now(),
                }];
                if self.ctx.settings().auto_start_pomodoro {
                    match self.start(None, self.last_task_id.clone()) {
                        Ok(started) => events.extend(started),
                        Err(e) => tracing::warn!(error = %e, "auto-start of next pomodoro failed"),
                    }
                }
                Ok(events)
            }
        }
    }

    /// Write the pending session again.
    pub fn retry_record(&mut self) -> Result<Vec<Event>> {
        self.record_pending()
    }

    /// Drop a completion whose session could not be written.
    pub fn discard_pending(&mut self) -> Result<Vec<Event>> {
        if self.pending.take().is_none() {
            return Err(TimerError::NothingPending.into());
        }
        self.engine.discard_completion()?;
        self.persist();
        tracing::warn!("discarded an unrecorded focus session");
        Ok(vec![Event::TimerAbandoned {
            remaining_secs: 0,
            at: self.ctx.now(),
        }])
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn persist(&self) {
        store_state(&*self.store, self.engine.to_persisted().as_ref());
        tracing::debug!(phase = %self.engine.phase(), "timer state persisted");
    }

    fn complete(&mut self, completion: Completion) -> Result<Vec<Event>> {
        let draft = self.build_draft(&completion);
        self.pending = Some(PendingSession {
            draft,
            recovered: completion.recovered,
        });
        // Keep the completion in the slot until its session is written.
        self.persist();
        self.record_pending()
    }

    /// Resolve the title snapshot. A bound task that no longer exists turns
    /// the session into an independent one.
    fn build_draft(&self, completion: &Completion) -> SessionDraft {
        let (task_id, task_title_snapshot) = match &completion.bound_task_id {
            None => (None, String::new()),
            Some(id) => match TaskRepo::new(&*self.store, &self.ctx).find(id) {
                Ok(Some(task)) => (Some(id.clone()), task.title),
                Ok(None) => {
                    tracing::warn!(task_id = %id, "bound task is gone; recording an independent session");
                    (None, String::new())
                }
                Err(e) => {
                    tracing::warn!(task_id = %id, error = %e, "could not read bound task title");
                    (Some(id.clone()), String::new())
                }
            },
        };
        SessionDraft {
            task_id,
            task_title_snapshot,
            duration_minutes: completion.duration_minutes(),
            started_at: ms_to_datetime(completion.started_at_ms),
            ended_at: ms_to_datetime(completion.ended_at_ms),
        }
    }

    /// Long or short break after `session`, counting the pomodoros that
    /// ended earlier on the same local day.
    fn break_after(&self, session: &FocusSession) -> BreakKind {
        let before = SessionLog::new(&*self.store, &self.ctx)
            .count_ended_through(session.ended_at)
            .map(|n| n.saturating_sub(1))
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "could not count today's sessions; offering a short break");
                0
            });
        if is_long_break(before, self.ctx.settings().long_break_interval) {
            BreakKind::Long
        } else {
            BreakKind::Short
        }
    }

    fn record_pending(&mut self) -> Result<Vec<Event>> {
        let Some(pending) = self.pending.clone() else {
            return Err(TimerError::NothingPending.into());
        };

        let session = SessionLog::new(&*self.store, &self.ctx)
            .record(&pending.draft)
            .map_err(|e| {
                tracing::error!(error = %e, "failed to record focus session");
                e
            })?;
        self.pending = None;
        let offer = self.break_after(&session);
        self.engine.finish_completion(offer)?;
        self.persist();

        let mut events = Vec::new();
        let task_id = session.task_id.clone();
        events.push(Event::PomodoroCompleted {
            session,
            recovered: pending.recovered,
            at: self.ctx.now(),
        });

        if let Some(task_id) = task_id {
            if let Err(e) = TaskRepo::new(&*self.store, &self.ctx).increment_pomodoro(&task_id) {
                tracing::warn!(task_id = %task_id, error = %e, "failed to count pomodoro on task");
                events.push(Event::TaskProgressFailed {
                    task_id,
                    message: e.to_string(),
                    at: self.ctx.now(),
                });
            }
        }

        if self.ctx.settings().auto_start_break && !pending.recovered {
            match self.start_break(None) {
                Ok(started) => events.extend(started),
                Err(e) => tracing::warn!(error = %e, "auto-start of break failed"),
            }
        }
        Ok(events)
    }
}

impl<S: RecordStore + StateSlot> std::fmt::Debug for FocusTimer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FocusTimer")
            .field("ctx", &self.ctx)
            .field("engine", &self.engine)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

/// Convenience for callers holding a `CoreError` from a timer command.
pub fn is_invalid_transition(err: &CoreError) -> bool {
    matches!(err, CoreError::Timer(TimerError::InvalidTransition { .. }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use crate::task::NewTask;
    use chrono::{Offset, TimeZone, Utc};

    fn setup(settings: UserSettings) -> (FocusTimer<MemoryStore>, ManualClock, Arc<MemoryStore>) {
        let clock = ManualClock::at(Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap());
        let store = Arc::new(MemoryStore::new());
        let ctx = SessionContext::new("u1", settings, Arc::new(clock.clone()), Utc.fix());
        (FocusTimer::new(ctx, store.clone()), clock, store)
    }

    fn run_out(timer: &mut FocusTimer<MemoryStore>, clock: &ManualClock, secs: u32) -> Vec<Event> {
        let mut events = Vec::new();
        for _ in 0..secs {
            clock.advance_secs(1);
            events.extend(timer.tick().unwrap());
        }
        events
    }

    #[test]
    fn bound_completion_records_and_counts() {
        let (mut timer, clock, store) = setup(UserSettings::default());
        let task = TaskRepo::new(&*store, timer.context())
            .create(&NewTask::titled("Write"))
            .unwrap();

        timer.start(Some(1), Some(task.id.clone())).unwrap();
        let ctx = timer.context().clone();
        let repo = TaskRepo::new(&*store, &ctx);
        assert_eq!(repo.get(&task.id).unwrap().status, TaskStatus::InProgress);

        let events = run_out(&mut timer, &clock, 60);
        let session = events
            .iter()
            .find_map(|e| match e {
                Event::PomodoroCompleted { session, .. } => Some(session.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(session.duration_minutes, 1);
        assert_eq!(session.task_title_snapshot, "Write");
        assert_eq!(repo.get(&task.id).unwrap().pomodoro_completed, 1);
        assert_eq!(timer.phase(), TimerPhase::Idle);
        assert!(timer.engine().break_ready());
        let offer = load_state(&*store).unwrap();
        assert_eq!(offer.phase, TimerPhase::Idle);
        assert_eq!(offer.break_kind, Some(BreakKind::Short));
    }

    #[test]
    fn start_with_foreign_task_leaves_timer_idle() {
        let (mut timer, _clock, _store) = setup(UserSettings::default());
        let err = timer.start(None, Some("nope".into())).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
        assert_eq!(timer.phase(), TimerPhase::Idle);
    }

    #[test]
    fn deleted_task_yields_independent_session() {
        let (mut timer, clock, store) = setup(UserSettings::default());
        let task = TaskRepo::new(&*store, timer.context())
            .create(&NewTask::titled("Gone"))
            .unwrap();
        timer.start(Some(1), Some(task.id.clone())).unwrap();
        TaskRepo::new(&*store, timer.context()).delete(&task.id).unwrap();

        let events = run_out(&mut timer, &clock, 60);
        let completed = events.iter().any(|e| {
            matches!(e, Event::PomodoroCompleted { session, .. } if session.task_id.is_none())
        });
        assert!(completed);
    }

    #[test]
    fn failed_write_keeps_draft_for_retry() {
        let (mut timer, clock, store) = setup(UserSettings::default());
        timer.start(Some(1), None).unwrap();
        clock.advance_secs(60);
        store.fail_writes(true);
        assert!(matches!(timer.tick(), Err(CoreError::Store(_))));
        assert_eq!(timer.phase(), TimerPhase::Completing);
        assert!(timer.pending_session().is_some());

        store.fail_writes(false);
        let events = timer.retry_record().unwrap();
        assert!(matches!(events[0], Event::PomodoroCompleted { .. }));
        assert_eq!(timer.phase(), TimerPhase::Idle);
        assert!(matches!(
            timer.retry_record(),
            Err(CoreError::Timer(TimerError::NothingPending))
        ));
    }

    #[test]
    fn long_break_after_fourth_pomodoro() {
        let (mut timer, clock, _store) = setup(UserSettings::default());
        for round in 1..=4 {
            timer.start(Some(25), None).unwrap();
            clock.advance_secs(25 * 60);
            timer.tick().unwrap();
            let expected = if round == 4 {
                BreakKind::Long
            } else {
                BreakKind::Short
            };
            assert_eq!(timer.offered_break(), Some(expected), "round {round}");
            let events = timer.start_break(None).unwrap();
            assert!(matches!(events[0], Event::BreakStarted { kind, .. } if kind == expected));
            timer.skip_break().unwrap();
        }
    }

    #[test]
    fn break_override_and_auto_start() {
        let settings = UserSettings {
            auto_start_break: true,
            auto_start_pomodoro: true,
            ..UserSettings::default()
        };
        let (mut timer, clock, _store) = setup(settings);
        timer.start(Some(1), None).unwrap();
        clock.advance_secs(60);
        let events = timer.tick().unwrap();
        assert!(events.iter().any(|e| matches!(e, Event::BreakStarted { .. })));
        assert_eq!(timer.phase(), TimerPhase::Break);

        clock.advance_secs(5 * 60);
        let events = timer.tick().unwrap();
        assert!(events.iter().any(|e| matches!(e, Event::BreakFinished { .. })));
        assert!(events.iter().any(|e| matches!(e, Event::TimerStarted { .. })));
        assert_eq!(timer.phase(), TimerPhase::Running);
    }

    #[test]
    fn recover_completes_elapsed_pomodoro() {
        let (mut timer, clock, store) = setup(UserSettings::default());
        timer.start(Some(25), None).unwrap();
        let ctx = timer.context().clone();
        drop(timer);

        clock.advance_secs(30 * 60);
        let (recovered, events) = FocusTimer::recover(ctx, store.clone());
        let Some(Event::PomodoroCompleted { session, recovered: true, .. }) = events.first() else {
            panic!("expected recovered completion, got {events:?}");
        };
        assert_eq!(session.duration_minutes, 30);
        assert_eq!(recovered.phase(), TimerPhase::Idle);
        assert_eq!(load_state(&*store).map(|s| s.phase), Some(TimerPhase::Idle));
    }

    #[test]
    fn recover_one_second_early_keeps_running() {
        let (mut timer, clock, store) = setup(UserSettings::default());
        timer.start(Some(1), None).unwrap();
        let ctx = timer.context().clone();
        drop(timer);

        clock.advance_secs(59);
        let (timer, events) = FocusTimer::recover(ctx, store.clone());
        assert!(matches!(events[..], [Event::TimerRecovered { remaining_secs: 1, .. }]));
        let snapshot = timer.snapshot();
        assert_eq!(snapshot.phase, TimerPhase::Running);
        assert_eq!(snapshot.remaining_secs, 1);
        assert_eq!(store.len(crate::storage::Collection::FocusSessions), 0);
    }

    #[test]
    fn failed_write_survives_a_restart() {
        let (mut timer, clock, store) = setup(UserSettings::default());
        timer.start(Some(1), None).unwrap();
        let ctx = timer.context().clone();
        drop(timer);

        clock.advance_secs(60);
        store.fail_writes(true);
        let (timer, events) = FocusTimer::recover(ctx.clone(), store.clone());
        assert!(matches!(events[..], [Event::SessionRecordFailed { .. }]));
        assert_eq!(timer.phase(), TimerPhase::Completing);
        drop(timer);
        assert_eq!(
            load_state(&*store).map(|s| s.phase),
            Some(TimerPhase::Completing)
        );

        // A later process finds the completion and writes it exactly once.
        store.fail_writes(false);
        clock.advance_secs(600);
        let (timer, events) = FocusTimer::recover(ctx.clone(), store.clone());
        let Some(Event::PomodoroCompleted { session, recovered: true, .. }) = events.first() else {
            panic!("expected the pending session to be written, got {events:?}");
        };
        assert_eq!(session.duration_minutes, 1);
        assert_eq!(timer.phase(), TimerPhase::Idle);
        drop(timer);

        let (_, events) = FocusTimer::recover(ctx, store.clone());
        assert!(!events.iter().any(|e| matches!(e, Event::PomodoroCompleted { .. })));
        assert_eq!(store.len(crate::storage::Collection::FocusSessions), 1);
    }

    #[test]
    fn discarding_a_failed_completion_clears_the_slot() {
        let (mut timer, clock, store) = setup(UserSettings::default());
        timer.start(Some(1), None).unwrap();
        clock.advance_secs(60);
        store.fail_writes(true);
        assert!(timer.tick().is_err());
        let ctx = timer.context().clone();
        drop(timer);

        let (mut timer, _) = FocusTimer::recover(ctx, store.clone());
        assert!(timer.pending_session().is_some());
        timer.discard_pending().unwrap();
        assert_eq!(timer.phase(), TimerPhase::Idle);
        assert!(load_state(&*store).is_none());
        assert_eq!(store.len(crate::storage::Collection::FocusSessions), 0);
    }

    #[test]
    fn offered_break_can_start_from_a_later_process() {
        let (mut timer, clock, store) = setup(UserSettings::default());
        timer.start(Some(1), None).unwrap();
        let ctx = timer.context().clone();
        drop(timer);

        clock.advance_secs(61);
        let (timer, events) = FocusTimer::recover(ctx.clone(), store.clone());
        assert!(matches!(events.first(), Some(Event::PomodoroCompleted { .. })));
        drop(timer);

        let (mut timer, _) = FocusTimer::recover(ctx, store.clone());
        assert_eq!(timer.offered_break(), Some(BreakKind::Short));
        let events = timer.start_break(None).unwrap();
        assert!(matches!(
            events[0],
            Event::BreakStarted { kind: BreakKind::Short, duration_secs: 300, .. }
        ));
        assert_eq!(load_state(&*store).map(|s| s.phase), Some(TimerPhase::Break));
    }

    #[test]
    fn break_kind_follows_the_day_the_pomodoro_ended() {
        let settings = UserSettings {
            long_break_interval: 2,
            ..UserSettings::default()
        };
        let (mut timer, clock, store) = setup(settings);
        clock.set(Utc.with_ymd_and_hms(2024, 6, 10, 23, 0, 0).unwrap());
        timer.start(Some(25), None).unwrap();
        clock.advance_secs(25 * 60);
        timer.tick().unwrap();
        timer.skip_break().unwrap();

        // The second one ends at 23:50 but is only written after midnight.
        timer.start(Some(25), None).unwrap();
        clock.advance_secs(25 * 60);
        store.fail_writes(true);
        assert!(timer.tick().is_err());
        let ctx = timer.context().clone();
        drop(timer);

        store.fail_writes(false);
        clock.set(Utc.with_ymd_and_hms(2024, 6, 11, 0, 5, 0).unwrap());
        let (timer, events) = FocusTimer::recover(ctx, store.clone());
        let Some(Event::PomodoroCompleted { session, .. }) = events.first() else {
            panic!("expected completion, got {events:?}");
        };
        assert_eq!(session.ended_at, Utc.with_ymd_and_hms(2024, 6, 10, 23, 50, 0).unwrap());
        assert_eq!(timer.offered_break(), Some(BreakKind::Long));
    }

    #[test]
    fn abandon_records_nothing() {
        let (mut timer, clock, store) = setup(UserSettings::default());
        timer.start(Some(1), None).unwrap();
        clock.advance_secs(30);
        timer.tick().unwrap();
        timer.pause().unwrap();
        timer.abandon().unwrap();
        assert_eq!(timer.phase(), TimerPhase::Idle);
        assert_eq!(store.len(crate::storage::Collection::FocusSessions), 0);
        assert!(load_state(&*store).is_none());
        assert!(is_invalid_transition(&timer.abandon().unwrap_err()));
    }
}
