//! Single-task timer runtime.
//!
//! One tokio task owns the [`FocusTimer`]. Commands arrive over an mpsc
//! channel, a one-second interval drives `tick()`, and every resulting event
//! is broadcast. Because the loop is the only writer, ticks and commands
//! never interleave.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::controller::FocusTimer;
use super::TimerSnapshot;
use crate::error::Result;
use crate::events::Event;
use crate::settings::UserSettings;
use crate::storage::{RecordStore, StateSlot};

const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 128;

#[derive(Debug)]
pub enum TimerCommand {
    Start {
        minutes: Option<u32>,
        task_id: Option<String>,
    },
    Pause,
    Resume,
    Abandon,
    StartBreak {
        minutes: Option<u32>,
    },
    SkipBreak,
    RetryRecord,
    DiscardPending,
    UpdateSettings(UserSettings),
    Snapshot(oneshot::Sender<TimerSnapshot>),
    Shutdown,
}

impl TimerCommand {
    pub fn name(&self) -> &'static str {
        match self {
            TimerCommand::Start { .. } => "start",
            TimerCommand::Pause => "pause",
            TimerCommand::Resume => "resume",
            TimerCommand::Abandon => "abandon",
            TimerCommand::StartBreak { .. } => "start_break",
            TimerCommand::SkipBreak => "skip_break",
            TimerCommand::RetryRecord => "retry_record",
            TimerCommand::DiscardPending => "discard_pending",
            TimerCommand::UpdateSettings(_) => "update_settings",
            TimerCommand::Snapshot(_) => "snapshot",
            TimerCommand::Shutdown => "shutdown",
        }
    }
}

/// Cloneable handle to a running timer loop.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    commands: mpsc::Sender<TimerCommand>,
    events: broadcast::Sender<Event>,
}

impl TimerHandle {
    /// Queue a command. Returns `false` once the loop has stopped.
    pub async fn send(&self, command: TimerCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> Option<TimerSnapshot> {
        let (tx, rx) = oneshot::channel();
        if !self.send(TimerCommand::Snapshot(tx)).await {
            return None;
        }
        rx.await.ok()
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.send(TimerCommand::Shutdown).await;
    }
}

/// Spawn the loop. The join handle yields the timer back after shutdown.
pub fn spawn<S>(timer: FocusTimer<S>) -> (TimerHandle, JoinHandle<FocusTimer<S>>)
where
    S: RecordStore + StateSlot + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
    let handle = TimerHandle {
        commands: cmd_tx,
        events: event_tx.clone(),
    };
    let join = tokio::spawn(run(timer, cmd_rx, event_tx));
    (handle, join)
}

async fn run<S>(
    mut timer: FocusTimer<S>,
    mut commands: mpsc::Receiver<TimerCommand>,
    events: broadcast::Sender<Event>,
) -> FocusTimer<S>
where
    S: RecordStore + StateSlot + 'static,
{
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    tracing::debug!("timer loop started");
    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                match command {
                    TimerCommand::Shutdown => break,
                    TimerCommand::Snapshot(reply) => {
                        let _ = reply.send(timer.snapshot());
                    }
                    command => {
                        let name = command.name();
                        let result = apply(&mut timer, command);
                        publish(&events, &timer, name, result);
                    }
                }
            }
            _ = interval.tick() => {
                let result = timer.tick();
                publish(&events, &timer, "tick", result);
            }
        }
    }
    tracing::debug!("timer loop stopped");
    timer
}

fn apply<S: RecordStore + StateSlot>(
    timer: &mut FocusTimer<S>,
    command: TimerCommand,
) -> Result<Vec<Event>> {
    match command {
        TimerCommand::Start { minutes, task_id } => timer.start(minutes, task_id),
        TimerCommand::Pause => timer.pause(),
        TimerCommand::Resume => timer.resume(),
        TimerCommand::Abandon => timer.abandon(),
        TimerCommand::StartBreak { minutes } => timer.start_break(minutes),
        TimerCommand::SkipBreak => timer.skip_break(),
        TimerCommand::RetryRecord => timer.retry_record(),
        TimerCommand::DiscardPending => timer.discard_pending(),
        TimerCommand::UpdateSettings(settings) => {
            timer.set_settings(settings);
            Ok(Vec::new())
        }
        TimerCommand::Snapshot(_) | TimerCommand::Shutdown => Ok(Vec::new()),
    }
}

fn publish<S: RecordStore + StateSlot>(
    events: &broadcast::Sender<Event>,
    timer: &FocusTimer<S>,
    source: &'static str,
    result: Result<Vec<Event>>,
) {
    let at = timer.context().now();
    let out = match result {
        Ok(out) => out,
        // A failed session write is the only error a tick or retry can produce.
        Err(e) if matches!(source, "tick" | "retry_record") && timer.pending_session().is_some() => {
            vec![Event::SessionRecordFailed {
                message: e.to_string(),
                at,
            }]
        }
        Err(e) => {
            tracing::debug!(command = source, error = %e, "timer command rejected");
            vec![Event::CommandRejected {
                command: source.to_string(),
                message: e.to_string(),
                at,
            }]
        }
    };
    for event in out {
        // No subscribers is fine.
        let _ = events.send(event);
    }
}
