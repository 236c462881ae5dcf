use clap::Subcommand;
use pomotask_core::timer::runtime;
use pomotask_core::{Database, Event, FocusTimer, TimerPhase};
use tokio::sync::broadcast::error::RecvError;

use crate::common::{print_json, App};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a pomodoro
    Start {
        /// Length in minutes (defaults to the pomodoro duration setting)
        #[arg(long)]
        minutes: Option<u32>,
        /// Bind the pomodoro to a task
        #[arg(long)]
        task: Option<String>,
    },
    /// Pause the running pomodoro
    Pause,
    /// Resume a paused pomodoro
    Resume,
    /// Abandon the current pomodoro without recording it
    Abandon,
    /// Print the current timer state as JSON
    Status,
    /// Start the break that follows a completed pomodoro
    Break {
        /// Override the break length in minutes
        #[arg(long)]
        minutes: Option<u32>,
    },
    /// Skip the pending or running break
    SkipBreak,
    /// Write a completed pomodoro whose session could not be saved
    Retry,
    /// Drop a completed pomodoro whose session could not be saved
    Discard,
    /// Run the timer in the foreground, printing events as they happen
    Run {
        /// Start a pomodoro first
        #[arg(long)]
        start: bool,
        #[arg(long)]
        minutes: Option<u32>,
        #[arg(long)]
        task: Option<String>,
    },
}

fn print_events(events: &[Event]) -> Result<(), Box<dyn std::error::Error>> {
    for event in events {
        print_json(event)?;
    }
    Ok(())
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let app = App::open()?;
    let ctx = app.session()?;

    // Every invocation picks up whatever an earlier one left behind. A plain
    // resume is routine; completions and failures are worth showing.
    let (mut timer, recovered) = FocusTimer::recover(ctx, app.db.clone());
    let recorded_on_recover = recovered
        .iter()
        .any(|e| matches!(e, Event::PomodoroCompleted { .. }));
    for event in &recovered {
        match event {
            Event::TimerRecovered {
                phase,
                remaining_secs,
                ..
            } => tracing::debug!(%phase, remaining_secs, "timer recovered"),
            other => print_json(other)?,
        }
    }

    let events = match action {
        TimerAction::Start { minutes, task } => timer.start(minutes, task)?,
        TimerAction::Pause => timer.pause()?,
        TimerAction::Resume => timer.resume()?,
        TimerAction::Abandon => timer.abandon()?,
        TimerAction::Status => vec![timer.snapshot_event()],
        TimerAction::Break { minutes } => timer.start_break(minutes)?,
        TimerAction::SkipBreak => timer.skip_break()?,
        // Recovery already wrote it.
        TimerAction::Retry if recorded_on_recover => Vec::new(),
        TimerAction::Retry => timer.retry_record()?,
        TimerAction::Discard => timer.discard_pending()?,
        TimerAction::Run {
            start,
            minutes,
            task,
        } => {
            if start {
                print_events(&timer.start(minutes, task)?)?;
            }
            return run_foreground(timer);
        }
    };
    print_events(&events)
}

/// Drive the timer loop until it settles back to idle or Ctrl-C.
fn run_foreground(timer: FocusTimer<Database>) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(foreground(timer))
}

async fn foreground(timer: FocusTimer<Database>) -> Result<(), Box<dyn std::error::Error>> {
    if timer.phase() == TimerPhase::Idle {
        return print_json(&timer.snapshot_event());
    }

    let (handle, join) = runtime::spawn(timer);
    let mut events = handle.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            received = events.recv() => {
                let event = match received {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event stream lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                print_json(&event)?;
                if let Event::SessionRecordFailed { .. } = event {
                    tracing::warn!("session not saved; run `pomotask timer retry` or `pomotask timer discard`");
                    break;
                }
                let settles = matches!(
                    event,
                    Event::PomodoroCompleted { .. }
                        | Event::BreakFinished { .. }
                        | Event::BreakSkipped { .. }
                        | Event::TimerAbandoned { .. }
                );
                // Auto-start settings may already have moved the timer on.
                if settles {
                    let idle = handle
                        .snapshot()
                        .await
                        .map_or(true, |s| s.phase == TimerPhase::Idle);
                    if idle {
                        break;
                    }
                }
            }
            _ = &mut ctrl_c => {
                tracing::info!("interrupted; timer state stays persisted");
                break;
            }
        }
    }

    handle.shutdown().await;
    let timer = join.await?;
    print_json(&timer.snapshot_event())
}
