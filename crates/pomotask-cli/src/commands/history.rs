//! Focus session history.

use chrono::NaiveDate;
use clap::Subcommand;
use pomotask_core::clock::day_bounds;
use pomotask_core::{SessionFilter, SessionLog};

use crate::common::{print_json, App};

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List sessions, newest first
    List {
        /// First day, inclusive (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day, inclusive (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Only sessions bound to this task
        #[arg(long)]
        task: Option<String>,
    },
    /// Sessions completed today
    Today,
    /// Show one session
    Get { id: String },
    /// Attach a note to a session (empty clears it)
    Note { id: String, note: String },
}

pub fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let app = App::open()?;
    let ctx = app.session()?;
    let log = SessionLog::new(app.db.as_ref(), &ctx);
    let offset = ctx.offset();

    match action {
        HistoryAction::List { from, to, task } => {
            let filter = SessionFilter {
                start: from.map(|d| day_bounds(d, offset).0),
                end: to.map(|d| day_bounds(d, offset).1),
                task_id: task,
            };
            print_json(&log.list(&filter)?)
        }
        HistoryAction::Today => print_json(&log.today()?),
        HistoryAction::Get { id } => print_json(&log.get(&id)?),
        HistoryAction::Note { id, note } => print_json(&log.set_note(&id, &note)?),
    }
}
