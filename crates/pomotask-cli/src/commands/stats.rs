use chrono::{Duration, NaiveDate};
use clap::Subcommand;
use pomotask_core::{StatsRequest, StatsService};

use crate::common::{print_json, App};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's pomodoros, focus minutes and completed tasks
    Today,
    /// Last seven days with streak
    Week,
    /// All-time totals
    Overview,
    /// Per-day buckets
    Daily {
        #[command(flatten)]
        range: Range,
    },
    /// Per-week buckets (weeks start on Monday)
    Weekly {
        #[command(flatten)]
        range: Range,
    },
    /// Per-month buckets
    Monthly {
        #[command(flatten)]
        range: Range,
    },
    /// Priority and status breakdown of tasks
    Tasks,
}

#[derive(clap::Args)]
pub struct Range {
    /// First day, inclusive (default: 30 days ago)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last day, inclusive (default: today)
    #[arg(long)]
    to: Option<NaiveDate>,
}

impl Range {
    fn resolve(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let end = self.to.unwrap_or(today);
        let start = self.from.unwrap_or(end - Duration::days(29));
        (start, end)
    }
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let app = App::open()?;
    let ctx = app.session()?;
    let today = ctx.today();

    let request = match action {
        StatsAction::Today => StatsRequest::Today,
        StatsAction::Week => StatsRequest::Week,
        StatsAction::Overview => StatsRequest::Overview,
        StatsAction::Daily { range } => {
            let (start, end) = range.resolve(today);
            StatsRequest::Daily { start, end }
        }
        StatsAction::Weekly { range } => {
            let (start, end) = range.resolve(today);
            StatsRequest::Weekly { start, end }
        }
        StatsAction::Monthly { range } => {
            let (start, end) = range.resolve(today);
            StatsRequest::Monthly { start, end }
        }
        StatsAction::Tasks => StatsRequest::TaskAnalysis,
    };

    let report = StatsService::new(app.db.as_ref(), &ctx).run(&request)?;
    print_json(&report)
}
