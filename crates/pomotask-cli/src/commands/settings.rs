use clap::Subcommand;
use pomotask_core::{SettingsPatch, SettingsRepo};

use crate::common::{print_json, App};

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Show the signed-in user's timer settings
    Show,
    /// Change timer settings
    Set {
        /// Pomodoro length in minutes
        #[arg(long)]
        pomodoro: Option<u32>,
        /// Short break length in minutes
        #[arg(long)]
        short_break: Option<u32>,
        /// Long break length in minutes
        #[arg(long)]
        long_break: Option<u32>,
        /// Take a long break after this many pomodoros
        #[arg(long)]
        long_break_interval: Option<u32>,
        #[arg(long)]
        sound: Option<bool>,
        #[arg(long)]
        vibration: Option<bool>,
        /// Start the break automatically after a pomodoro
        #[arg(long)]
        auto_start_break: Option<bool>,
        /// Start the next pomodoro automatically after a break
        #[arg(long)]
        auto_start_pomodoro: Option<bool>,
    },
}

pub fn run(action: SettingsAction) -> Result<(), Box<dyn std::error::Error>> {
    let app = App::open()?;
    let ctx = app.session()?;

    match action {
        SettingsAction::Show => print_json(ctx.settings()),
        SettingsAction::Set {
            pomodoro,
            short_break,
            long_break,
            long_break_interval,
            sound,
            vibration,
            auto_start_break,
            auto_start_pomodoro,
        } => {
            let patch = SettingsPatch {
                pomodoro_duration: pomodoro,
                short_break,
                long_break,
                long_break_interval,
                sound_enabled: sound,
                vibration_enabled: vibration,
                auto_start_break,
                auto_start_pomodoro,
            };
            let settings = SettingsRepo::new(app.db.as_ref(), ctx.owner_id()).update(
                &patch,
                &app.config.defaults.to_settings(),
                ctx.now(),
            )?;
            print_json(&settings)
        }
    }
}
