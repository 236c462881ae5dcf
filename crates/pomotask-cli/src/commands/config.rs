use clap::Subcommand;
use pomotask_core::Config;

use crate::common::App;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Dot-separated key (e.g. "defaults.pomodoro_duration")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// List all config values
    List,
    /// Reset config to defaults (signs out)
    Reset,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut app = App::open()?;

    match action {
        ConfigAction::Get { key } => match app.config.get(&key) {
            Some(value) => println!("{value}"),
            None => return Err(format!("unknown key: {key}").into()),
        },
        ConfigAction::Set { key, value } => {
            app.config.set(&key, &value)?;
            app.config.save_to(&app.dir)?;
            println!("ok");
        }
        ConfigAction::List => {
            println!("{}", serde_json::to_string_pretty(&app.config)?);
        }
        ConfigAction::Reset => {
            Config::default().save_to(&app.dir)?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}
