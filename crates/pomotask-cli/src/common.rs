//! Shared plumbing for CLI commands.

use std::path::PathBuf;
use std::sync::Arc;

use pomotask_core::storage::data_dir;
use pomotask_core::{Config, Database, SessionContext, SystemClock};
use serde::Serialize;

/// Data directory, loaded configuration and the open database.
pub struct App {
    pub dir: PathBuf,
    pub config: Config,
    pub db: Arc<Database>,
}

impl App {
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let dir = data_dir()?;
        let config = Config::load_from(&dir)?;
        let db = Database::open_at(config.database_path(&dir))?;
        Ok(Self {
            dir,
            config,
            db: Arc::new(db),
        })
    }

    /// Sign-in check plus profile and settings bootstrap.
    pub fn session(&self) -> Result<SessionContext, Box<dyn std::error::Error>> {
        let ctx = SessionContext::establish(
            &self.config.identity,
            self.db.as_ref(),
            &self.config.defaults.to_settings(),
            Arc::new(SystemClock),
            self.config.display.offset(),
        )?;
        Ok(ctx)
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
