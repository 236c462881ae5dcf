use clap::Subcommand;
use pomotask_core::ProfileRepo;
use serde_json::json;

use crate::common::{print_json, App};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Sign in with an opaque user id
    Login {
        /// Identifier that scopes every record
        owner_id: String,
        /// Display name for the profile
        #[arg(long)]
        nickname: Option<String>,
    },
    /// Forget the signed-in identity (records stay in the database)
    Logout,
    /// Show the signed-in identity and profile
    Status,
}

pub fn run(action: AuthAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut app = App::open()?;

    match action {
        AuthAction::Login { owner_id, nickname } => {
            let owner_id = owner_id.trim();
            if owner_id.is_empty() {
                return Err("owner id must not be empty".into());
            }
            app.config.identity.owner_id = Some(owner_id.to_string());
            app.config.save_to(&app.dir)?;

            let ctx = app.session()?;
            let repo = ProfileRepo::new(app.db.as_ref(), ctx.owner_id());
            let profile = match nickname {
                Some(nickname) => repo.set_nickname(&nickname, ctx.now())?,
                None => repo.ensure(ctx.now())?,
            };
            tracing::info!(owner_id = ctx.owner_id(), "signed in");
            print_json(&profile)
        }
        AuthAction::Logout => {
            app.config.identity.owner_id = None;
            app.config.save_to(&app.dir)?;
            println!("signed out");
            Ok(())
        }
        AuthAction::Status => {
            let ctx = app.session()?;
            let profile = ProfileRepo::new(app.db.as_ref(), ctx.owner_id()).find()?;
            print_json(&json!({
                "ownerId": ctx.owner_id(),
                "profile": profile,
            }))
        }
    }
}
