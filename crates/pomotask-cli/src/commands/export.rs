use std::path::PathBuf;

use clap::Args;
use pomotask_core::{ExportFormat, ExportKind, Exporter};

use crate::common::App;

#[derive(Args)]
pub struct ExportArgs {
    /// all, tasks, sessions or statistics
    #[arg(long, default_value = "all")]
    kind: ExportKind,
    /// json or csv (csv applies to tasks and sessions)
    #[arg(long, default_value = "json")]
    format: ExportFormat,
    /// Write to a file instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
}

pub fn run(args: ExportArgs) -> Result<(), Box<dyn std::error::Error>> {
    let app = App::open()?;
    let ctx = app.session()?;
    let document = Exporter::new(app.db.as_ref(), &ctx).export(args.kind, args.format)?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, document.content.to_string())?;
            eprintln!("exported to {}", path.display());
        }
        None => println!("{}", document.content),
    }
    Ok(())
}
