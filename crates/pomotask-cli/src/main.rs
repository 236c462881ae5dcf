use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

mod commands;
mod common;

const DEFAULT_LOG_FILTER: &str = "warn,pomotask_core=info";

#[derive(Parser)]
#[command(name = "pomotask", version, about = "Pomotask CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Task management
    Task {
        #[command(subcommand)]
        action: commands::task::TaskAction,
    },
    /// Focus session history
    History {
        #[command(subcommand)]
        action: commands::history::HistoryAction,
    },
    /// Session statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Timer settings of the signed-in user
    Settings {
        #[command(subcommand)]
        action: commands::settings::SettingsAction,
    },
    /// Local configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Sign in and out
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Export data as JSON or CSV
    Export(commands::export::ExportArgs),
    /// Print shell completions
    Completions {
        shell: Shell,
    },
}

/// Log to stderr so stdout stays machine-readable.
fn init_tracing() {
    let filter = std::env::var("POMOTASK_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Timer { action } => commands::timer::run(action),
        Commands::Task { action } => commands::task::run(action),
        Commands::History { action } => commands::history::run(action),
        Commands::Stats { action } => commands::stats::run(action),
        Commands::Settings { action } => commands::settings::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Auth { action } => commands::auth::run(action),
        Commands::Export(args) => commands::export::run(args),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "pomotask", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
