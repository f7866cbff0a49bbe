mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use blokd_core::config::get_data_dir;
use commands::{block, daemon, history};

#[derive(Parser)]
#[command(name = "blokd")]
#[command(about = "Self-imposed app blocking daemon", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a monitoring session
    Start,
    /// (Internal) Run the daemon process
    #[command(hide = true)]
    DaemonInternalStart,
    /// Stop the active monitoring session
    Stop,
    /// Show session status and counters
    Status,
    /// Request a timed break from blocking
    Break,
    /// Manage the block-list
    Block {
        #[command(subcommand)]
        action: BlockAction,
    },
    /// Show past monitoring sessions
    History {
        /// Show a single session by id
        #[arg(long)]
        id: Option<i64>,
    },
}

#[derive(Subcommand, Debug)]
enum BlockAction {
    /// Add a package to the block-list
    Add {
        /// Platform package identifier, e.g. com.example.game
        package: String,
    },
    /// Remove a package from the block-list
    Remove {
        /// Platform package identifier
        package: String,
    },
    /// List blocked packages
    List,
    /// Remove every package from the block-list
    Clear,
    /// Import packages from a newline-separated file
    Import {
        /// File with one package identifier per line
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if !matches!(cli.command, Commands::DaemonInternalStart) {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .format_timestamp_secs()
            .init();
    }

    let data_dir = get_data_dir()?;

    match cli.command {
        Commands::Start => daemon::start_daemon(&data_dir),
        Commands::DaemonInternalStart => daemon::run_daemon_process().await,
        Commands::Stop => daemon::stop_daemon(&data_dir).await,
        Commands::Status => daemon::show_status(&data_dir).await,
        Commands::Break => daemon::request_break(&data_dir).await,
        Commands::Block { action } => match action {
            BlockAction::Add { package } => block::add(&package),
            BlockAction::Remove { package } => block::remove(&package),
            BlockAction::List => block::list(),
            BlockAction::Clear => block::clear(),
            BlockAction::Import { path } => block::import(&path),
        },
        Commands::History { id } => history::show(id),
    }
}
