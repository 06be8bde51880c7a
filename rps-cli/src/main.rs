mod commands;
mod config;

use clap::{Parser, Subcommand};
use config::CliConfig;
use rps_core::Storage;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rps")]
#[command(about = "Commit-reveal rock-paper-scissors wagers over an escrow ledger")]
#[command(version)]
struct Cli {
    /// Data directory for session storage
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a session with Alice, Bob and an observer on a local ledger
    Play(commands::PlayArgs),
    /// List stored sessions
    List,
    /// Show the event log of a stored session
    Show {
        /// Session ID
        id: String,
    },
    /// Rebuild a stored session through a fresh observer
    Replay {
        /// Session ID
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "rps={},rps_game={},rps_core={}",
            log_level, log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = CliConfig {
        verbose: cli.verbose,
        ..CliConfig::default()
    };
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    tokio::fs::create_dir_all(&config.data_dir).await?;
    let storage = Storage::new(&config.db_path()).await?;
    tracing::debug!("Using session storage at {}", config.db_path().display());

    let result = match cli.command {
        Commands::Play(args) => commands::play(&storage, config, args).await,
        Commands::List => commands::list_sessions(&storage).await,
        Commands::Show { id } => commands::show_session(&storage, &id).await,
        Commands::Replay { id } => commands::replay_session(&storage, &id).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
