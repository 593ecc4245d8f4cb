//! Tarkov Tail - follows Escape from Tarkov client logs and extracts events.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tarkov_tail::engine::{EventSink, TailEngine};

#[derive(Parser)]
#[command(
    name = "tarkov-tail",
    about = "Follows Escape from Tarkov client logs and extracts events",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tail the client's logs and print extracted events until Ctrl-C.
    Watch {
        /// The client's Logs directory (contains one subdirectory per
        /// session).
        #[arg(long)]
        logs_dir: Option<PathBuf>,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

/// Default install location, for when the flag is omitted.
fn default_logs_dir() -> Option<PathBuf> {
    let dir = dirs::home_dir()?
        .join("Battlestate Games")
        .join("Escape from Tarkov")
        .join("Logs");
    dir.is_dir().then_some(dir)
}

/// Sink that reports every extracted event through tracing.
struct LogSink;

impl EventSink for LogSink {
    fn on_map_changed(&self, location: &str) {
        tracing::info!(location, "map changed");
    }

    fn on_quest_status_changed(&self, quest_id: &str, status: &str) {
        tracing::info!(quest_id, status, "quest status changed");
    }

    fn on_client_ready(&self) {
        tracing::info!("client ready");
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Watch { logs_dir } => {
            let Some(root) = logs_dir.or_else(default_logs_dir) else {
                tracing::error!("no logs directory found; pass --logs-dir");
                std::process::exit(2);
            };

            let mut engine = TailEngine::new(root, Arc::new(LogSink));
            if let Err(e) = engine.start() {
                tracing::error!(error = %e, "failed to start tail engine");
                std::process::exit(1);
            }
            tracing::info!(root = %engine.root().display(), "watching logs, Ctrl-C to stop");

            let _ = tokio::signal::ctrl_c().await;
            engine.stop().await;
        }
    }
}
