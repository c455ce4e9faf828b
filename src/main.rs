use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod cli;
mod core;
mod poller;

use crate::core::models::Priority;
use crate::core::settings::Settings;

#[derive(Parser)]
#[command(name = "gradewatch")]
#[command(author, version, about = "Track AI-grading analysis jobs from the terminal")]
struct Cli {
    /// Path to an alternative config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow an analysis job until it completes or fails
    Track {
        /// Task to track
        task_id: String,

        /// Polling interval in milliseconds (overrides config)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: Option<u64>,

        /// Output events as JSON lines
        #[arg(long)]
        json: bool,

        /// Open the task report in the browser when analysis completes
        #[arg(long)]
        open: bool,
    },

    /// Queue an analysis job for a task
    Trigger {
        /// Task to analyze
        task_id: String,

        /// Queue priority
        #[arg(long, value_enum, default_value_t = Priority::Normal)]
        priority: Priority,

        /// Track the job after it has been queued
        #[arg(long)]
        watch: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the current analysis queue
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    let settings = Settings::load(cli.config.as_deref())?;
    init_logging(settings.debug);
    tracing::debug!(
        base_url = %settings.api.base_url,
        interval_ms = settings.polling.interval_ms,
        "Effective settings"
    );

    match cli.command {
        Commands::Track {
            task_id,
            interval_ms,
            json,
            open,
        } => {
            let options = cli::track::TrackOptions {
                json,
                open,
                interval_ms,
            };
            cli::track::run(&settings, &task_id, &options).await
        }
        Commands::Trigger {
            task_id,
            priority,
            watch,
            json,
        } => cli::trigger::run(&settings, &task_id, priority, watch, json).await,
        Commands::Queue { json } => cli::queue::run(&settings, json).await,
        Commands::Completions { .. } => Ok(()),
    }
}
