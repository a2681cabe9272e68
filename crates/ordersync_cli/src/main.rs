//! Ordersync CLI - command-line control surface for the order history sync.

mod commands;
mod config;
mod progress;
mod shutdown;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::Term;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ordersync")]
#[command(version)]
#[command(about = "Resumable historical order sync into an analytics ingestion service")]
#[command(
    long_about = "Ordersync walks a WooCommerce store's complete order history page by page, \
normalizes every order and delivers it in batches to an ingestion endpoint. Progress is \
kept in a local database, so an interrupted sync resumes where it stopped."
)]
#[command(after_long_help = r#"EXAMPLES
    Start a sync and let a worker run it:
        $ ordersync start
        $ ordersync work

    Follow a running sync:
        $ ordersync progress --watch

    Run a started sync to the end, then exit (e.g. from cron):
        $ ordersync work --once

    Abandon a sync that is still running:
        $ ordersync reset --force

CONFIGURATION
    Ordersync reads configuration from:
      1. ~/.config/ordersync/config.toml (or $XDG_CONFIG_HOME/ordersync/config.toml)
      2. ./ordersync.toml
      3. Environment variables (ORDERSYNC_ prefix, `__` between section and key)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    ORDERSYNC_DATABASE__URL              Database connection string (default: ~/.local/state/ordersync/ordersync.db)
    ORDERSYNC_STORE__URL                 WooCommerce store URL
    ORDERSYNC_STORE__CONSUMER_KEY        WooCommerce REST API consumer key
    ORDERSYNC_STORE__CONSUMER_SECRET     WooCommerce REST API consumer secret
    ORDERSYNC_INGESTION__ENDPOINT        Ingestion service base URL
    ORDERSYNC_INGESTION__SITE_ID         Site identifier sent with every batch
    ORDERSYNC_INGESTION__API_TOKEN       Ingestion API token
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Start a sync, or resume an interrupted one
    Start,
    /// Show sync progress as JSON
    Progress {
        /// Follow the run until it completes or fails
        #[arg(short, long)]
        watch: bool,

        /// Seconds between polls when watching
        #[arg(short, long, default_value_t = 2)]
        interval: u64,
    },
    /// Reset sync progress to idle
    Reset {
        /// Reset even while a sync is running; its queued chunks are dropped
        #[arg(short, long)]
        force: bool,
    },
    /// Execute scheduled sync chunks
    Work {
        /// Run chunks until none are scheduled, then exit instead of polling
        #[arg(long)]
        once: bool,

        /// Seconds between polls of an empty queue (default from config or 1)
        #[arg(short, long)]
        poll_interval: Option<u64>,
    },
    /// Run the chunk scheduled under a run token
    #[command(hide = true)]
    RunChunk {
        /// Run token carried by the scheduled chunk
        token: String,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Generate man page(s)
    Man {
        /// Output directory for man pages (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so JSON on stdout stays machine readable.
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("ordersync=info,ordersync_cli=info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(Term::stderr().is_term())
        .with_writer(std::io::stderr)
        .init();

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load();

    let cli = Cli::parse();

    // Handle commands that don't require database access first
    match &cli.command {
        Commands::Completions { shell } => {
            commands::meta::handle_completions(*shell)?;
            return Ok(());
        }
        Commands::Man { output } => {
            commands::meta::handle_man(output.clone())?;
            return Ok(());
        }
        _ => {}
    }

    let database_url = config
        .database_url()
        .ok_or("Could not determine a database URL; set ORDERSYNC_DATABASE__URL")?;

    // Ensure the database directory exists for SQLite
    if database_url.starts_with("sqlite://") {
        let db_path = database_url.trim_start_matches("sqlite://");
        // Strip query parameters (e.g., ?mode=rwc) before path operations
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        let db_path = std::path::Path::new(db_path);

        if db_path.is_relative() && !db_path.as_os_str().is_empty() {
            tracing::warn!(
                "Database path '{}' is relative - behavior depends on current directory. \
                 Consider using an absolute path.",
                db_path.display()
            );
        }

        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
    }

    match cli.command {
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await?;
        }
        Commands::Start => {
            commands::control::handle_start(&config, &database_url).await?;
        }
        Commands::Progress { watch, interval } => {
            let interval = Duration::from_secs(interval.max(1));
            commands::control::handle_progress(watch, interval, &config, &database_url).await?;
        }
        Commands::Reset { force } => {
            commands::control::handle_reset(force, &config, &database_url).await?;
        }
        Commands::Work {
            once,
            poll_interval,
        } => {
            let poll_interval = poll_interval.map(|secs| Duration::from_secs(secs.max(1)));
            commands::work::handle_work(once, poll_interval, &config, &database_url).await?;
        }
        Commands::RunChunk { token } => {
            commands::control::handle_run_chunk(&token, &config, &database_url).await?;
        }
        Commands::Completions { .. } | Commands::Man { .. } => {}
    }

    Ok(())
}
