//! Lily-Mirror main entry point
//!
//! This is the command-line interface for the LilyBBS offline mirror.

use clap::Parser;
use lily_mirror::config::{load_config, Config};
use lily_mirror::{Mirror, TracingObserver};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Lily-Mirror: an offline mirror for the LilyBBS forum
///
/// Lily-Mirror walks every public board of the forum, parses each thread
/// and keeps a local SQLite copy up to date across runs.
#[derive(Parser, Debug)]
#[command(name = "lily-mirror")]
#[command(version)]
#[command(about = "An offline mirror for the LilyBBS forum", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be mirrored without crawling
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            match load_config(path) {
                Ok(cfg) => {
                    tracing::info!("Configuration loaded successfully");
                    cfg
                }
                Err(e) => {
                    tracing::error!("Failed to load configuration: {}", e);
                    return Err(e.into());
                }
            }
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
    } else {
        handle_mirror(config)?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("lily_mirror=info,warn"),
            1 => EnvFilter::new("lily_mirror=debug,info"),
            2 => EnvFilter::new("lily_mirror=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Lily-Mirror Dry Run ===\n");

    println!("Site:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  Directory page: {}", config.site.entry_path);
    println!("  Default encoding: {}", config.site.default_encoding);
    println!("  UTC offset: {:+}h", config.site.utc_offset_hours);

    println!("\nFetching:");
    println!("  User agent: {}", config.fetch.user_agent);
    println!("  Timeout: {}s", config.fetch.timeout_secs);
    println!(
        "  Retries: {} attempts, {}ms apart",
        config.fetch.retry_limit, config.fetch.retry_delay_ms
    );

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);
    println!("  Commit every: {} documents", config.storage.commit_batch_size);
    println!(
        "  Abort board after: {} consecutive failures",
        config.storage.failure_threshold
    );

    println!("\n✓ Configuration is valid");
}

/// Handles the main mirror operation
fn handle_mirror(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Mirroring {}{} into {}",
        config.site.base_url,
        config.site.entry_path,
        config.storage.database_path
    );

    let mirror = Mirror::from_config(config, Arc::new(TracingObserver))?;

    match mirror.run() {
        Ok(summary) => {
            tracing::info!(
                "Mirror completed: {}/{} boards, {} threads saved, {} failed",
                summary.boards_mirrored,
                summary.boards_listed,
                summary.documents_saved,
                summary.documents_failed
            );
            if !summary.rejected_boards.is_empty() {
                tracing::warn!("Rejected boards: {}", summary.rejected_boards.join(", "));
            }
            if !summary.aborted_boards.is_empty() {
                tracing::warn!("Aborted boards: {}", summary.aborted_boards.join(", "));
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Mirror failed: {}", e);
            Err(e.into())
        }
    }
}
