//! CLI entry point for embed-store.
//!
//! Provides commands for importing chunks, clustering their embeddings and
//! serving them over HTTP.

use std::path::PathBuf;

use anyhow::anyhow;
use clap::{
    Parser, Subcommand,
    builder::PossibleValuesParser,
    builder::styling::{AnsiColor, Effects, Styles},
};
use embed_store::Settings;
use embed_store::logging::{LOG_LEVELS, init_logging};
use embed_store::service;
use tokio_util::sync::CancellationToken;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Embedding chunk store
#[derive(Parser)]
#[command(
    name = "embed-store",
    version = env!("CARGO_PKG_VERSION"),
    about = "Chunk store with CSV import, HTTP lookup and k-means clustering",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = "Quick Start:\n  $ embed-store init\n  $ embed-store import data/chunks.csv\n  $ embed-store cluster --clusters 32\n  $ embed-store serve --bind 127.0.0.1:8080"
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overrides config)
    #[arg(long, global = true, value_parser = PossibleValuesParser::new(LOG_LEVELS))]
    log_level: Option<String>,

    /// Debug log level shortcut
    #[arg(short = 'd', long = "debug", global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Initialize project
    #[command(about = "Set up .embed-store directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings")]
    Config,

    /// Serve the HTTP API
    #[command(
        about = "Serve the chunk API until interrupted",
        after_help = "Examples:\n  embed-store serve\n  embed-store serve --bind 127.0.0.1:9000\n  embed-store serve --run-import --run-cluster"
    )]
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        bind: Option<String>,

        /// Import the configured CSV in the background
        #[arg(long)]
        run_import: bool,

        /// Run one clustering pass after startup
        #[arg(long)]
        run_cluster: bool,
    },

    /// Import chunks from a CSV file
    #[command(about = "Import pre-embedded chunks from CSV")]
    Import {
        /// CSV file (overrides config)
        path: Option<PathBuf>,

        /// Number of insert workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Rows per insert batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Stop after this many rows (0 reads everything)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Cluster stored embeddings
    #[command(about = "Run k-means over stored embeddings and save the labels")]
    Cluster {
        /// Number of clusters
        #[arg(short = 'k', long)]
        clusters: Option<usize>,

        /// Lloyd iterations
        #[arg(short, long)]
        iterations: Option<usize>,

        /// Worker threads
        #[arg(short, long)]
        workers: Option<usize>,

        /// Maximum rows to cluster
        #[arg(long)]
        limit: Option<usize>,

        /// Labels written per batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Seed for centroid sampling
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .map_err(|e| anyhow!("configuration error loading from {}: {e}", path.display()))?,
        None => Settings::load().unwrap_or_else(|e| {
            eprintln!("Configuration error: {e}");
            eprintln!("Using default configuration.");
            Settings::default()
        }),
    };

    if let Some(level) = &cli.log_level {
        settings.log_level = level.clone();
    }

    match &cli.command {
        Commands::Serve {
            bind,
            run_import,
            run_cluster,
        } => {
            if let Some(bind) = bind {
                settings.server.bind = bind.clone();
            }
            settings.run_import |= *run_import;
            settings.run_cluster |= *run_cluster;
        }
        Commands::Import {
            path,
            workers,
            batch_size,
            limit,
        } => {
            let import = &mut settings.import;
            if let Some(path) = path {
                import.file_path = path.clone();
            }
            import.workers = workers.unwrap_or(import.workers);
            import.batch_size = batch_size.unwrap_or(import.batch_size);
            import.limit = limit.unwrap_or(import.limit);
        }
        Commands::Cluster {
            clusters,
            iterations,
            workers,
            limit,
            batch_size,
            seed,
        } => {
            let cluster = &mut settings.cluster;
            cluster.clusters = clusters.unwrap_or(cluster.clusters);
            cluster.iterations = iterations.unwrap_or(cluster.iterations);
            cluster.workers = workers.unwrap_or(cluster.workers);
            cluster.limit = limit.unwrap_or(cluster.limit);
            cluster.batch_size = batch_size.unwrap_or(cluster.batch_size);
            if seed.is_some() {
                cluster.seed = *seed;
            }
        }
        Commands::Init { .. } | Commands::Config => {}
    }

    Ok(settings)
}

/// Cancels the returned token on Ctrl-C.
fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received shutdown signal");
            trigger.cancel();
        }
    });
    token
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Init { force } = &cli.command {
        let path = Settings::init_config_file(*force).map_err(|e| anyhow!("{e}"))?;
        println!("Created configuration file at: {}", path.display());
        println!("Edit this file to customize your settings.");
        return Ok(());
    }

    let settings = load_settings(&cli)?;

    if let Commands::Config = &cli.command {
        println!("Current Configuration:");
        println!("{}", "=".repeat(50));
        println!("{}", toml::to_string_pretty(&settings)?);
        return Ok(());
    }

    init_logging(&settings.log_level, cli.debug)?;
    let shutdown = shutdown_on_ctrl_c();

    match &cli.command {
        Commands::Serve { .. } => service::serve(settings, shutdown).await?,
        Commands::Import { .. } => {
            let summary = service::import_once(&settings, shutdown).await?;
            println!(
                "Imported {} of {} rows ({} duplicates, {} failed)",
                summary.inserted, summary.read, summary.duplicates, summary.failed
            );
        }
        Commands::Cluster { .. } => {
            let report = service::cluster_once(&settings, shutdown).await?;
            println!(
                "Clustered {} rows into {} clusters in {:.2?}",
                report.rows, report.clusters, report.elapsed
            );
        }
        Commands::Init { .. } | Commands::Config => {}
    }

    Ok(())
}
