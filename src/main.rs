//! Mosaic CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "mosaic")]
#[command(about = "Extract self-contained components and merge their dependencies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Synthesis config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a synthesis job described by a job file
    Synthesize {
        /// Job file (TOML)
        #[arg(short, long)]
        job: PathBuf,

        /// Output directory (overrides the job file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Build the import graph of a directory and print its stats
    Scan {
        /// Directory to scan
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("mosaic={log_level}")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Synthesize { job, output } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::synthesize(config, &job, output).await
        }
        Commands::Scan { dir } => commands::scan(&dir),
        Commands::Version => {
            println!("Mosaic v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
