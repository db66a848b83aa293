//! leafdev CLI - build and dev orchestrator for the leafcodes site.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "leafdev")]
#[command(about = "Build and dev orchestrator for the leafcodes static site")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to leafdev.toml config file
    #[arg(short, long, default_value = "leafdev.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate pages and bundle scripts once
    Build {
        /// Use the development build settings
        #[arg(long)]
        dev: bool,
    },

    /// Build, then rebuild on change and serve the output
    Dev {
        /// Port to listen on (defaults to config or 8080)
        #[arg(short, long)]
        port: Option<u16>,

        /// Open the site in a browser
        #[arg(long)]
        open: bool,
    },

    /// Serve an existing build without rebuilding
    Serve {
        /// Port to listen on (defaults to config or 8080)
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory to serve (defaults to config or "build")
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    fmt().with_env_filter(filter).with_target(false).init();

    let result = match cli.command {
        Commands::Build { dev } => commands::build::run(&cli.config, dev).await,
        Commands::Dev { port, open } => commands::dev::run(&cli.config, port, open).await,
        Commands::Serve { port, dir } => commands::serve::run(&cli.config, port, dir).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
