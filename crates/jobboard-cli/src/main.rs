//! jobboard - command-line front end for the job board API.
//!
//! The session is hydrated from disk before any command runs, so every
//! command sees the real signed-in state.

mod commands;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jobboard_core::{AuthService, ClientConfig, Config, FileStorage, Role};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log file name used when `--log-file` points at a directory-less path
const DEFAULT_LOG_FILE: &str = "jobboard.log";

#[derive(Parser, Debug)]
#[command(name = "jobboard", about = "Job board API client", version)]
struct Cli {
    /// API base URL (overrides config file)
    #[arg(long, env = "JOBBOARD_API_URL")]
    api_url: Option<String>,

    /// Also write logs to this file
    #[arg(long, env = "JOBBOARD_LOG_FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session
    Login {
        #[arg(long, short)]
        username: Option<String>,
    },
    /// Create a new account (sign in separately afterwards)
    Register {
        #[arg(long, short)]
        username: String,
        #[arg(long, short)]
        email: String,
        #[arg(long, default_value = "candidate")]
        role: Role,
    },
    /// Drop the stored session
    Logout,
    /// Show who is signed in
    Whoami,
    /// List open job offers
    Offers,
    /// List your applications
    Applications,
    /// Apply to a job offer with a CV
    Apply {
        #[arg(long)]
        job: i64,
        #[arg(long)]
        cv: PathBuf,
        #[arg(long, default_value = "")]
        cover_letter: String,
        /// Candidate id (defaults to the signed-in account)
        #[arg(long)]
        candidate: Option<i64>,
    },
    /// GET any API path and print the JSON response
    Get { path: String },
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| DEFAULT_LOG_FILE.into());
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn client_config(config: &Config, api_url: Option<String>) -> ClientConfig {
    let resolved = config.client_config();
    match api_url {
        Some(url) => ClientConfig {
            base_url: ClientConfig::new(url).base_url,
            ..resolved
        },
        None => resolved,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_file.as_deref());

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };

    let client_config = client_config(&config, cli.api_url.clone());
    info!(base_url = %client_config.base_url, "jobboard starting");

    let data_dir = Config::data_dir().context("Could not locate session storage")?;
    let storage = Arc::new(FileStorage::new(data_dir));

    // Hydration happens here, before anything is printed
    let auth = AuthService::new(&client_config, storage).context("Failed to build API client")?;
    let mut pipeline = auth.client().subscribe();

    let result = commands::run(&auth, &mut config, cli.command).await;

    // Let the auth service react to any 401 seen during the command
    while let Ok(event) = pipeline.try_recv() {
        if auth.handle_api_event(&event) {
            eprintln!("Session expired. Please log in again with `jobboard login`.");
        }
    }

    result
}
