//! mailroom - terminal front end for the settlement-mail dashboard.
//!
//! Operators log in, manage merchant contact lists, send and queue
//! settlement emails, and review transactions and settlement records. All
//! business logic lives in the backend API.

mod commands;
mod format;

use std::io;
use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mailroom_core::{ApiError, Config};

use commands::{Commands, Context};

/// Exit code when the session is invalid and the user must log in again
const EXIT_SESSION_INVALID: u8 = 2;

#[derive(Parser)]
#[command(name = "mailroom", about = "Settlement-mail dashboard client", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr, and additionally to a daily file when `log_dir` is
/// configured. The returned guard must live until exit to flush the file.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "mailroom.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
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

/// Whether a command failed only because the user has to log in again.
fn ended_by_session(e: &anyhow::Error) -> bool {
    e.downcast_ref::<ApiError>()
        .map(ApiError::is_session_invalid)
        .unwrap_or(false)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::load()?;
    let _log_guard = init_tracing(config.log_dir.as_deref());
    info!(api_url = %config.api_url, "mailroom starting");

    let ctx = Context::new(config)?;
    // Returning (rather than exiting) lets the log guard flush
    match commands::run(&ctx, cli.command).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        // The session hook already told the user to log in again
        Err(e) if ended_by_session(&e) => Ok(ExitCode::from(EXIT_SESSION_INVALID)),
        Err(e) => Err(e),
    }
}
