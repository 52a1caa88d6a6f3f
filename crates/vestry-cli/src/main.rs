//! Vestry - command-line access to the church website's editable sections.
//!
//! Reads go through the same in-process section cache the website uses;
//! writes need an admin access token stored with `vestry login`.

mod commands;

use std::io;
use std::path::Path;

use anyhow::Result;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::Command;

/// Environment variable naming a log file to write instead of stderr
const LOG_FILE_ENV: &str = "VESTRY_LOG_FILE";

const USAGE: &str = "\
Usage: vestry <command> [args]

Commands:
  get <section>... [--placeholder <html>]   Print section HTML
  list                                      List all stored sections
  set <section> <file|->                    Replace a section's HTML (admin)
  login                                     Store the admin access token
  logout                                    Forget the admin access token
  config [init <project_url> <anon_key>]    Show or initialise configuration

Environment:
  VESTRY_URL, VESTRY_ANON_KEY, VESTRY_CACHE_TTL_SECS override the config file.
  RUST_LOG controls log verbosity; VESTRY_LOG_FILE sends logs to a file.";

/// Initialize the tracing subscriber for logging.
/// Returns the file writer guard, which must live until exit.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match std::env::var(LOG_FILE_ENV) {
        Ok(log_file) => {
            let path = Path::new(&log_file);
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let file_name = path.file_name().unwrap_or(path.as_os_str());
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .with(filter)
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    // Parse first: process::exit skips dropping the log guard
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    if matches!(command, Command::Help) {
        println!("{}", USAGE);
        return Ok(());
    }

    let _log_guard = init_tracing();

    debug!(?command, "Parsed command");
    info!("vestry starting");
    commands::run(command).await
}
