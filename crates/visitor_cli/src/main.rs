//! Command-line driver for the visitor counter.
//!
//! # Responsibility
//! - Run the page-load flow, or a single counter operation, against SQLite
//!   files standing in for the remote store and one client's local storage.
//! - Keep output as stable `key=value` lines for scripting.

use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;
use visitor_core::{init_logging, VisitorConfig};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "visitor", version, about = "Unique-visitor counter")]
struct Cli {
    /// SQLite file holding the shared counter (overrides VISITOR_STORE_DB).
    #[arg(long, global = true)]
    store_db: Option<PathBuf>,

    /// SQLite file acting as this client's local storage (overrides VISITOR_LOCAL_DB).
    #[arg(long, global = true)]
    local_db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Simulate one page load: mark the visit, then count or read.
    Visit,
    /// Print the current unique-visitor count.
    Count,
    /// Record one unique visitor and print the new count.
    Increment,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match VisitorConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(path) = cli.store_db {
        config.store_db_path = path;
    }
    if let Some(path) = cli.local_db {
        config.local_db_path = path;
    }

    if let Some(log_dir) = config.log_dir.as_deref() {
        if let Err(err) = init_logging(&config.log_level, log_dir) {
            eprintln!("warning: logging disabled: {err}");
        }
    }
    info!(
        "event=config_load module=cli status=ok max_attempts={} busy_timeout_ms={}",
        config.max_attempts,
        config.busy_timeout.as_millis()
    );

    match commands::execute(cli.command, &config) {
        Ok(line) => {
            println!("{line}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}
