// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Threadlink - mirror WhatsApp conversations into Telegram forum topics.
//!
//! This is the binary entry point for the bridge.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use threadlink_config::{ConfigError, ThreadlinkConfig};

/// Threadlink - mirror WhatsApp conversations into Telegram forum topics.
#[derive(Parser, Debug)]
#[command(name = "threadlink", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Run the bridge (default).
    Serve,
    /// Probe every mapped topic once and recreate the deleted ones.
    Reconcile,
    /// Validate the configuration and exit.
    CheckConfig,
}

fn load_config(path: Option<&PathBuf>) -> Result<ThreadlinkConfig, Vec<ConfigError>> {
    match path {
        Some(path) => threadlink_config::load_and_validate_path(path),
        None => threadlink_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            threadlink_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("threadlink: {e}");
                std::process::exit(1);
            }
        }
        Commands::Reconcile => match serve::run_reconcile(config).await {
            Ok(report) => {
                println!(
                    "checked {} topics: {} healed, {} failed",
                    report.checked, report.healed, report.failed
                );
                if report.failed > 0 {
                    std::process::exit(2);
                }
            }
            Err(e) => {
                eprintln!("threadlink: {e}");
                std::process::exit(1);
            }
        },
        Commands::CheckConfig => {
            println!(
                "threadlink: config ok (group_id={}, sidecar={}, database={})",
                config.telegram.group_id.unwrap_or_default(),
                config.whatsapp.sidecar_url,
                config.storage.database_path
            );
        }
    }
}
