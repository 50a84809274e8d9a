// SPDX-FileCopyrightText: 2026 Gearbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gearbook - a reservation service with a spreadsheet mirror.
//!
//! This is the binary entry point for the Gearbook service.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod check;
mod seed;
mod serve;
mod shutdown;

use clap::{Parser, Subcommand};

/// Gearbook - a reservation service with a spreadsheet mirror.
#[derive(Parser, Debug)]
#[command(name = "gearbook", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the reservation service.
    Serve,
    /// Run diagnostic checks against the configured environment.
    Check {
        /// Run additional intensive checks.
        #[arg(long)]
        deep: bool,

        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup.
    let config = match gearbook_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            gearbook_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Check { deep, plain }) => check::run_check(&config, deep, plain).await,
        Some(Commands::Serve) | None => serve::run_serve(config).await,
    };

    if let Err(e) = result {
        eprintln!("gearbook: {e}");
        std::process::exit(1);
    }
}
