//! Ferry CLI - resumable file delivery to an archive server
//!
//! Ferry moves files from client hosts into a server-side archive over
//! plain TCP, resuming interrupted transfers from the last acknowledged
//! block.
//!
//! ## Quick Start
//!
//! ```bash
//! # On the archive host
//! ferry archive --dir /srv/archive
//!
//! # On the client host
//! ferry daemon --target archive.example.net:7941
//!
//! # Queue a file for delivery
//! ferry submit ./backup.tar
//! ```

use anyhow::Result;
use clap::Parser;

mod commands;

use commands::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref());

    init_logging(&config.logging);

    match cli.command {
        Command::Archive(args) => commands::archive::run(args, config).await,
        Command::Daemon(args) => commands::daemon::run(args, config).await,
        Command::Submit(args) => commands::submit::run(args, config).await,
    }
}

fn init_logging(logging: &ferry_core::config::LoggingConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if !logging.enabled {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.filter.clone()));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}
