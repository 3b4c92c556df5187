//! CLI command definitions and handlers.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use ferry_core::config::Config;

pub mod archive;
pub mod daemon;
pub mod submit;

/// Load configuration with graceful fallback to defaults.
///
/// An explicit `--config` path must parse; the default path falls back to
/// defaults when missing or unreadable.
pub fn load_config(explicit: Option<&Path>) -> Config {
    match explicit {
        Some(path) => Config::load_from(path).unwrap_or_else(|err| {
            eprintln!("warning: {err}; using defaults");
            Config::default()
        }),
        None => Config::load().unwrap_or_default(),
    }
}

/// Ferry - resumable file delivery to an archive server
#[derive(Parser)]
#[command(name = "ferry")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Run the archive server
    Archive(ArchiveArgs),

    /// Run the client upload daemon
    Daemon(DaemonArgs),

    /// Queue a file for delivery through a running daemon
    Submit(SubmitArgs),
}

/// Arguments for the `archive` command.
#[derive(clap::Args)]
pub struct ArchiveArgs {
    /// Address to listen on for transfers
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Directory to write received files into
    #[arg(short, long)]
    pub dir: Option<PathBuf>,
}

/// Arguments for the `daemon` command.
#[derive(clap::Args)]
pub struct DaemonArgs {
    /// Local address to accept submissions on
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Archive server address to deliver files to
    #[arg(short, long)]
    pub target: Option<String>,
}

/// Arguments for the `submit` command.
#[derive(clap::Args)]
pub struct SubmitArgs {
    /// File to deliver to the archive
    pub path: PathBuf,

    /// Address of the local daemon
    #[arg(short, long)]
    pub daemon: Option<String>,
}
