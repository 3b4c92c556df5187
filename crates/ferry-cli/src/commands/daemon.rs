//! Daemon command implementation.
//!
//! Runs the upload daemon until interrupted. Files queued at shutdown are
//! not persisted; submitters must re-submit after a restart.

use anyhow::{Context, Result};
use tracing::info;

use ferry_core::config::Config;
use ferry_core::daemon::FerryDaemon;

use super::DaemonArgs;

/// Run the daemon command.
pub async fn run(args: DaemonArgs, config: Config) -> Result<()> {
    let listen = args.listen.unwrap_or(config.daemon.listen_addr);
    let target = args.target.unwrap_or(config.daemon.target_addr);

    let daemon = FerryDaemon::new(listen.clone(), target);

    let handle = daemon.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            handle.shutdown();
        }
    });

    daemon
        .serve()
        .await
        .with_context(|| format!("daemon failed on {listen}"))
}
