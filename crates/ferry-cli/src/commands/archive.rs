//! Archive command implementation.
//!
//! Runs the archive server until interrupted. Ctrl-C triggers a clean
//! shutdown of the accept loop; an interrupted session stays resumable
//! because the slot lives only as long as the process.

use anyhow::{Context, Result};
use tracing::info;

use ferry_core::config::Config;
use ferry_core::server::ArchiveServer;
use ferry_core::session::NoopNotifier;

use super::ArchiveArgs;

/// Run the archive command.
pub async fn run(args: ArchiveArgs, config: Config) -> Result<()> {
    let listen = args.listen.unwrap_or(config.server.listen_addr);
    let dir = args.dir.unwrap_or(config.server.archive_dir);

    let mut server = ArchiveServer::bind(listen.as_str(), &dir)
        .await
        .with_context(|| format!("failed to start archive server on {listen}"))?;

    let handle = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            handle.shutdown();
        }
    });

    server
        .serve(|| NoopNotifier)
        .await
        .context("archive server failed")
}
