//! Submit command implementation.
//!
//! Hands one file path to a running daemon. Success means the path is
//! queued, not delivered; the daemon retries the upload until the archive
//! server takes it.

use anyhow::{Context, Result};

use ferry_core::config::Config;
use ferry_core::daemon;

use super::SubmitArgs;

/// Run the submit command.
pub async fn run(args: SubmitArgs, config: Config) -> Result<()> {
    let daemon_addr = args.daemon.unwrap_or(config.daemon.listen_addr);

    let path = args
        .path
        .canonicalize()
        .with_context(|| format!("cannot resolve {}", args.path.display()))?;

    daemon::submit(&path, &daemon_addr)
        .await
        .with_context(|| format!("failed to submit to daemon at {daemon_addr}"))?;

    println!("queued {}", path.display());
    Ok(())
}
