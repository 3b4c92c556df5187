//! Archive server: sequential accept loop over the resumption slot.
//!
//! The server owns one TCP listener, one [`TransferSlot`], and the archive
//! directory. Connections are served strictly one at a time from a single
//! accept loop; the single-slot resumption state is only ever touched from
//! that loop, so no locking is needed. A failed session is logged and the
//! loop keeps accepting; with the slot intact, the client's next
//! connection resumes the interrupted file.

use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::net::{TcpListener, ToSocketAddrs};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::session::{self, RecvNotifier, TransferSlot};

/// Clonable handle that stops a running serve loop.
///
/// Signalling is edge-less and idempotent: calling [`shutdown`] more than
/// once, or before the loop reaches its next suspension point, is fine.
///
/// [`shutdown`]: ShutdownHandle::shutdown
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Request shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }
}

/// The archive server.
pub struct ArchiveServer {
    listener: TcpListener,
    archive_dir: PathBuf,
    slot: TransferSlot,
    cancel: CancellationToken,
}

impl ArchiveServer {
    /// Bind the transfer listener and prepare the archive directory,
    /// creating it if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the address
    /// cannot be bound.
    pub async fn bind<A: ToSocketAddrs>(addr: A, archive_dir: impl Into<PathBuf>) -> Result<Self> {
        let archive_dir = archive_dir.into();
        tokio::fs::create_dir_all(&archive_dir).await?;

        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, dir = %archive_dir.display(), "archive server listening");

        Ok(Self {
            listener,
            archive_dir,
            slot: TransferSlot::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// The bound listener address (useful when binding port 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the local address cannot be determined.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle that stops [`serve`](Self::serve) from another task.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(self.cancel.clone())
    }

    /// Accept and serve transfer sessions until shutdown.
    ///
    /// Sessions run inline, one at a time. A per-session error is logged
    /// and the loop continues; the slot keeps whatever progress the session
    /// made. Returns `Ok(())` on shutdown, or the accept error if the
    /// listener fails.
    ///
    /// `notifier_factory` produces one [`RecvNotifier`] per session.
    ///
    /// # Errors
    ///
    /// Returns an error if `accept` fails.
    pub async fn serve<F, N>(&mut self, mut notifier_factory: F) -> Result<()>
    where
        F: FnMut() -> N,
        N: RecvNotifier,
    {
        loop {
            let (mut stream, peer) = tokio::select! {
                () = self.cancel.cancelled() => {
                    info!("archive server shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => accepted?,
            };

            debug!(%peer, "accepted transfer connection");

            let mut notifier = notifier_factory();
            if let Err(err) = session::receive_file(
                &mut stream,
                &mut self.slot,
                &self.archive_dir,
                &mut notifier,
            )
            .await
            {
                warn!(%peer, error = %err, "transfer session failed");
            }
        }
    }
}
