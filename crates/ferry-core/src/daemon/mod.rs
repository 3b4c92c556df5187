//! Client daemon: submission queue, director, and upload retry loop.
//!
//! The daemon listens on a local endpoint for submissions (one file path
//! per connection, framed like every other protocol message) and promises
//! eventual delivery of each accepted path to the archive server.
//!
//! Internally a single **director** task owns the FIFO queue. It reacts to
//! three events: a new submission, the completion of the in-flight upload,
//! and shutdown. At most one uploader runs at a time, always on the head of
//! the queue, so files arrive at the server in submission order.
//!
//! The uploader dials, runs one send session, and on any failure sleeps an
//! exponentially growing backoff before trying again. The backoff timer is
//! armed before the dead connection is dropped, so socket teardown overlaps
//! the wait. Backoff starts fresh for every file. There is no attempt
//! limit: an unreachable server parks the daemon until it comes back or the
//! daemon is shut down.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{self, AckStatus, MessageType, SubmitPayload};
use crate::server::ShutdownHandle;
use crate::session::{self, NoopNotifier};
use crate::{INITIAL_RETRY_DELAY, MAX_RETRY_TIME};

/// The client-side upload daemon.
pub struct FerryDaemon {
    listen_addr: String,
    target_addr: String,
    cancel: CancellationToken,
}

impl FerryDaemon {
    /// Create a daemon that accepts submissions on `listen_addr` and
    /// delivers files to the archive server at `target_addr`.
    #[must_use]
    pub fn new(listen_addr: impl Into<String>, target_addr: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            target_addr: target_addr.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// Handle that stops [`serve`](Self::serve) and the director.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(self.cancel.clone())
    }

    /// Run the daemon: spawn the director, then accept submissions until
    /// shutdown.
    ///
    /// Each accepted connection carries exactly one [`SubmitPayload`]; the
    /// decoded path is handed to the director. The hand-off channel has
    /// capacity one, so a burst of submitters is backpressured while the
    /// director is busy queueing.
    ///
    /// # Errors
    ///
    /// Returns an error if the submission listener cannot be bound or
    /// `accept` fails.
    pub async fn serve(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        info!(addr = %listener.local_addr()?, target = %self.target_addr, "daemon accepting submissions");

        let (new_files_tx, new_files_rx) = mpsc::channel::<PathBuf>(1);
        let director = tokio::spawn(director(
            new_files_rx,
            self.target_addr.clone(),
            self.cancel.clone(),
        ));

        loop {
            let (mut stream, peer) = tokio::select! {
                () = self.cancel.cancelled() => break,
                accepted = listener.accept() => accepted?,
            };

            match read_submission(&mut stream).await {
                Ok(path) => {
                    info!(path = %path.display(), "queued submission");
                    if new_files_tx.send(path).await.is_err() {
                        break;
                    }
                }
                Err(err) => warn!(%peer, error = %err, "bad submission"),
            }
        }

        info!("daemon shutting down");
        let _ = director.await;
        Ok(())
    }

    /// The bound submission address is whatever `listen_addr` resolves to;
    /// use an explicit port when running tests in parallel.
    #[must_use]
    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }
}

async fn read_submission(stream: &mut TcpStream) -> Result<PathBuf> {
    let payload = protocol::read_expected(stream, MessageType::Submit).await?;
    let submit: SubmitPayload = protocol::decode_payload(&payload)?;
    if !submit.path.is_absolute() {
        return Err(Error::InvalidPath(submit.path.display().to_string()));
    }
    Ok(submit.path)
}

/// Single owner of the submission queue.
///
/// Only this task mutates the queue, and it only ever spawns an uploader on
/// the head, which is what guarantees FIFO delivery.
async fn director(
    mut new_files: mpsc::Receiver<PathBuf>,
    target_addr: String,
    cancel: CancellationToken,
) {
    let mut queue: VecDeque<PathBuf> = VecDeque::new();
    let (done_tx, mut done_rx) = mpsc::channel::<()>(1);

    let spawn_upload = |path: PathBuf| {
        let target = target_addr.clone();
        let done = done_tx.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            upload_with_retry(&path, &target, &cancel).await;
            let _ = done.send(()).await;
        });
    };

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            Some(path) = new_files.recv() => {
                queue.push_back(path.clone());
                if queue.len() == 1 {
                    spawn_upload(path);
                }
            }
            Some(()) = done_rx.recv() => {
                let finished = queue.pop_front();
                debug!(path = ?finished, pending = queue.len(), "upload finished");
                if let Some(next) = queue.front() {
                    spawn_upload(next.clone());
                }
            }
        }
    }
}

/// Dial and run send sessions until the file is fully delivered.
///
/// Every dial or session error is retried after the current backoff; the
/// only terminal replies are success and [`AckStatus::AlreadyExists`],
/// which means a finished copy is already in the archive. The backoff
/// doubles per failure up to [`MAX_RETRY_TIME`].
async fn upload_with_retry(path: &Path, target_addr: &str, cancel: &CancellationToken) {
    let mut delay = INITIAL_RETRY_DELAY;

    loop {
        let stream = match TcpStream::connect(target_addr).await {
            Ok(stream) => Some(stream),
            Err(err) => {
                warn!(target = target_addr, error = %err, "dial failed");
                None
            }
        };

        let dead_conn = match stream {
            Some(mut stream) => {
                match session::send_file(&mut stream, path, &mut NoopNotifier).await {
                    Ok(()) => {
                        info!(path = %path.display(), "upload complete");
                        return;
                    }
                    Err(Error::Rejected(AckStatus::AlreadyExists)) => {
                        warn!(path = %path.display(), "already archived, not retrying");
                        return;
                    }
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "upload attempt failed");
                        Some(stream)
                    }
                }
            }
            None => None,
        };

        debug!(delay = ?delay, "retrying upload");

        // Arm the timer first so socket teardown elapses inside the wait.
        let timer = tokio::time::sleep(delay);
        drop(dead_conn);

        tokio::select! {
            () = cancel.cancelled() => return,
            () = timer => {}
        }

        delay = (delay * 2).min(MAX_RETRY_TIME);
    }
}

/// Submit a file path to a running daemon.
///
/// Writes one framed [`SubmitPayload`] and closes the connection. A
/// successful return means the daemon accepted the path into its queue, not
/// that the file has been delivered.
///
/// # Errors
///
/// Returns [`Error::InvalidPath`] for a relative path, or an I/O error if
/// the daemon cannot be reached.
pub async fn submit(path: impl AsRef<Path>, daemon_addr: &str) -> Result<()> {
    let path = path.as_ref();
    if !path.is_absolute() {
        return Err(Error::InvalidPath(path.display().to_string()));
    }

    let mut stream = TcpStream::connect(daemon_addr).await?;
    let payload = protocol::encode_payload(&SubmitPayload {
        path: path.to_path_buf(),
    })?;
    protocol::write_frame(&mut stream, MessageType::Submit, &payload).await?;

    Ok(())
}
