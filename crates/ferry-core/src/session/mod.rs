//! Stop-and-wait transfer engine.
//!
//! Both endpoints of a transfer run one of the two session functions in this
//! module on an already-established byte stream:
//!
//! - [`send_file`] offers a file, learns where to resume from the server's
//!   acknowledgement, and streams blocks one at a time, waiting for each
//!   block's ack before sending the next.
//! - [`receive_file`] accepts or rejects the offer against the server's
//!   single [`TransferSlot`], then writes each block at its absolute file
//!   position and acknowledges it.
//!
//! A session moves exactly one file. There is no termination handshake: the
//! transfer is complete once the block count implied by the offered size has
//! been acknowledged. On any failure the receive side leaves the slot
//! untouched so the next connection can resume where this one stopped.

use std::io::SeekFrom;
use std::path::Path;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{
    self, block_offset, num_blocks, AckStatus, DataAckPayload, DataBlockPayload, MessageType,
    ResumeAckPayload, StartOfferPayload,
};
use crate::PAYLOAD_SIZE;

/// Milestone callbacks for the sending side. All methods are synchronous
/// no-ops by default; implementations must not block.
pub trait SendNotifier {
    /// About to transmit the start offer.
    fn send_start(&mut self) {}
    /// About to wait for the resume acknowledgement.
    fn recv_ack(&mut self) {}
    /// Block acknowledged; `sent` of `total` bytes are now at the server.
    fn progress(&mut self, _sent: u64, _total: u64) {}
}

/// Milestone callbacks for the receiving side.
pub trait RecvNotifier {
    /// About to wait for a start offer.
    fn recv_start(&mut self) {}
    /// Offer accepted; about to send the resume acknowledgement.
    fn send_ack(&mut self) {}
    /// Block written; `written` of `total` bytes are now on disk.
    fn progress(&mut self, _written: u64, _total: u64) {}
}

/// A notifier that ignores every milestone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl SendNotifier for NoopNotifier {}
impl RecvNotifier for NoopNotifier {}

/// The server's single-slot resumption state.
///
/// Idle when `name` is empty. While a transfer is in progress the slot
/// records the file name, its declared size, and the next block index the
/// server expects; blocks `[0, next_block)` have been written to the
/// archive. The slot is cleared only when a transfer completes, never on
/// error, which is what makes resumption across connections work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferSlot {
    /// In-progress file name (empty when idle)
    pub name: String,
    /// Declared size of the in-progress file
    pub size: u64,
    /// Next block index expected from the client
    pub next_block: u64,
}

impl TransferSlot {
    /// Create an idle slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no transfer is in progress.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.name.is_empty()
    }

    /// Start tracking a fresh transfer from block 0.
    pub fn begin(&mut self, name: &str, size: u64) {
        self.name = name.to_string();
        self.size = size;
        self.next_block = 0;
    }

    /// Reset to idle after a completed transfer.
    pub fn clear(&mut self) {
        self.name.clear();
        self.size = 0;
        self.next_block = 0;
    }
}

/// Run one sending session: offer `path`, then stream blocks from wherever
/// the server asks to resume.
///
/// Performs a single attempt. On any failure an error is returned and the
/// local file system is left unmodified; retrying is the caller's decision.
///
/// # Errors
///
/// - [`Error::Rejected`] when the server refuses the offer
/// - [`Error::SequenceMismatch`] when an ack carries the wrong block index
/// - [`Error::UnexpectedEof`] when the file ends before its declared size
/// - I/O and codec errors from the stream or the file
pub async fn send_file<S, N>(stream: &mut S, path: &Path, notifier: &mut N) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    N: SendNotifier + ?Sized,
{
    let meta = tokio::fs::metadata(path).await?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidPath(path.display().to_string()))?
        .to_string();
    let size = meta.len();

    notifier.send_start();

    let offer = StartOfferPayload {
        name: name.clone(),
        size,
    };
    let payload = protocol::encode_payload(&offer)?;
    protocol::write_frame(stream, MessageType::StartOffer, &payload).await?;

    notifier.recv_ack();

    let ack_payload = protocol::read_expected(stream, MessageType::ResumeAck).await?;
    let ack: ResumeAckPayload = protocol::decode_payload(&ack_payload)?;

    if ack.status != AckStatus::Ok {
        return Err(Error::Rejected(ack.status));
    }

    let mut file = File::open(path).await?;

    let total_blocks = num_blocks(size);
    if ack.seq_num > 0 {
        debug!(name = %name, block = ack.seq_num, "resuming transfer");
        file.seek(SeekFrom::Start(block_offset(ack.seq_num))).await?;
    }

    for seq_num in ack.seq_num..total_blocks {
        let want = PAYLOAD_SIZE.min(size - block_offset(seq_num));
        let data = read_block(&mut file, want as usize).await?;
        if (data.len() as u64) < want {
            return Err(Error::UnexpectedEof {
                block: seq_num,
                last: total_blocks - 1,
            });
        }

        let block = DataBlockPayload { seq_num, data };
        protocol::write_frame(stream, MessageType::DataBlock, &protocol::encode_data_block(&block))
            .await?;

        let ack_payload = protocol::read_expected(stream, MessageType::DataAck).await?;
        let data_ack: DataAckPayload = protocol::decode_payload(&ack_payload)?;
        if data_ack.seq_num != seq_num {
            return Err(Error::SequenceMismatch {
                expected: seq_num,
                actual: data_ack.seq_num,
            });
        }

        notifier.progress(block_offset(seq_num + 1).min(size), size);
    }

    Ok(())
}

/// Read up to `want` bytes, tolerating short reads from the file.
async fn read_block(file: &mut File, want: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; want];
    let mut filled = 0;
    while filled < want {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}

/// Whether `name` is a plain file basename with no directory components.
fn is_plain_basename(name: &str) -> bool {
    let path = Path::new(name);
    path.file_name().is_some_and(|f| f == path.as_os_str())
}

/// Run one receiving session against the shared resumption `slot`.
///
/// Rejections (empty name, wrong file, already archived, open failure) are
/// reported to the client in the resume acknowledgement before any state is
/// mutated. On the success path the acknowledgement carries the next block
/// the slot expects, and each received block is written verbatim at its
/// absolute offset in `archive_dir/<name>` before being acknowledged.
///
/// The slot is cleared only when the final block has been written; any error
/// leaves it intact so the client's next connection resumes.
///
/// # Errors
///
/// Returns an error for rejected offers, wire-level failures, and file I/O
/// failures. The caller is expected to log and keep accepting.
pub async fn receive_file<S, N>(
    stream: &mut S,
    slot: &mut TransferSlot,
    archive_dir: &Path,
    notifier: &mut N,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    N: RecvNotifier + ?Sized,
{
    notifier.recv_start();

    let offer_payload = protocol::read_expected(stream, MessageType::StartOffer).await?;
    let offer: StartOfferPayload = protocol::decode_payload(&offer_payload)?;

    if offer.name.is_empty() || !is_plain_basename(&offer.name) {
        send_rejection(stream, AckStatus::EmptyFilename).await?;
        return Err(Error::Rejected(AckStatus::EmptyFilename));
    }

    if !slot.is_idle() && slot.name != offer.name {
        debug!(offered = %offer.name, waiting_for = %slot.name, "rejecting wrong file");
        send_rejection(stream, AckStatus::WrongFile).await?;
        return Err(Error::Rejected(AckStatus::WrongFile));
    }

    if !slot.is_idle() && slot.size != offer.size {
        // Same name, different size: the file changed under the client.
        send_rejection(stream, AckStatus::WrongFile).await?;
        return Err(Error::Rejected(AckStatus::WrongFile));
    }

    let target = archive_dir.join(&offer.name);

    if slot.is_idle() && tokio::fs::try_exists(&target).await.unwrap_or(false) {
        send_rejection(stream, AckStatus::AlreadyExists).await?;
        return Err(Error::Rejected(AckStatus::AlreadyExists));
    }

    let mut file = match OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&target)
        .await
    {
        Ok(file) => file,
        Err(err) => {
            send_rejection(stream, AckStatus::OpenFailed).await?;
            return Err(err.into());
        }
    };

    if slot.is_idle() {
        slot.begin(&offer.name, offer.size);
    } else {
        debug!(name = %slot.name, block = slot.next_block, "resuming interrupted transfer");
    }

    notifier.send_ack();

    let ack = ResumeAckPayload {
        name: slot.name.clone(),
        size: slot.size,
        seq_num: slot.next_block,
        status: AckStatus::Ok,
    };
    protocol::write_frame(stream, MessageType::ResumeAck, &protocol::encode_payload(&ack)?).await?;

    let total_blocks = num_blocks(slot.size);
    while slot.next_block < total_blocks {
        let block_payload = protocol::read_expected(stream, MessageType::DataBlock).await?;
        let block = protocol::decode_data_block(&block_payload)?;

        if block.seq_num != slot.next_block {
            return Err(Error::SequenceMismatch {
                expected: slot.next_block,
                actual: block.seq_num,
            });
        }

        file.seek(SeekFrom::Start(block_offset(slot.next_block))).await?;
        file.write_all(&block.data).await?;

        let data_ack = DataAckPayload {
            seq_num: slot.next_block,
        };
        protocol::write_frame(stream, MessageType::DataAck, &protocol::encode_payload(&data_ack)?)
            .await?;

        slot.next_block += 1;

        notifier.progress(block_offset(slot.next_block).min(slot.size), slot.size);
    }

    file.flush().await?;
    file.sync_all().await?;

    debug!(name = %slot.name, size = slot.size, "transfer complete");
    slot.clear();

    Ok(())
}

async fn send_rejection<S>(stream: &mut S, status: AckStatus) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let ack = ResumeAckPayload::rejection(status);
    protocol::write_frame(stream, MessageType::ResumeAck, &protocol::encode_payload(&ack)?).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_slot_lifecycle() {
        let mut slot = TransferSlot::new();
        assert!(slot.is_idle());

        slot.begin("report.pdf", 10_000);
        assert!(!slot.is_idle());
        assert_eq!(slot.next_block, 0);

        slot.next_block = 2;
        slot.clear();
        assert!(slot.is_idle());
        assert_eq!(slot.size, 0);
        assert_eq!(slot.next_block, 0);
    }

    #[test]
    fn test_plain_basename() {
        assert!(is_plain_basename("report.pdf"));
        assert!(!is_plain_basename("../report.pdf"));
        assert!(!is_plain_basename("nested/report.pdf"));
        assert!(!is_plain_basename("/etc/passwd"));
        assert!(!is_plain_basename(".."));
    }

    /// Drive both session roles over an in-memory duplex stream.
    async fn roundtrip(content: &[u8]) -> Vec<u8> {
        let temp = TempDir::new().expect("create temp dir");
        let src = temp.path().join("payload.bin");
        std::fs::write(&src, content).expect("write source");

        let archive = temp.path().join("archive");
        std::fs::create_dir_all(&archive).expect("create archive dir");

        let (mut client, mut server) = tokio::io::duplex(64 * 1024);

        let archive_dir = archive.clone();
        let receiver = tokio::spawn(async move {
            let mut slot = TransferSlot::new();
            receive_file(&mut server, &mut slot, &archive_dir, &mut NoopNotifier).await
        });

        send_file(&mut client, &src, &mut NoopNotifier)
            .await
            .expect("send");
        receiver.await.expect("join").expect("receive");

        std::fs::read(archive.join("payload.bin")).expect("read archived")
    }

    #[tokio::test]
    async fn test_roundtrip_small() {
        let content: Vec<u8> = (0u8..12).collect();
        assert_eq!(roundtrip(&content).await, content);
    }

    #[tokio::test]
    async fn test_roundtrip_exact_multiple() {
        let content: Vec<u8> = (0..3 * PAYLOAD_SIZE).map(|i| (i % 251) as u8).collect();
        assert_eq!(roundtrip(&content).await, content);
    }

    #[tokio::test]
    async fn test_roundtrip_one_byte_over() {
        let content: Vec<u8> = (0..=PAYLOAD_SIZE).map(|i| (i % 253) as u8).collect();
        assert_eq!(roundtrip(&content).await, content);
    }

    #[tokio::test]
    async fn test_roundtrip_empty_file() {
        assert!(roundtrip(&[]).await.is_empty());
    }

    #[tokio::test]
    async fn test_progress_milestones() {
        #[derive(Default)]
        struct Recorder {
            started: bool,
            acked: bool,
            reports: Vec<(u64, u64)>,
        }
        impl SendNotifier for Recorder {
            fn send_start(&mut self) {
                self.started = true;
            }
            fn recv_ack(&mut self) {
                self.acked = true;
            }
            fn progress(&mut self, sent: u64, total: u64) {
                self.reports.push((sent, total));
            }
        }

        let temp = TempDir::new().expect("create temp dir");
        let src = temp.path().join("two_blocks.bin");
        let size = PAYLOAD_SIZE + 100;
        let content: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();
        std::fs::write(&src, &content).expect("write source");

        let archive = temp.path().join("archive");
        std::fs::create_dir_all(&archive).expect("create archive dir");

        let (mut client, mut server) = tokio::io::duplex(64 * 1024);
        let archive_dir = archive.clone();
        let receiver = tokio::spawn(async move {
            let mut slot = TransferSlot::new();
            receive_file(&mut server, &mut slot, &archive_dir, &mut NoopNotifier).await
        });

        let mut recorder = Recorder::default();
        send_file(&mut client, &src, &mut recorder).await.expect("send");
        receiver.await.expect("join").expect("receive");

        assert!(recorder.started);
        assert!(recorder.acked);
        assert_eq!(recorder.reports, vec![(PAYLOAD_SIZE, size), (size, size)]);
    }

    #[tokio::test]
    async fn test_rejects_empty_name() {
        let temp = TempDir::new().expect("create temp dir");
        let archive = temp.path().to_path_buf();

        let (mut client, mut server) = tokio::io::duplex(4096);
        let receiver = tokio::spawn(async move {
            let mut slot = TransferSlot::new();
            let err = receive_file(&mut server, &mut slot, &archive, &mut NoopNotifier)
                .await
                .expect_err("empty name must be rejected");
            assert_eq!(err.reject_reason(), Some(AckStatus::EmptyFilename));
            assert!(slot.is_idle());
        });

        let offer = StartOfferPayload {
            name: String::new(),
            size: 10,
        };
        protocol::write_frame(
            &mut client,
            MessageType::StartOffer,
            &protocol::encode_payload(&offer).unwrap(),
        )
        .await
        .expect("write offer");

        let ack_payload = protocol::read_expected(&mut client, MessageType::ResumeAck)
            .await
            .expect("read ack");
        let ack: ResumeAckPayload = protocol::decode_payload(&ack_payload).expect("decode");
        assert_eq!(ack.status, AckStatus::EmptyFilename);

        receiver.await.expect("join");
    }

    #[tokio::test]
    async fn test_rejects_existing_file_when_idle() {
        let temp = TempDir::new().expect("create temp dir");
        let archive = temp.path().to_path_buf();
        std::fs::write(archive.join("done.bin"), b"already here").expect("seed archive");

        let (mut client, mut server) = tokio::io::duplex(4096);
        let archive_dir = archive.clone();
        let receiver = tokio::spawn(async move {
            let mut slot = TransferSlot::new();
            receive_file(&mut server, &mut slot, &archive_dir, &mut NoopNotifier).await
        });

        let offer = StartOfferPayload {
            name: "done.bin".to_string(),
            size: 11,
        };
        protocol::write_frame(
            &mut client,
            MessageType::StartOffer,
            &protocol::encode_payload(&offer).unwrap(),
        )
        .await
        .expect("write offer");

        let ack_payload = protocol::read_expected(&mut client, MessageType::ResumeAck)
            .await
            .expect("read ack");
        let ack: ResumeAckPayload = protocol::decode_payload(&ack_payload).expect("decode");
        assert_eq!(ack.status, AckStatus::AlreadyExists);

        let err = receiver.await.expect("join").expect_err("session error");
        assert_eq!(err.reject_reason(), Some(AckStatus::AlreadyExists));

        let kept = std::fs::read(archive.join("done.bin")).expect("read archived");
        assert_eq!(kept, b"already here");
    }

    #[tokio::test]
    async fn test_slot_survives_mid_transfer_disconnect() {
        let temp = TempDir::new().expect("create temp dir");
        let archive = temp.path().to_path_buf();

        let size = 4 * PAYLOAD_SIZE;
        let (mut client, mut server) = tokio::io::duplex(64 * 1024);

        let archive_dir = archive.clone();
        let receiver = tokio::spawn(async move {
            let mut slot = TransferSlot::new();
            let result =
                receive_file(&mut server, &mut slot, &archive_dir, &mut NoopNotifier).await;
            (result, slot)
        });

        let offer = StartOfferPayload {
            name: "partial.bin".to_string(),
            size,
        };
        protocol::write_frame(
            &mut client,
            MessageType::StartOffer,
            &protocol::encode_payload(&offer).unwrap(),
        )
        .await
        .expect("write offer");
        protocol::read_expected(&mut client, MessageType::ResumeAck)
            .await
            .expect("read ack");

        // Deliver two of the four blocks, then drop the connection.
        for seq_num in 0..2 {
            let block = DataBlockPayload {
                seq_num,
                data: vec![seq_num as u8; PAYLOAD_SIZE as usize],
            };
            protocol::write_frame(
                &mut client,
                MessageType::DataBlock,
                &protocol::encode_data_block(&block),
            )
            .await
            .expect("write block");
            protocol::read_expected(&mut client, MessageType::DataAck)
                .await
                .expect("read data ack");
        }
        drop(client);

        let (result, slot) = receiver.await.expect("join");
        assert!(result.is_err(), "severed session must error");
        assert_eq!(slot.name, "partial.bin");
        assert_eq!(slot.next_block, 2);
        assert_eq!(slot.size, size);
    }
}
