//! FRRY wire protocol implementation.
//!
//! Ferry uses a lightweight framed binary protocol over a plain TCP stream.
//!
//! ## Frame Format
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      FRRY Frame                            │
//! ├────────────┬────────────┬────────────┬─────────────────────┤
//! │   Magic    │  Version   │    Type    │      Length         │
//! │  4 bytes   │  2 bytes   │   1 byte   │      4 bytes        │
//! ├────────────┴────────────┴────────────┴─────────────────────┤
//! │                        Payload                             │
//! │                    (variable length)                       │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! - Magic: `0x46 0x52 0x52 0x59` ("FRRY")
//! - Version: `0x01 0x00` (1.0)
//! - Type: Message type byte
//! - Length: Payload length in bytes (big-endian)
//!
//! Control payloads (`StartOffer`, `ResumeAck`, `DataAck`, `Submit`) are
//! JSON-encoded; `DataBlock` payloads are binary (sequence number followed
//! by the raw block bytes) so file content is never re-encoded.
//!
//! A transfer session is exactly four message shapes: the client offers a
//! file, the server acknowledges with the next block it expects, then the
//! two sides alternate `DataBlock`/`DataAck` until every block of the file
//! has been acknowledged. There is no termination message; completion is
//! implicit in the block count.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::PAYLOAD_SIZE;

/// Protocol magic bytes: "FRRY"
pub const MAGIC: [u8; 4] = [0x46, 0x52, 0x52, 0x59];

/// Frame header size in bytes
pub const HEADER_SIZE: usize = 11;

/// Maximum payload size (64 KB). Data blocks are far smaller; this bounds
/// memory per frame against a malformed or hostile peer.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Message types in the FRRY protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Client declares the file it wants to transfer
    StartOffer = 0x01,
    /// Server replies with the next expected block (or a rejection)
    ResumeAck = 0x02,
    /// One block of file content
    DataBlock = 0x10,
    /// Server confirms a block was written
    DataAck = 0x11,
    /// Local submission of a file path to the daemon
    Submit = 0x20,
}

impl MessageType {
    /// Parse a message type from a byte.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::StartOffer),
            0x02 => Some(Self::ResumeAck),
            0x10 => Some(Self::DataBlock),
            0x11 => Some(Self::DataAck),
            0x20 => Some(Self::Submit),
            _ => None,
        }
    }
}

/// Outcome the server reports in a [`ResumeAckPayload`] before any bulk
/// data moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    /// Transfer accepted; `seq_num` is the next block the server expects
    Ok,
    /// A finished file with this name is already in the archive
    AlreadyExists,
    /// The offer carried an empty or otherwise unusable file name
    EmptyFilename,
    /// The server is mid-transfer on a different file
    WrongFile,
    /// The server could not open the archive file for writing
    OpenFailed,
}

impl std::fmt::Display for AckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::Ok => "ok",
            Self::AlreadyExists => "the file already exists in the archive",
            Self::EmptyFilename => "the offered file name is empty",
            Self::WrongFile => "a different file is currently in progress",
            Self::OpenFailed => "the server could not open the file for writing",
        };
        f.write_str(msg)
    }
}

/// A protocol frame header.
#[derive(Debug, Clone)]
pub struct FrameHeader {
    /// Protocol version (major, minor)
    pub version: (u8, u8),
    /// Message type
    pub message_type: MessageType,
    /// Payload length
    pub payload_length: u32,
}

impl FrameHeader {
    /// Encode the header to bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4] = self.version.0;
        buf[5] = self.version.1;
        buf[6] = self.message_type as u8;
        buf[7..11].copy_from_slice(&self.payload_length.to_be_bytes());
        buf
    }

    /// Decode a header from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is invalid.
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Result<Self> {
        if buf[0..4] != MAGIC {
            return Err(Error::Protocol("invalid magic bytes".to_string()));
        }

        let version = (buf[4], buf[5]);
        if version.0 != crate::PROTOCOL_VERSION.0 {
            return Err(Error::UnsupportedVersion {
                major: version.0,
                minor: version.1,
            });
        }

        let message_type = MessageType::from_byte(buf[6])
            .ok_or_else(|| Error::Protocol(format!("unknown message type: {:#x}", buf[6])))?;

        let payload_length = u32::from_be_bytes([buf[7], buf[8], buf[9], buf[10]]);

        if payload_length as usize > MAX_PAYLOAD_SIZE {
            return Err(Error::Protocol(format!(
                "payload too large: {payload_length} bytes"
            )));
        }

        Ok(Self {
            version,
            message_type,
            payload_length,
        })
    }
}

/// Start offer payload: the client's declaration of the file it wants to
/// transfer. `name` is the basename only; the server decides the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartOfferPayload {
    /// File basename
    pub name: String,
    /// Total file size in bytes
    pub size: u64,
}

/// Resume acknowledgement payload.
///
/// On `status == Ok`, `seq_num` is the next block index the server expects:
/// 0 for a fresh file, greater when resuming. `name` and `size` echo the
/// file currently held by the server's transfer slot (empty when idle).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeAckPayload {
    /// Current in-progress file name (empty on rejection from idle)
    #[serde(default)]
    pub name: String,
    /// Current in-progress file size
    #[serde(default)]
    pub size: u64,
    /// Next block index the server expects
    #[serde(default)]
    pub seq_num: u64,
    /// Accept/reject outcome
    pub status: AckStatus,
}

impl ResumeAckPayload {
    /// A rejection carrying only the status, as sent when an offer is
    /// refused before any data moves.
    #[must_use]
    pub fn rejection(status: AckStatus) -> Self {
        Self {
            name: String::new(),
            size: 0,
            seq_num: 0,
            status,
        }
    }
}

/// Block acknowledgement payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataAckPayload {
    /// Block index that has been written at its file position
    pub seq_num: u64,
}

/// Submission payload: one absolute local path per connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitPayload {
    /// Absolute path of the file to upload
    pub path: PathBuf,
}

/// A data block payload (binary).
#[derive(Debug, Clone)]
pub struct DataBlockPayload {
    /// Block index within the file
    pub seq_num: u64,
    /// Block content; `PAYLOAD_SIZE` bytes except possibly the last block
    pub data: Vec<u8>,
}

/// Number of blocks a file of `size` bytes occupies. A zero-byte file has
/// zero blocks and completes immediately after the resume acknowledgement.
#[must_use]
pub const fn num_blocks(size: u64) -> u64 {
    size.div_ceil(PAYLOAD_SIZE)
}

/// Absolute file offset of block `seq_num`.
#[must_use]
pub const fn block_offset(seq_num: u64) -> u64 {
    seq_num * PAYLOAD_SIZE
}

/// Encode a message payload to JSON bytes.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_payload<T: Serialize>(payload: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(payload).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode a message payload from JSON bytes.
///
/// # Errors
///
/// Returns an error if deserialization fails.
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T> {
    serde_json::from_slice(data).map_err(|e| Error::Serialization(e.to_string()))
}

/// Encode a `DataBlock` payload (binary format).
///
/// Format: seq_num (8 bytes, big-endian) | data
#[must_use]
pub fn encode_data_block(payload: &DataBlockPayload) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + payload.data.len());
    buf.extend_from_slice(&payload.seq_num.to_be_bytes());
    buf.extend_from_slice(&payload.data);
    buf
}

/// Decode a `DataBlock` payload (binary format).
///
/// # Errors
///
/// Returns an error if the payload is too short.
pub fn decode_data_block(data: &[u8]) -> Result<DataBlockPayload> {
    if data.len() < 8 {
        return Err(Error::Protocol("data block payload too short".to_string()));
    }

    let seq_num = u64::from_be_bytes([
        data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
    ]);

    Ok(DataBlockPayload {
        seq_num,
        data: data[8..].to_vec(),
    })
}

/// Read a complete frame from a stream.
///
/// The frame is consumed atomically with respect to message boundaries: the
/// caller either gets a whole decoded frame or an error, never a partial
/// message.
///
/// # Errors
///
/// Returns an error if reading fails or the frame is invalid.
pub async fn read_frame<R>(reader: &mut R) -> Result<(FrameHeader, Vec<u8>)>
where
    R: AsyncRead + Unpin,
{
    let mut header_buf = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header_buf).await?;

    let header = FrameHeader::decode(&header_buf)?;

    let mut payload = vec![0u8; header.payload_length as usize];
    if header.payload_length > 0 {
        reader.read_exact(&mut payload).await?;
    }

    Ok((header, payload))
}

/// Write a complete frame to a stream and flush it.
///
/// # Errors
///
/// Returns an error if writing fails.
pub async fn write_frame<W>(writer: &mut W, message_type: MessageType, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    #[allow(clippy::cast_possible_truncation)]
    let header = FrameHeader {
        version: crate::PROTOCOL_VERSION,
        message_type,
        payload_length: payload.len() as u32,
    };

    writer.write_all(&header.encode()).await?;
    if !payload.is_empty() {
        writer.write_all(payload).await?;
    }
    writer.flush().await?;

    Ok(())
}

/// Read a frame and require it to be of the given type.
///
/// # Errors
///
/// Returns [`Error::UnexpectedMessage`] on a type mismatch, or any frame
/// read error.
pub async fn read_expected<R>(reader: &mut R, expected: MessageType) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let (header, payload) = read_frame(reader).await?;
    if header.message_type != expected {
        return Err(Error::UnexpectedMessage {
            expected: format!("{expected:?}"),
            actual: format!("{:?}", header.message_type),
        });
    }
    Ok(payload)
}
