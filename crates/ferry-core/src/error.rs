//! Error types for Ferry.
//!
//! This module provides a unified error type for all Ferry operations.
//! Rejections reported by the server before bulk data are carried as
//! [`Error::Rejected`] with the wire-level [`AckStatus`] reason; everything
//! else is a local failure of the session, the codec, or the file system.

use std::io;

use thiserror::Error;

use crate::protocol::AckStatus;

/// A specialized `Result` type for Ferry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Ferry.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error (dialing, file access, stream reads and writes)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Payload serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid frame on the wire (bad magic, unknown type, oversized payload)
    #[error("invalid protocol frame: {0}")]
    Protocol(String),

    /// Unsupported protocol version
    #[error("unsupported protocol version: {major}.{minor}")]
    UnsupportedVersion {
        /// Major version
        major: u8,
        /// Minor version
        minor: u8,
    },

    /// A frame of the wrong type arrived at this point in the exchange
    #[error("unexpected message: expected {expected}, got {actual}")]
    UnexpectedMessage {
        /// Expected message type
        expected: String,
        /// Actual message type received
        actual: String,
    },

    /// An acknowledgement or block carried the wrong sequence number
    #[error("sequence mismatch: expected block {expected}, got {actual}")]
    SequenceMismatch {
        /// The block number this side was waiting for
        expected: u64,
        /// The block number the peer sent
        actual: u64,
    },

    /// The local file ended before the declared size was read
    #[error("file ended at block {block}, expected the last block to be {last}")]
    UnexpectedEof {
        /// Block index at which end of file was hit
        block: u64,
        /// Last block index the declared size implies
        last: u64,
    },

    /// The server refused the transfer before any data was exchanged
    #[error("server rejected transfer: {0}")]
    Rejected(AckStatus),

    /// A submitted path is unusable (not absolute, no file name, missing)
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Configuration file error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns the server's rejection reason, if this error is one.
    #[must_use]
    pub const fn reject_reason(&self) -> Option<AckStatus> {
        match self {
            Self::Rejected(status) => Some(*status),
            _ => None,
        }
    }
}
