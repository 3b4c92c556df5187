//! # Ferry Core Library
//!
//! `ferry-core` provides the building blocks for Ferry, a small system that
//! reliably delivers files from a client host to an archive server over TCP.
//!
//! ## How it works
//!
//! - A long-running [`daemon`] on the client host accepts local submissions
//!   of file paths and uploads them one at a time, in submission order.
//! - The [`server`] accepts connections sequentially and writes received
//!   blocks into the archive directory at absolute file positions.
//! - The [`session`] engine runs the stop-and-wait exchange on both sides:
//!   one start offer, one resume acknowledgement, then data/ack pairs until
//!   the file is complete.
//! - If a connection dies mid-transfer, the server keeps its progress in
//!   memory and the daemon reconnects with exponential backoff; the next
//!   session picks up from the first unacknowledged block.
//!
//! ## Modules
//!
//! - [`config`] - Configuration loading and defaults
//! - [`daemon`] - Client-side submission queue, director, and retry loop
//! - [`error`] - Unified error type
//! - [`protocol`] - FRRY wire protocol (framing and message payloads)
//! - [`server`] - Archive server accept loop and resumption slot
//! - [`session`] - Stop-and-wait transfer engine (send and receive roles)
//!
//! ## Example
//!
//! ```rust,ignore
//! use ferry_core::daemon::{self, FerryDaemon};
//! use ferry_core::server::ArchiveServer;
//! use ferry_core::session::NoopNotifier;
//!
//! // Archive host
//! let mut server = ArchiveServer::bind("0.0.0.0:7941", "/srv/archive").await?;
//! server.serve(|| NoopNotifier).await?;
//!
//! // Client host
//! let ferry = FerryDaemon::new("127.0.0.1:7940", "archive.example:7941");
//! ferry.serve().await?;
//!
//! // Any local process
//! daemon::submit("/home/me/backup.tar", "127.0.0.1:7940").await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]

use std::time::Duration;

pub mod config;
pub mod daemon;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;

pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol version for FRRY
pub const PROTOCOL_VERSION: (u8, u8) = (1, 0);

/// Fixed block payload size in bytes. Both sides must agree; a block carries
/// exactly this many bytes except possibly the last block of a file.
pub const PAYLOAD_SIZE: u64 = 4096;

/// Default port where the daemon accepts local submissions.
pub const DEFAULT_DAEMON_PORT: u16 = 7940;

/// Default port where the archive server accepts transfers.
pub const DEFAULT_TRANSFER_PORT: u16 = 7941;

/// First retry delay after a failed dial or session.
pub const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Backoff ceiling for the upload retry loop.
pub const MAX_RETRY_TIME: Duration = Duration::from_secs(20);
