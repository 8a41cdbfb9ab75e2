//! Capabilities the sync loop needs from the outside world.
//!
//! The sync loop only talks to these traits.  Concrete implementations live in
//! the infrastructure layer:
//!
//! - [`Clipboard`]: `NativeClipboard` (arboard), `WlClipboard` (wl-clipboard
//!   tools) and `MemoryClipboard` (tests).
//! - [`Publish`]: `HttpPublisher` (`POST /publish`).
//!
//! The backend is picked once at startup from configuration; nothing
//! downstream inspects which one it got.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Error type for clipboard operations.
#[derive(Debug, Error)]
pub enum ClipboardError {
    /// The backend cannot be used on this system (missing tool, no display).
    #[error("clipboard backend unavailable: {0}")]
    Unavailable(String),

    #[error("clipboard read failed: {0}")]
    Read(String),

    #[error("clipboard write failed: {0}")]
    Write(String),

    #[error("clipboard I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error type for publishing a local change to the relay.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The request could not be sent or its response not received.
    #[error("publish request failed: {0}")]
    Request(String),

    /// The relay answered with something other than `204 No Content`.
    #[error("relay rejected publish with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Access to the local clipboard.
#[async_trait]
pub trait Clipboard: Send + Sync + 'static {
    /// Backend name for log lines.
    fn backend(&self) -> &'static str;

    /// Reads the current clipboard contents.
    async fn read(&self) -> Result<Bytes, ClipboardError>;

    /// Replaces the clipboard contents.
    async fn write(&self, data: Bytes) -> Result<(), ClipboardError>;

    /// Starts watching for changes.
    ///
    /// Every change (including those caused by [`Clipboard::write`]) is
    /// reported with the new contents on the returned channel until
    /// `shutdown` is cancelled.  Changes that arrive while the channel is
    /// full may be dropped.
    fn watch(self: Arc<Self>, shutdown: CancellationToken) -> mpsc::Receiver<Bytes>;
}

/// Sends one clipboard payload to the relay.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publish: Send + Sync {
    /// Publishes `data` once.  No retry.
    async fn publish(&self, data: Bytes) -> Result<(), PublishError>;
}
