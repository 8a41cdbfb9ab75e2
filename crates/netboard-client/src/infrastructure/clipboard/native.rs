//! Native clipboard backend ("lib" mode) built on `arboard`.
//!
//! Only text is synced.  `arboard` calls are blocking, so each one runs on
//! Tokio's blocking pool.  `arboard` has no change notification, so changes
//! are detected by polling.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{Clipboard, ClipboardError};
use crate::infrastructure::clipboard::spawn_poll_watcher;

/// How often the clipboard is read to detect changes.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Clipboard backed by the platform clipboard API.
pub struct NativeClipboard {
    inner: Arc<Mutex<arboard::Clipboard>>,
}

impl NativeClipboard {
    /// Connects to the platform clipboard.
    ///
    /// # Errors
    ///
    /// Returns [`ClipboardError::Unavailable`] if no clipboard can be opened
    /// (for example, no display server).
    pub fn new() -> Result<Self, ClipboardError> {
        let clipboard = arboard::Clipboard::new()
            .map_err(|e| ClipboardError::Unavailable(format!("unable to initialize clipboard: {e}")))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(clipboard)),
        })
    }

    async fn with_clipboard<T, F>(&self, op: F) -> Result<T, ClipboardError>
    where
        T: Send + 'static,
        F: FnOnce(&mut arboard::Clipboard) -> Result<T, ClipboardError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut clipboard = inner.lock().unwrap_or_else(PoisonError::into_inner);
            op(&mut clipboard)
        })
        .await
        .map_err(|e| ClipboardError::Unavailable(format!("clipboard task failed: {e}")))?
    }
}

#[async_trait]
impl Clipboard for NativeClipboard {
    fn backend(&self) -> &'static str {
        "lib"
    }

    async fn read(&self) -> Result<Bytes, ClipboardError> {
        self.with_clipboard(|clipboard| match clipboard.get_text() {
            Ok(text) => Ok(Bytes::from(text)),
            // An empty or non-text clipboard reads as empty text.
            Err(arboard::Error::ContentNotAvailable) => Ok(Bytes::new()),
            Err(e) => Err(ClipboardError::Read(e.to_string())),
        })
        .await
    }

    async fn write(&self, data: Bytes) -> Result<(), ClipboardError> {
        let text = String::from_utf8_lossy(&data).into_owned();
        self.with_clipboard(move |clipboard| {
            clipboard
                .set_text(text)
                .map_err(|e| ClipboardError::Write(e.to_string()))
        })
        .await
    }

    fn watch(self: Arc<Self>, shutdown: CancellationToken) -> mpsc::Receiver<Bytes> {
        spawn_poll_watcher(self, POLL_INTERVAL, shutdown)
    }
}
