//! In-memory clipboard for tests.
//!
//! The real backends need a desktop session, touch the user's actual
//! clipboard, and cannot be observed from test code.  `MemoryClipboard`
//! keeps the contents in a buffer and behaves like a real clipboard where it
//! matters for syncing:
//!
//! - every [`Clipboard::write`] is recorded so tests can assert on it;
//! - every change, whether from `write` or from [`MemoryClipboard::set_local`]
//!   (a simulated user copy), is reported to watchers, exactly as a real
//!   watcher would see the result of our own write.
//!
//! Set [`MemoryClipboard::fail_writes`] to exercise error paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{Clipboard, ClipboardError};
use crate::infrastructure::clipboard::WATCH_CHANNEL_CAPACITY;

#[derive(Debug, Default)]
struct MemoryState {
    contents: Bytes,
    writes: Vec<Bytes>,
}

/// A clipboard that lives in memory.
#[derive(Debug)]
pub struct MemoryClipboard {
    state: Mutex<MemoryState>,
    changes: broadcast::Sender<Bytes>,
    fail_writes: AtomicBool,
}

impl Default for MemoryClipboard {
    fn default() -> Self {
        Self::with_contents(Bytes::new())
    }
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clipboard already holding `contents`.
    pub fn with_contents(contents: impl Into<Bytes>) -> Self {
        let (changes, _) = broadcast::channel(WATCH_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(MemoryState {
                contents: contents.into(),
                writes: Vec::new(),
            }),
            changes,
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Simulates the user copying `contents` on this host.
    pub fn set_local(&self, contents: impl Into<Bytes>) {
        let contents = contents.into();
        self.lock().contents = contents.clone();
        let _ = self.changes.send(contents);
    }

    /// Current contents.
    pub fn contents(&self) -> Bytes {
        self.lock().contents.clone()
    }

    /// Every payload passed to [`Clipboard::write`], in order.
    pub fn writes(&self) -> Vec<Bytes> {
        self.lock().writes.clone()
    }

    /// Makes subsequent writes fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn read(&self) -> Result<Bytes, ClipboardError> {
        Ok(self.contents())
    }

    async fn write(&self, data: Bytes) -> Result<(), ClipboardError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(ClipboardError::Write("simulated failure".into()));
        }
        {
            let mut state = self.lock();
            state.contents = data.clone();
            state.writes.push(data.clone());
        }
        let _ = self.changes.send(data);
        Ok(())
    }

    fn watch(self: Arc<Self>, shutdown: CancellationToken) -> mpsc::Receiver<Bytes> {
        let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);
        let mut changes = self.changes.subscribe();

        tokio::spawn(async move {
            loop {
                let change = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tx.closed() => break,
                    change = changes.recv() => change,
                };
                match change {
                    Ok(data) => {
                        let _ = tx.try_send(data);
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_is_recorded_and_readable() {
        // Arrange
        let clipboard = MemoryClipboard::new();

        // Act
        clipboard.write(Bytes::from_static(b"abc")).await.unwrap();

        // Assert
        assert_eq!(clipboard.read().await.unwrap(), Bytes::from_static(b"abc"));
        assert_eq!(clipboard.writes(), vec![Bytes::from_static(b"abc")]);
    }

    #[tokio::test]
    async fn test_watch_reports_writes_and_local_copies() {
        let clipboard = Arc::new(MemoryClipboard::new());
        let shutdown = CancellationToken::new();
        let mut rx = Arc::clone(&clipboard).watch(shutdown.clone());

        clipboard.set_local("copied");
        clipboard.write(Bytes::from_static(b"written")).await.unwrap();

        assert_eq!(rx.recv().await, Some(Bytes::from_static(b"copied")));
        assert_eq!(rx.recv().await, Some(Bytes::from_static(b"written")));
        assert_eq!(clipboard.writes().len(), 1, "set_local is not a write");
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_failed_write_leaves_contents_untouched() {
        let clipboard = MemoryClipboard::with_contents("keep");
        clipboard.fail_writes(true);

        let result = clipboard.write(Bytes::from_static(b"lost")).await;

        assert!(matches!(result, Err(ClipboardError::Write(_))));
        assert_eq!(clipboard.contents(), Bytes::from_static(b"keep"));
    }
}
