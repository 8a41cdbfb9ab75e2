//! Clipboard backends.
//!
//! | Mode           | Type               | Mechanism                                  |
//! |----------------|--------------------|--------------------------------------------|
//! | `lib`          | [`NativeClipboard`]| `arboard` (text), polled for changes       |
//! | `wl-clipboard` | [`WlClipboard`]    | `wl-paste` / `wl-copy` child processes     |
//! | tests          | [`MemoryClipboard`]| in-memory buffer with change notifications |
//!
//! [`open_clipboard`] turns the configured [`ClipboardMode`] into a
//! `Arc<dyn Clipboard>` once at startup.

pub mod memory;
pub mod native;
pub mod wayland;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use netboard_core::ContentFingerprint;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::application::ports::{Clipboard, ClipboardError};

pub use memory::MemoryClipboard;
pub use native::NativeClipboard;
pub use wayland::WlClipboard;

/// Capacity of the channel returned by [`Clipboard::watch`].
pub const WATCH_CHANNEL_CAPACITY: usize = 16;

/// Which clipboard backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClipboardMode {
    /// Native clipboard API through `arboard`.
    Lib,
    /// External `wl-clipboard` tools (Wayland).
    #[default]
    WlClipboard,
}

impl fmt::Display for ClipboardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lib => "lib",
            Self::WlClipboard => "wl-clipboard",
        })
    }
}

impl FromStr for ClipboardMode {
    type Err = ClipboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lib" => Ok(Self::Lib),
            "wl-clipboard" => Ok(Self::WlClipboard),
            other => Err(ClipboardError::Unavailable(format!(
                "unknown clipboard mode '{other}' (expected 'lib' or 'wl-clipboard')"
            ))),
        }
    }
}

/// Opens the backend for `mode`.
///
/// # Errors
///
/// Returns [`ClipboardError::Unavailable`] if the backend cannot work here,
/// for example when `wl-copy` is not installed or no display is reachable.
pub fn open_clipboard(mode: ClipboardMode) -> Result<Arc<dyn Clipboard>, ClipboardError> {
    Ok(match mode {
        ClipboardMode::Lib => Arc::new(NativeClipboard::new()?),
        ClipboardMode::WlClipboard => Arc::new(WlClipboard::new()?),
    })
}

/// Looks `program` up on `PATH`.
pub fn find_on_path(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Watches `clipboard` by reading it every `interval` and reporting content
/// that differs from the previous read.
///
/// The contents at start-up are the baseline and are not reported.
pub fn spawn_poll_watcher<C: Clipboard + ?Sized>(
    clipboard: Arc<C>,
    interval: Duration,
    shutdown: CancellationToken,
) -> mpsc::Receiver<Bytes> {
    let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut last = clipboard.read().await.ok().map(|d| ContentFingerprint::of(&d));
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tx.closed() => break,
                _ = ticker.tick() => {}
            }

            let data = match clipboard.read().await {
                Ok(data) => data,
                Err(e) => {
                    debug!(backend = clipboard.backend(), "clipboard poll failed: {e}");
                    continue;
                }
            };
            let fingerprint = ContentFingerprint::of(&data);
            if last == Some(fingerprint) {
                continue;
            }
            last = Some(fingerprint);
            if tx.try_send(data).is_err() {
                warn!(backend = clipboard.backend(), "clipboard change dropped, consumer is behind");
            }
        }
    });

    rx
}

// ── Tests ─────────────────────────────────────────────────────────────────────
