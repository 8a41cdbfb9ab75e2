//! Wayland clipboard backend ("wl-clipboard" mode).
//!
//! Drives the `wl-clipboard` command-line tools:
//!
//! | Operation | Command                          |
//! |-----------|----------------------------------|
//! | read      | `wl-paste --no-newline`          |
//! | write     | `wl-copy --trim-newline` (stdin) |
//! | watch     | `wl-paste --no-newline -w echo`  |
//!
//! The watch command runs `echo` on every clipboard change, which prints one
//! empty line.  Each line triggers a fresh read.  If the watcher process
//! exits it is restarted after [`WATCHER_RESTART_DELAY`].

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::application::ports::{Clipboard, ClipboardError};
use crate::infrastructure::clipboard::{find_on_path, WATCH_CHANNEL_CAPACITY};

/// Pause before restarting a watcher process that exited.
pub const WATCHER_RESTART_DELAY: Duration = Duration::from_secs(1);

/// Clipboard driven through `wl-paste` and `wl-copy`.
#[derive(Debug, Clone)]
pub struct WlClipboard {
    paste: PathBuf,
    copy: PathBuf,
}

impl WlClipboard {
    /// Locates the tools on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`ClipboardError::Unavailable`] if either binary is missing.
    pub fn new() -> Result<Self, ClipboardError> {
        let copy = find_on_path("wl-copy").ok_or_else(|| missing_tool("wl-copy"))?;
        let paste = find_on_path("wl-paste").ok_or_else(|| missing_tool("wl-paste"))?;
        Ok(Self { paste, copy })
    }

    /// Uses explicit tool paths.
    pub fn with_tools(paste: impl Into<PathBuf>, copy: impl Into<PathBuf>) -> Self {
        Self {
            paste: paste.into(),
            copy: copy.into(),
        }
    }

    /// Runs one watcher process until it exits or `shutdown` fires.
    async fn watch_once(
        &self,
        tx: &mpsc::Sender<Bytes>,
        shutdown: &CancellationToken,
    ) -> Result<(), ClipboardError> {
        let mut child = Command::new(&self.paste)
            .args(["--no-newline", "-w", "echo"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClipboardError::Read("watcher stdout not captured".into()))?;
        let mut lines = BufReader::new(stdout).lines();

        loop {
            let line = tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                line = lines.next_line() => line?,
            };
            if line.is_none() {
                break;
            }
            match self.read().await {
                Ok(data) => {
                    if tx.try_send(data).is_err() {
                        debug!("clipboard change dropped, consumer is behind");
                    }
                }
                Err(e) => warn!("unable to read clipboard after change: {e}"),
            }
        }

        let status = child.wait().await?;
        Err(ClipboardError::Read(format!("wl-paste watcher exited with {status}")))
    }
}

fn missing_tool(name: &str) -> ClipboardError {
    ClipboardError::Unavailable(format!(
        "unable to find {name} binary: either install wl-clipboard or try another mode"
    ))
}

#[async_trait]
impl Clipboard for WlClipboard {
    fn backend(&self) -> &'static str {
        "wl-clipboard"
    }

    async fn read(&self) -> Result<Bytes, ClipboardError> {
        let output = Command::new(&self.paste)
            .arg("--no-newline")
            .stdin(Stdio::null())
            .output()
            .await?;
        if !output.status.success() {
            return Err(ClipboardError::Read(format!(
                "wl-paste exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(Bytes::from(output.stdout))
    }

    async fn write(&self, data: Bytes) -> Result<(), ClipboardError> {
        let mut child = Command::new(&self.copy)
            .arg("--trim-newline")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClipboardError::Write("wl-copy stdin not captured".into()))?;
        stdin.write_all(&data).await?;
        drop(stdin);

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(ClipboardError::Write(format!(
                "wl-copy exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    fn watch(self: Arc<Self>, shutdown: CancellationToken) -> mpsc::Receiver<Bytes> {
        let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            while !shutdown.is_cancelled() && !tx.is_closed() {
                if let Err(e) = self.watch_once(&tx, &shutdown).await {
                    warn!("error while listening to wl-paste (restarting): {e}");
                }
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(WATCHER_RESTART_DELAY) => {}
                }
            }
        });

        rx
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
