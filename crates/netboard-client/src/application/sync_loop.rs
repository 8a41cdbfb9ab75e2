//! SyncLoop: keeps the local clipboard and the relay in step.
//!
//! Two paths run side by side:
//!
//! - **Local → relay** ([`LocalPublisher`]): every change reported by the
//!   clipboard watcher is fingerprinted.  If it differs from the last content
//!   *successfully* published, it is published.  A failed publish is logged
//!   and forgotten; the next change is handled normally.
//!
//! - **Relay → local** ([`RemoteApplier`]): every payload received from the
//!   relay is compared with the clipboard's current contents, read fresh.  If
//!   they already match the write is skipped, which stops a remote echo of our
//!   own change from being applied again.
//!
//! Each path owns its own fingerprint (`last_published`, `last_written`), so
//! the paths share no mutable state and need no lock.
//!
//! # Known echo
//!
//! Writing a remote update changes the local clipboard, so the watcher
//! reports it and the local path publishes it once (its `last_published`
//! still holds the previous local content).  Peers that already hold the
//! content skip it on their remote path, so the echo stops after one hop.
//! Folding both fingerprints into one would remove the echo but would need
//! synchronisation between the two paths.

use std::sync::Arc;

use bytes::Bytes;
use netboard_core::{ClipboardSnapshot, ContentFingerprint};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::ports::{Clipboard, Publish};

/// What [`LocalPublisher::on_local_change`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalOutcome {
    Published,
    Unchanged,
    Failed,
}

/// What [`RemoteApplier::on_remote_update`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    Written,
    AlreadyCurrent,
    Failed,
}

/// Counters for one run of the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub published: u64,
    pub unchanged: u64,
    pub publish_failures: u64,
    pub written: u64,
    pub already_current: u64,
    pub write_failures: u64,
}

/// Local-watch path.
pub struct LocalPublisher {
    publisher: Arc<dyn Publish>,
    last_published: Option<ContentFingerprint>,
    report: SyncReport,
}

impl LocalPublisher {
    pub fn new(publisher: Arc<dyn Publish>) -> Self {
        Self {
            publisher,
            last_published: None,
            report: SyncReport::default(),
        }
    }

    /// Fingerprint of the last content the relay accepted.
    pub fn last_published(&self) -> Option<ContentFingerprint> {
        self.last_published
    }

    /// Handles one change reported by the clipboard watcher.
    pub async fn on_local_change(&mut self, data: Bytes) -> LocalOutcome {
        let snapshot = ClipboardSnapshot::new(data);
        if self
            .last_published
            .is_some_and(|last| snapshot.same_content(&last))
        {
            self.report.unchanged += 1;
            debug!("local clipboard unchanged since last publish");
            return LocalOutcome::Unchanged;
        }

        match self.publisher.publish(snapshot.data.clone()).await {
            Ok(()) => {
                self.last_published = Some(snapshot.fingerprint);
                self.report.published += 1;
                info!(bytes = snapshot.data.len(), "local clipboard changed, relay updated");
                LocalOutcome::Published
            }
            Err(e) => {
                self.report.publish_failures += 1;
                warn!("error sending clipboard to relay: {e}");
                LocalOutcome::Failed
            }
        }
    }
}

/// Remote-listen path.
pub struct RemoteApplier {
    clipboard: Arc<dyn Clipboard>,
    last_written: Option<ContentFingerprint>,
    report: SyncReport,
}

impl RemoteApplier {
    pub fn new(clipboard: Arc<dyn Clipboard>) -> Self {
        Self {
            clipboard,
            last_written: None,
            report: SyncReport::default(),
        }
    }

    /// Fingerprint of the last content written to the local clipboard.
    pub fn last_written(&self) -> Option<ContentFingerprint> {
        self.last_written
    }

    /// Handles one payload received from the relay.
    pub async fn on_remote_update(&mut self, data: Bytes) -> RemoteOutcome {
        let incoming = ClipboardSnapshot::new(data);

        match self.clipboard.read().await {
            Ok(current) if incoming.same_content(&ContentFingerprint::of(&current)) => {
                self.report.already_current += 1;
                debug!("remote update matches local clipboard, skipping write");
                return RemoteOutcome::AlreadyCurrent;
            }
            Ok(_) => {}
            Err(e) => debug!("could not read local clipboard before applying update: {e}"),
        }

        match self.clipboard.write(incoming.data.clone()).await {
            Ok(()) => {
                self.last_written = Some(incoming.fingerprint);
                self.report.written += 1;
                info!(bytes = incoming.data.len(), "remote clipboard changed, local updated");
                RemoteOutcome::Written
            }
            Err(e) => {
                self.report.write_failures += 1;
                warn!("unable to write to local clipboard: {e}");
                RemoteOutcome::Failed
            }
        }
    }
}

/// Both paths, run together.
pub struct SyncLoop {
    local: LocalPublisher,
    remote: RemoteApplier,
}

impl SyncLoop {
    pub fn new(clipboard: Arc<dyn Clipboard>, publisher: Arc<dyn Publish>) -> Self {
        Self {
            local: LocalPublisher::new(publisher),
            remote: RemoteApplier::new(clipboard),
        }
    }

    /// Runs until `shutdown` is cancelled or both input channels close.
    ///
    /// `local_changes` is normally the clipboard watcher's channel and
    /// `remote_updates` the subscription's.  The two paths are polled
    /// concurrently; a slow publish never delays applying a remote update.
    pub async fn run(
        self,
        mut local_changes: mpsc::Receiver<Bytes>,
        mut remote_updates: mpsc::Receiver<Bytes>,
        shutdown: CancellationToken,
    ) -> SyncReport {
        let Self {
            mut local,
            mut remote,
        } = self;

        let local_path = async {
            while let Some(data) = next_or_cancel(&mut local_changes, &shutdown).await {
                local.on_local_change(data).await;
            }
            local.report
        };
        let remote_path = async {
            while let Some(data) = next_or_cancel(&mut remote_updates, &shutdown).await {
                remote.on_remote_update(data).await;
            }
            remote.report
        };

        let (local_report, remote_report) = tokio::join!(local_path, remote_path);
        let report = SyncReport {
            published: local_report.published,
            unchanged: local_report.unchanged,
            publish_failures: local_report.publish_failures,
            written: remote_report.written,
            already_current: remote_report.already_current,
            write_failures: remote_report.write_failures,
        };
        info!(?report, "sync loop stopped");
        report
    }
}

async fn next_or_cancel(
    rx: &mut mpsc::Receiver<Bytes>,
    shutdown: &CancellationToken,
) -> Option<Bytes> {
    tokio::select! {
        _ = shutdown.cancelled() => None,
        item = rx.recv() => item,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
