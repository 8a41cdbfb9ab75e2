//! Two sync loops joined through an in-process stand-in for the relay.
//!
//! The stand-in forwards every publish to every other host, like the relay's
//! dispatcher, so the full local → relay → remote → local path can be
//! exercised without sockets.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use netboard_client::application::ports::{Clipboard, Publish, PublishError};
use netboard_client::application::sync_loop::{SyncLoop, SyncReport};
use netboard_client::infrastructure::clipboard::MemoryClipboard;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct LoopbackRelay {
    peers: Mutex<Vec<(usize, mpsc::Sender<Bytes>)>>,
    publishes: AtomicUsize,
}

struct PeerPublisher {
    id: usize,
    relay: Arc<LoopbackRelay>,
}

#[async_trait]
impl Publish for PeerPublisher {
    async fn publish(&self, data: Bytes) -> Result<(), PublishError> {
        self.relay.publishes.fetch_add(1, Ordering::SeqCst);
        let peers = self.relay.peers.lock().unwrap();
        for (id, tx) in peers.iter() {
            if *id != self.id {
                let _ = tx.try_send(data.clone());
            }
        }
        Ok(())
    }
}

struct Host {
    clipboard: Arc<MemoryClipboard>,
    handle: JoinHandle<SyncReport>,
}

fn start_host(id: usize, relay: &Arc<LoopbackRelay>, shutdown: &CancellationToken) -> Host {
    let clipboard = Arc::new(MemoryClipboard::new());
    let (remote_tx, remote_rx) = mpsc::channel(16);
    relay.peers.lock().unwrap().push((id, remote_tx));

    let local_rx = Arc::clone(&clipboard).watch(shutdown.clone());
    let publisher = Arc::new(PeerPublisher {
        id,
        relay: Arc::clone(relay),
    });
    let sync = SyncLoop::new(clipboard.clone(), publisher);
    let handle = tokio::spawn(sync.run(local_rx, remote_rx, shutdown.clone()));

    Host { clipboard, handle }
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met within 5s");
}

#[tokio::test]
async fn test_copy_on_one_host_reaches_the_other_without_feedback_loop() {
    // Arrange
    let relay = Arc::new(LoopbackRelay::default());
    let shutdown = CancellationToken::new();
    let a = start_host(0, &relay, &shutdown);
    let b = start_host(1, &relay, &shutdown);

    // Act
    a.clipboard.set_local("hello from a");
    wait_for(|| b.clipboard.contents() == Bytes::from_static(b"hello from a")).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Assert: A published once, B echoed once, and the echo stopped at A
    assert_eq!(b.clipboard.writes(), vec![Bytes::from_static(b"hello from a")]);
    assert!(a.clipboard.writes().is_empty());
    assert_eq!(relay.publishes.load(Ordering::SeqCst), 2);

    shutdown.cancel();
    let report_a = a.handle.await.unwrap();
    let report_b = b.handle.await.unwrap();
    assert_eq!(report_a.published, 1);
    assert_eq!(report_a.already_current, 1);
    assert_eq!(report_b.written, 1);
}

#[tokio::test]
async fn test_alternating_copies_converge_on_latest_content() {
    let relay = Arc::new(LoopbackRelay::default());
    let shutdown = CancellationToken::new();
    let a = start_host(0, &relay, &shutdown);
    let b = start_host(1, &relay, &shutdown);

    a.clipboard.set_local("one");
    wait_for(|| b.clipboard.contents() == Bytes::from_static(b"one")).await;
    b.clipboard.set_local("two");
    wait_for(|| a.clipboard.contents() == Bytes::from_static(b"two")).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(a.clipboard.contents(), Bytes::from_static(b"two"));
    assert_eq!(b.clipboard.contents(), Bytes::from_static(b"two"));
    assert_eq!(a.clipboard.writes(), vec![Bytes::from_static(b"two")]);
    assert_eq!(b.clipboard.writes(), vec![Bytes::from_static(b"one")]);
    shutdown.cancel();
}
