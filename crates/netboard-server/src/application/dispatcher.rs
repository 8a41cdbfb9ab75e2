//! Dispatcher: the in-memory registry of live subscribers.
//!
//! Each subscribe connection registers its [`PeerIdentity`] and receives a
//! [`Subscription`], the read side of a bounded queue.  A publish is turned
//! into one [`Frame`] and offered to every *other* registered subscriber with
//! a non-blocking enqueue.
//!
//! # Delivery semantics
//!
//! - Best effort, at most once per subscriber.
//! - A full queue drops the frame for that subscriber only; the publisher and
//!   the other subscribers are unaffected.
//! - A subscriber registered while a dispatch is running may or may not see
//!   that frame.
//!
//! # Locking
//!
//! The registry is a `HashMap` behind a `std::sync::RwLock`.  Registration
//! changes take the write lock; dispatch takes the read lock.  Neither holds
//! the lock across an `.await`, so a synchronous lock is enough.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use netboard_core::{Frame, PeerIdentity};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, trace};

/// Outcome of one [`Dispatcher::dispatch`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Subscribers whose queue accepted the frame.
    pub delivered: usize,
    /// Subscribers that were skipped because their queue was full or closed.
    pub dropped: usize,
}

/// Monotonic counters describing the dispatcher's lifetime activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    pub registrations: u64,
    pub unregistrations: u64,
    pub frames_dispatched: u64,
    pub frames_delivered: u64,
    pub frames_dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    registrations: AtomicU64,
    unregistrations: AtomicU64,
    frames_dispatched: AtomicU64,
    frames_delivered: AtomicU64,
    frames_dropped: AtomicU64,
}

/// Registry entry for one live subscribe connection.
#[derive(Debug)]
struct Entry {
    sender: mpsc::Sender<Frame>,
    generation: u64,
}

/// The pub/sub broker.
///
/// Construct one per relay and share it as `Arc<Dispatcher>`.
#[derive(Debug)]
pub struct Dispatcher {
    subscribers: RwLock<HashMap<PeerIdentity, Entry>>,
    queue_capacity: usize,
    next_generation: AtomicU64,
    counters: Counters,
}

impl Dispatcher {
    /// Creates an empty dispatcher whose subscriber queues hold
    /// `queue_capacity` frames each (at least one).
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
            next_generation: AtomicU64::new(1),
            counters: Counters::default(),
        }
    }

    /// Capacity of every subscriber queue.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Registers `id` and returns the read side of its new queue.
    ///
    /// Registering an id that is already present replaces its entry: the old
    /// queue's sender is dropped, so the old [`Subscription`] drains whatever
    /// was already queued and then ends.
    ///
    /// Identity is the client certificate, so two machines sharing one
    /// certificate evict each other on every reconnect and never settle.
    /// Every host needs its own certificate.
    pub fn register(self: &Arc<Self>, id: PeerIdentity) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let replaced = self
            .write()
            .insert(id.clone(), Entry { sender, generation })
            .is_some();
        self.counters.registrations.fetch_add(1, Ordering::Relaxed);

        if replaced {
            info!(subscriber = id.short(), "subscriber re-registered, previous queue closed");
        } else {
            info!(subscriber = id.short(), "subscriber registered");
        }

        Subscription {
            id,
            generation,
            receiver,
            dispatcher: Arc::clone(self),
        }
    }

    /// Removes `id` and closes its queue.
    ///
    /// Returns `false` (and does nothing) if `id` is not registered.
    pub fn unregister(&self, id: &PeerIdentity) -> bool {
        let removed = self.write().remove(id).is_some();
        if removed {
            self.counters.unregistrations.fetch_add(1, Ordering::Relaxed);
            info!(subscriber = id.short(), stats = ?self.stats(), "subscriber unregistered");
        }
        removed
    }

    /// Offers `frame` to every registered subscriber except `source`.
    ///
    /// Never blocks: each enqueue is a `try_send`.
    pub fn dispatch(&self, source: &PeerIdentity, frame: Frame) -> DispatchReport {
        let mut report = DispatchReport::default();
        {
            let subscribers = self.read();
            for (id, entry) in subscribers.iter() {
                if id == source {
                    continue;
                }
                match entry.sender.try_send(frame.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        report.dropped += 1;
                        debug!(subscriber = id.short(), "queue full, frame dropped");
                    }
                    Err(TrySendError::Closed(_)) => {
                        report.dropped += 1;
                        trace!(subscriber = id.short(), "queue closed, frame dropped");
                    }
                }
            }
        }

        self.counters.frames_dispatched.fetch_add(1, Ordering::Relaxed);
        self.counters
            .frames_delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.counters
            .frames_dropped
            .fetch_add(report.dropped as u64, Ordering::Relaxed);
        report
    }

    /// Returns `true` if `id` currently has a registered queue.
    pub fn contains(&self, id: &PeerIdentity) -> bool {
        self.read().contains_key(id)
    }

    /// Number of frames waiting in `id`'s queue, or `None` if not registered.
    pub fn queue_depth(&self, id: &PeerIdentity) -> Option<usize> {
        self.read()
            .get(id)
            .map(|entry| entry.sender.max_capacity() - entry.sender.capacity())
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.read().len()
    }

    /// Snapshot of the lifetime counters.
    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            registrations: self.counters.registrations.load(Ordering::Relaxed),
            unregistrations: self.counters.unregistrations.load(Ordering::Relaxed),
            frames_dispatched: self.counters.frames_dispatched.load(Ordering::Relaxed),
            frames_delivered: self.counters.frames_delivered.load(Ordering::Relaxed),
            frames_dropped: self.counters.frames_dropped.load(Ordering::Relaxed),
        }
    }

    /// Removes `id` only if it still belongs to `generation`.
    ///
    /// A connection that closes after its id was re-registered must not tear
    /// down the newer registration.
    fn release(&self, id: &PeerIdentity, generation: u64) {
        let mut subscribers = self.write();
        if subscribers
            .get(id)
            .is_some_and(|entry| entry.generation == generation)
        {
            subscribers.remove(id);
            drop(subscribers);
            self.counters.unregistrations.fetch_add(1, Ordering::Relaxed);
            info!(subscriber = id.short(), stats = ?self.stats(), "subscriber released");
        }
    }

    // A panic while holding the lock cannot leave the map half-updated, so a
    // poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<PeerIdentity, Entry>> {
        self.subscribers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<PeerIdentity, Entry>> {
        self.subscribers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read side of one subscriber's queue.
///
/// Dropping the subscription unregisters it, unless the same identity has
/// registered again in the meantime.
#[derive(Debug)]
pub struct Subscription {
    id: PeerIdentity,
    generation: u64,
    receiver: mpsc::Receiver<Frame>,
    dispatcher: Arc<Dispatcher>,
}

impl Subscription {
    /// Identity this subscription was registered under.
    pub fn id(&self) -> &PeerIdentity {
        &self.id
    }

    /// Waits for the next frame.
    ///
    /// Returns `None` once the subscriber has been unregistered or replaced
    /// and every frame queued before that has been read.  Cancel safe.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.receiver.recv().await
    }

    /// Returns a queued frame without waiting.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispatcher.release(&self.id, self.generation);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
