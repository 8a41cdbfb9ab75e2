//! Transport-independent subscriber pump.
//!
//! Both streaming transports (chunked HTTP body and WebSocket) do the same
//! thing once a subscriber is registered: pull frames from its
//! [`Subscription`] and push them to the peer until something ends the
//! session.  That loop lives here, once; each transport only implements
//! [`FrameSink`].
//!
//! ```text
//!            ┌─────────────── shutdown token ───────────────┐
//!            ▼                                              │
//! Subscription ──recv()──► pump_frames ──send_frame()──► FrameSink ──► peer
//!                               ▲                           │
//!                               └──── watch_peer() ◄────────┘
//! ```
//!
//! Every write to the sink races the shutdown token and a write deadline.  A
//! peer that stops reading (a half-open connection, a body nobody polls)
//! therefore cannot pin the pump, its registry entry or relay shutdown.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use netboard_core::Frame;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::application::dispatcher::Subscription;

/// Why a sink can no longer deliver frames.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The peer closed the connection or the response body was dropped.
    #[error("peer disconnected")]
    Disconnected,

    /// The peer stayed silent longer than the keepalive allows.
    #[error("peer keepalive timed out")]
    KeepaliveTimeout,

    /// A write did not complete within the write deadline.
    #[error("peer stopped reading for {0:?}")]
    WriteTimeout(Duration),

    /// The underlying transport reported an error.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Upper bound on the farewell write in [`FrameSink::finish`].
pub const FINISH_TIMEOUT: Duration = Duration::from_secs(1);

/// What [`FrameSink::watch_peer`] observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerSignal {
    /// The peer showed a sign of life; nothing to do.
    Alive,
    /// A keepalive should be sent now; the pump calls [`FrameSink::keepalive`].
    KeepaliveDue,
    /// The peer is gone.
    Gone(SinkError),
}

/// Why a pump stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpOutcome {
    /// The relay is shutting down.
    Shutdown,
    /// The subscription was unregistered or replaced by a newer connection.
    Evicted,
    /// The peer went away or the transport failed.
    PeerGone(SinkError),
}

impl fmt::Display for PumpOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shutdown => f.write_str("relay shutting down"),
            Self::Evicted => f.write_str("subscription replaced or unregistered"),
            Self::PeerGone(e) => write!(f, "{e}"),
        }
    }
}

/// One side of a subscribe connection that frames can be written to.
#[async_trait]
pub trait FrameSink: Send {
    /// Short transport name for log lines.
    fn transport(&self) -> &'static str;

    /// Writes one frame to the peer and makes it visible immediately.
    async fn send_frame(&mut self, frame: Frame) -> Result<(), SinkError>;

    /// Waits until the peer side needs attention.
    ///
    /// Must be cancel safe: the pump drops this future whenever a frame is
    /// ready to send.
    async fn watch_peer(&mut self) -> PeerSignal;

    /// Sends a keepalive probe.
    async fn keepalive(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Ends the session cleanly where the transport allows it.
    async fn finish(&mut self, outcome: &PumpOutcome);
}

/// Forwards frames from `subscription` to `sink` until the session ends.
///
/// Each write must finish within `write_timeout`; a peer that takes longer is
/// treated as gone.  The subscription is dropped (and so unregistered) before
/// this returns, which means no frame is enqueued for this connection
/// afterwards.
pub async fn pump_frames<S: FrameSink>(
    mut subscription: Subscription,
    mut sink: S,
    shutdown: CancellationToken,
    write_timeout: Duration,
) -> PumpOutcome {
    let subscriber = subscription.id().short().to_string();
    let transport = sink.transport();
    debug!(subscriber = subscriber.as_str(), transport, "subscriber pump started");

    let outcome = loop {
        tokio::select! {
            _ = shutdown.cancelled() => break PumpOutcome::Shutdown,

            frame = subscription.recv() => match frame {
                Some(frame) => {
                    let sent = bounded_write(&shutdown, write_timeout, sink.send_frame(frame)).await;
                    if let Some(outcome) = sent {
                        break outcome;
                    }
                }
                None => break PumpOutcome::Evicted,
            },

            signal = sink.watch_peer() => match signal {
                PeerSignal::Alive => {}
                PeerSignal::KeepaliveDue => {
                    let sent = bounded_write(&shutdown, write_timeout, sink.keepalive()).await;
                    if let Some(outcome) = sent {
                        break outcome;
                    }
                }
                PeerSignal::Gone(e) => break PumpOutcome::PeerGone(e),
            },
        }
    };

    drop(subscription);
    if tokio::time::timeout(FINISH_TIMEOUT, sink.finish(&outcome)).await.is_err() {
        debug!(subscriber = subscriber.as_str(), transport, "farewell write abandoned");
    }
    info!(
        subscriber = subscriber.as_str(),
        transport,
        reason = %outcome,
        "subscriber disconnected"
    );
    outcome
}

/// Runs one sink write against shutdown and the write deadline.
///
/// Returns `None` when the write succeeded, otherwise the outcome that ends
/// the session.
async fn bounded_write<F>(
    shutdown: &CancellationToken,
    write_timeout: Duration,
    write: F,
) -> Option<PumpOutcome>
where
    F: Future<Output = Result<(), SinkError>>,
{
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => Some(PumpOutcome::Shutdown),
        written = tokio::time::timeout(write_timeout, write) => match written {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(PumpOutcome::PeerGone(e)),
            Err(_) => Some(PumpOutcome::PeerGone(SinkError::WriteTimeout(write_timeout))),
        },
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use netboard_core::PeerIdentity;
    use tokio::sync::mpsc;

    use crate::application::dispatcher::Dispatcher;

    const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Records what the pump asked of it.  `signals` feeds `watch_peer`.
    struct RecordingSink {
        sent: Arc<Mutex<Vec<Frame>>>,
        finished: Arc<Mutex<Option<PumpOutcome>>>,
        keepalives: Arc<Mutex<usize>>,
        signals: mpsc::UnboundedReceiver<PeerSignal>,
        fail_sends: bool,
        stall_keepalives: bool,
    }

    struct Recorded {
        sent: Arc<Mutex<Vec<Frame>>>,
        finished: Arc<Mutex<Option<PumpOutcome>>>,
        keepalives: Arc<Mutex<usize>>,
        signals: mpsc::UnboundedSender<PeerSignal>,
    }

    fn recording_sink(fail_sends: bool) -> (RecordingSink, Recorded) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = RecordingSink {
            sent: Arc::default(),
            finished: Arc::default(),
            keepalives: Arc::default(),
            signals: rx,
            fail_sends,
            stall_keepalives: false,
        };
        let recorded = Recorded {
            sent: Arc::clone(&sink.sent),
            finished: Arc::clone(&sink.finished),
            keepalives: Arc::clone(&sink.keepalives),
            signals: tx,
        };
        (sink, recorded)
    }

    #[async_trait]
    impl FrameSink for RecordingSink {
        fn transport(&self) -> &'static str {
            "recording"
        }

        async fn send_frame(&mut self, frame: Frame) -> Result<(), SinkError> {
            if self.fail_sends {
                return Err(SinkError::Transport("broken pipe".into()));
            }
            self.sent.lock().unwrap().push(frame);
            Ok(())
        }

        async fn watch_peer(&mut self) -> PeerSignal {
            match self.signals.recv().await {
                Some(signal) => signal,
                None => std::future::pending().await,
            }
        }

        async fn keepalive(&mut self) -> Result<(), SinkError> {
            if self.stall_keepalives {
                std::future::pending::<()>().await;
            }
            *self.keepalives.lock().unwrap() += 1;
            Ok(())
        }

        async fn finish(&mut self, outcome: &PumpOutcome) {
            *self.finished.lock().unwrap() = Some(outcome.clone());
        }
    }

    fn setup() -> (Arc<Dispatcher>, Subscription) {
        let d = Arc::new(Dispatcher::new(8));
        let sub = d.register(PeerIdentity::from_string("b"));
        (d, sub)
    }

    #[tokio::test]
    async fn test_pump_forwards_frames_in_order() {
        // Arrange
        let (d, sub) = setup();
        let (sink, recorded) = recording_sink(false);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(pump_frames(sub, sink, shutdown.clone(), WRITE_TIMEOUT));

        // Act
        d.dispatch(&PeerIdentity::from_string("a"), Frame::encode(b"1"));
        d.dispatch(&PeerIdentity::from_string("a"), Frame::encode(b"2"));
        tokio::task::yield_now().await;
        while recorded.sent.lock().unwrap().len() < 2 {
            tokio::task::yield_now().await;
        }
        shutdown.cancel();
        let outcome = handle.await.unwrap();

        // Assert
        let sent: Vec<Vec<u8>> = recorded
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|f| f.decode().unwrap())
            .collect();
        assert_eq!(sent, vec![b"1".to_vec(), b"2".to_vec()]);
        assert_eq!(outcome, PumpOutcome::Shutdown);
        assert_eq!(*recorded.finished.lock().unwrap(), Some(PumpOutcome::Shutdown));
    }

    #[tokio::test]
    async fn test_pump_unregisters_when_peer_goes_away() {
        let (d, sub) = setup();
        let (sink, recorded) = recording_sink(false);

        recorded
            .signals
            .send(PeerSignal::Gone(SinkError::Disconnected))
            .unwrap();
        let outcome = pump_frames(sub, sink, CancellationToken::new(), WRITE_TIMEOUT).await;

        assert_eq!(outcome, PumpOutcome::PeerGone(SinkError::Disconnected));
        assert!(!d.contains(&PeerIdentity::from_string("b")));
    }

    #[tokio::test]
    async fn test_pump_ends_when_evicted() {
        let (d, sub) = setup();
        let (sink, _recorded) = recording_sink(false);

        d.unregister(&PeerIdentity::from_string("b"));
        let outcome = pump_frames(sub, sink, CancellationToken::new(), WRITE_TIMEOUT).await;

        assert_eq!(outcome, PumpOutcome::Evicted);
    }

    #[tokio::test]
    async fn test_pump_stops_on_send_failure() {
        let (d, sub) = setup();
        let (sink, _recorded) = recording_sink(true);

        d.dispatch(&PeerIdentity::from_string("a"), Frame::encode(b"x"));
        let outcome = pump_frames(sub, sink, CancellationToken::new(), WRITE_TIMEOUT).await;

        assert!(matches!(outcome, PumpOutcome::PeerGone(SinkError::Transport(_))));
        assert_eq!(d.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_pump_sends_keepalive_when_due() {
        let (_d, sub) = setup();
        let (sink, recorded) = recording_sink(false);

        recorded.signals.send(PeerSignal::KeepaliveDue).unwrap();
        recorded.signals.send(PeerSignal::Alive).unwrap();
        recorded
            .signals
            .send(PeerSignal::Gone(SinkError::KeepaliveTimeout))
            .unwrap();
        let outcome = pump_frames(sub, sink, CancellationToken::new(), WRITE_TIMEOUT).await;

        assert_eq!(*recorded.keepalives.lock().unwrap(), 1);
        assert_eq!(outcome, PumpOutcome::PeerGone(SinkError::KeepaliveTimeout));
    }

    #[tokio::test]
    async fn test_pump_returns_immediately_if_already_shut_down() {
        let (_d, sub) = setup();
        let (sink, _recorded) = recording_sink(false);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let outcome = pump_frames(sub, sink, shutdown, WRITE_TIMEOUT).await;

        assert_eq!(outcome, PumpOutcome::Shutdown);
    }

    // ── Stalled peer ──────────────────────────────────────────────────────────

    /// A peer that never accepts data: every write blocks forever.
    struct StalledSink;

    #[async_trait]
    impl FrameSink for StalledSink {
        fn transport(&self) -> &'static str {
            "stalled"
        }

        async fn send_frame(&mut self, _frame: Frame) -> Result<(), SinkError> {
            std::future::pending().await
        }

        async fn watch_peer(&mut self) -> PeerSignal {
            std::future::pending().await
        }

        async fn keepalive(&mut self) -> Result<(), SinkError> {
            std::future::pending().await
        }

        async fn finish(&mut self, _outcome: &PumpOutcome) {
            std::future::pending::<()>().await
        }
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_stalled_write() {
        // Arrange: the pump is stuck writing the first frame
        let (d, sub) = setup();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(pump_frames(sub, StalledSink, shutdown.clone(), WRITE_TIMEOUT));
        d.dispatch(&PeerIdentity::from_string("a"), Frame::encode(b"stuck"));
        while d.queue_depth(&PeerIdentity::from_string("b")) != Some(0) {
            tokio::task::yield_now().await;
        }

        // Act
        shutdown.cancel();
        let outcome = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("pump did not exit after shutdown")
            .unwrap();

        // Assert
        assert_eq!(outcome, PumpOutcome::Shutdown);
        assert!(!d.contains(&PeerIdentity::from_string("b")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_write_times_out_as_peer_gone() {
        // Arrange
        let (d, sub) = setup();
        d.dispatch(&PeerIdentity::from_string("a"), Frame::encode(b"stuck"));

        // Act
        let outcome = pump_frames(sub, StalledSink, CancellationToken::new(), WRITE_TIMEOUT).await;

        // Assert
        assert_eq!(
            outcome,
            PumpOutcome::PeerGone(SinkError::WriteTimeout(WRITE_TIMEOUT))
        );
        assert_eq!(d.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_keepalive_times_out_as_peer_gone() {
        // Arrange: keepalive is due but the peer never takes the ping
        let (_d, sub) = setup();
        let (mut sink, recorded) = recording_sink(false);
        sink.stall_keepalives = true;
        recorded.signals.send(PeerSignal::KeepaliveDue).unwrap();

        // Act
        let outcome = pump_frames(sub, sink, CancellationToken::new(), WRITE_TIMEOUT).await;

        // Assert
        let expected = PumpOutcome::PeerGone(SinkError::WriteTimeout(WRITE_TIMEOUT));
        assert_eq!(outcome, expected);
        assert_eq!(*recorded.finished.lock().unwrap(), Some(expected));
        assert_eq!(*recorded.keepalives.lock().unwrap(), 0);
    }
}
