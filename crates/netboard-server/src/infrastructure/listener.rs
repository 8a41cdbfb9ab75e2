//! Mutual-TLS listener: accept loop and per-connection tasks.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Completing the TLS handshake with every client, which must present a
//!    certificate signed by the trusted client CA.
//! 3. Deriving the client's [`PeerIdentity`] from that certificate.
//! 4. Serving HTTP/1.1 (with upgrades, for WebSockets) on the TLS stream,
//!    with the identity attached to every request of the connection.
//! 5. Shutting down gracefully when the shutdown token is cancelled: the
//!    accept loop stops, every connection is asked to finish, and the relay
//!    waits up to `shutdown_grace` for them.
//!
//! Each connection runs in its own Tokio task, tracked by a `TaskTracker` so
//! shutdown knows when they are all gone.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Extension, Router};
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use netboard_core::PeerIdentity;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::application::dispatcher::Dispatcher;
use crate::domain::config::RelayConfig;
use crate::infrastructure::http::{build_router, RelayState};

/// Pause after a failed `accept()` so a persistent error (e.g. file
/// descriptor exhaustion) does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Errors raised by the relay listener.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The TCP listener could not be bound.
    #[error("failed to bind relay listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error on the listening socket.
    #[error("listener I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The TLS handshake failed (bad or missing client certificate, protocol
    /// mismatch, reset).
    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] std::io::Error),

    /// The TLS handshake did not complete in time.
    #[error("TLS handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// The handshake finished without a client certificate.
    #[error("client presented no certificate")]
    MissingClientCertificate,

    /// HTTP serving failed on an established connection.
    #[error("HTTP connection error: {0}")]
    Http(#[from] hyper::Error),
}

/// The relay server: a bound listener plus everything needed to serve it.
pub struct RelayServer {
    listener: TcpListener,
    acceptor: TlsAcceptor,
    state: RelayState,
}

impl RelayServer {
    /// Binds the listener.
    ///
    /// `tls` must require client certificates; the identity of every caller
    /// is taken from the certificate it presents.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Bind`] if the address is in use or not permitted.
    pub async fn bind(
        config: RelayConfig,
        tls: Arc<rustls::ServerConfig>,
        shutdown: CancellationToken,
    ) -> Result<Self, RelayError> {
        let addr = config.listen_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RelayError::Bind { addr, source })?;

        Ok(Self {
            listener,
            acceptor: TlsAcceptor::from(tls),
            state: RelayState::new(config, shutdown),
        })
    }

    /// Address actually bound (useful when binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    /// The dispatcher shared by all connections.
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.state.dispatcher)
    }

    /// Runs the accept loop until the shutdown token is cancelled, then waits
    /// for open connections up to `shutdown_grace`.
    pub async fn run(self) -> Result<(), RelayError> {
        let Self {
            listener,
            acceptor,
            state,
        } = self;
        let shutdown = state.shutdown.clone();
        let grace = state.config.shutdown_grace;
        let handshake_timeout = state.config.handshake_timeout;
        let router = build_router(state);
        let connections = TaskTracker::new();

        info!("relay listening on {}", listener.local_addr()?);

        loop {
            let (tcp, peer_addr) = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("accept error: {e}");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        continue;
                    }
                },
            };

            let acceptor = acceptor.clone();
            let router = router.clone();
            let shutdown = shutdown.clone();
            connections.spawn(async move {
                match serve_connection(tcp, acceptor, router, shutdown, handshake_timeout).await {
                    Ok(()) => debug!("connection {peer_addr} closed"),
                    Err(e) => warn!("connection {peer_addr} closed with error: {e}"),
                }
            });
        }

        drop(listener);
        connections.close();
        info!(
            open = connections.len(),
            "relay stopped accepting; waiting for connections to finish"
        );
        if tokio::time::timeout(grace, connections.wait()).await.is_err() {
            warn!(
                open = connections.len(),
                "shutdown grace period of {grace:?} elapsed with connections still open"
            );
        }
        info!("relay stopped");
        Ok(())
    }
}

/// Derives the caller's identity from the first certificate of its chain.
pub fn peer_identity(tls: &TlsStream<TcpStream>) -> Result<PeerIdentity, RelayError> {
    let (_, session) = tls.get_ref();
    session
        .peer_certificates()
        .and_then(|chain| chain.first())
        .map(|cert| PeerIdentity::from_certificate(cert.as_ref()))
        .ok_or(RelayError::MissingClientCertificate)
}

/// Runs the handshake and then serves HTTP on one connection.
async fn serve_connection(
    tcp: TcpStream,
    acceptor: TlsAcceptor,
    router: Router,
    shutdown: CancellationToken,
    handshake_timeout: Duration,
) -> Result<(), RelayError> {
    let tls = tokio::time::timeout(handshake_timeout, acceptor.accept(tcp))
        .await
        .map_err(|_| RelayError::HandshakeTimeout(handshake_timeout))?
        .map_err(RelayError::Handshake)?;
    let identity = peer_identity(&tls)?;
    debug!(peer = identity.short(), "client authenticated");

    let service = TowerToHyperService::new(router.layer(Extension(identity)));
    let conn = http1::Builder::new()
        .serve_connection(TokioIo::new(tls), service)
        .with_upgrades();
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => result?,
        _ = shutdown.cancelled() => {
            // Lets an in-flight request finish; streaming handlers end their
            // bodies on the same token.
            conn.as_mut().graceful_shutdown();
            conn.await?;
        }
    }
    Ok(())
}
