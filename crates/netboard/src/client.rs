//! `netboard listen`.

use std::sync::Arc;

use anyhow::Context;
use netboard_client::application::ports::Clipboard;
use netboard_client::application::sync_loop::{SyncLoop, SyncReport};
use netboard_client::domain::SubscribeConfig;
use netboard_client::infrastructure::clipboard::open_clipboard;
use netboard_client::infrastructure::transport::{
    build_subscriber, spawn_subscriber, HttpPublisher, ServerEndpoint,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ListenSettings;
use crate::tls;

/// Opens the configured clipboard and runs [`run_sync`] until `shutdown`.
///
/// # Errors
///
/// Fails before connecting if the clipboard backend is unavailable or the
/// TLS material cannot be loaded.
pub async fn run_listen(
    settings: ListenSettings,
    shutdown: CancellationToken,
) -> anyhow::Result<SyncReport> {
    let clipboard = open_clipboard(settings.mode).context("unable to open clipboard")?;
    let tls = tls::client_config(
        &settings.identity,
        settings.server_ca.as_deref(),
        settings.insecure_skip_verify,
    )
    .context("unable to set up client TLS")?;
    let endpoint = ServerEndpoint::new(&settings.subscribe.server_url, Arc::new(tls))?;

    info!(
        url = endpoint.base_url(),
        mode = %settings.mode,
        transport = %settings.subscribe.transport,
        "netboard client starting"
    );
    run_sync(clipboard, endpoint, settings.subscribe, shutdown).await
}

/// Connects `clipboard` to the relay at `endpoint`.
///
/// Runs the clipboard watcher, the subscription (with reconnects) and the
/// sync loop until `shutdown` fires.
pub async fn run_sync(
    clipboard: Arc<dyn Clipboard>,
    endpoint: ServerEndpoint,
    config: SubscribeConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<SyncReport> {
    let publisher = Arc::new(HttpPublisher::new(&endpoint, &config)?);
    let subscriber = build_subscriber(&endpoint, &config)?;

    // Stops the watcher and the subscription if the loop ends on its own.
    let session = shutdown.child_token();
    let (remote_rx, subscription) = spawn_subscriber(
        subscriber,
        config.downstream_capacity,
        config.effective_reconnect_delay(),
        session.clone(),
    );
    let local_rx = Arc::clone(&clipboard).watch(session.clone());

    let report = SyncLoop::new(clipboard, publisher)
        .run(local_rx, remote_rx, session.clone())
        .await;

    session.cancel();
    match subscription.await {
        Ok(sessions) => info!(sessions, "relay subscription closed"),
        Err(e) => warn!("subscription task failed: {e}"),
    }
    Ok(report)
}
