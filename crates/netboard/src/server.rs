//! `netboard server`.

use std::sync::Arc;

use anyhow::Context;
use netboard_server::infrastructure::RelayServer;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ServerSettings;
use crate::tls;

/// Builds the TLS config, binds the relay and serves until `shutdown`.
///
/// # Errors
///
/// Fails before serving if the certificates cannot be loaded or the address
/// cannot be bound.
pub async fn run_server(settings: ServerSettings, shutdown: CancellationToken) -> anyhow::Result<()> {
    let tls = tls::server_config(&settings.identity, &settings.client_ca)
        .context("unable to set up server TLS")?;

    let server = RelayServer::bind(settings.relay, Arc::new(tls), shutdown)
        .await
        .context("unable to start relay")?;
    info!(addr = %server.local_addr()?, "netboard relay listening");

    server.run().await.context("relay stopped with an error")?;
    Ok(())
}
