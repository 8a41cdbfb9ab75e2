//! netboard: a shared clipboard over mutually authenticated TLS.
//!
//! # Usage
//!
//! ```text
//! netboard server -c server.pem -k server.key -C clients-ca.pem
//! netboard listen -u https://relay.lan:8989 -c laptop.pem -k laptop.key -C ca.pem
//! ```
//!
//! `server` runs the relay.  `listen` (alias `client`) runs on every host
//! that shares the clipboard: it publishes local copies to the relay and
//! applies copies made elsewhere.
//!
//! # Environment variable overrides
//!
//! Every flag can also be set through the environment, and every setting
//! except `--config` can be set in the config file (see the `config`
//! module).  Flags win over the environment, which wins over the file.
//!
//! | Variable                        | Flag                      |
//! |---------------------------------|---------------------------|
//! | `NETBOARD_CONFIG`               | `--config`                |
//! | `NETBOARD_LOG_LEVEL`            | `--log-level`             |
//! | `NETBOARD_SERVER_LISTEN`        | `server --listen`         |
//! | `NETBOARD_SERVER_CERT`          | `server --cert`           |
//! | `NETBOARD_SERVER_CERT_KEY`      | `server --cert-key`       |
//! | `NETBOARD_SERVER_CERT_KEY_PASS` | `server --cert-key-pass`  |
//! | `NETBOARD_SERVER_CLIENT_CA`     | `server --client-ca`      |
//! | `NETBOARD_LISTEN_URL`           | `listen --url`            |
//! | `NETBOARD_LISTEN_CERT`          | `listen --cert`           |
//! | `NETBOARD_LISTEN_CERT_KEY`      | `listen --cert-key`       |
//! | `NETBOARD_LISTEN_CERT_KEY_PASS` | `listen --cert-key-pass`  |
//! | `NETBOARD_LISTEN_SERVER_CA`     | `listen --server-ca`      |
//! | `NETBOARD_LISTEN_MODE`          | `listen --mode`           |
//! | `NETBOARD_LISTEN_TRANSPORT`     | `listen --transport`      |
//!
//! `RUST_LOG`, when set, overrides `--log-level`.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use netboard::client::run_listen;
use netboard::config::{self, ListenSection, ListenSettings, ServerSection, ServerSettings};
use netboard::server::run_server;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Shared network clipboard.
#[derive(Debug, Parser)]
#[command(name = "netboard", about = "Shared network clipboard over mutual TLS", version)]
struct Cli {
    /// Config file to read instead of searching the default locations.
    #[arg(long, global = true, env = "NETBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter (`error`, `warn`, `info`, `debug`, `trace` or a full
    /// `tracing` directive).  `RUST_LOG` takes precedence.
    #[arg(long, global = true, env = "NETBOARD_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the relay server.
    Server(ServerArgs),

    /// Sync this host's clipboard through a relay.
    #[command(alias = "client")]
    Listen(ListenArgs),
}

#[derive(Debug, Args)]
struct ServerArgs {
    /// Address to listen on [default: 0.0.0.0:8989].  `:PORT` binds all
    /// interfaces.
    #[arg(short = 'l', long, env = "NETBOARD_SERVER_LISTEN")]
    listen: Option<String>,

    /// Server certificate (PEM).
    #[arg(short = 'c', long, env = "NETBOARD_SERVER_CERT")]
    cert: Option<String>,

    /// Server private key (PEM).
    #[arg(short = 'k', long, env = "NETBOARD_SERVER_CERT_KEY")]
    cert_key: Option<String>,

    /// Passphrase of an encrypted private key.
    #[arg(short = 'p', long, env = "NETBOARD_SERVER_CERT_KEY_PASS", hide_env_values = true)]
    cert_key_pass: Option<String>,

    /// CA bundle client certificates must chain to (PEM).
    #[arg(short = 'C', long, env = "NETBOARD_SERVER_CLIENT_CA")]
    client_ca: Option<String>,

    /// Frames buffered per subscriber before new ones are dropped
    /// [default: 16].
    #[arg(long, env = "NETBOARD_SERVER_QUEUE_CAPACITY")]
    queue_capacity: Option<usize>,

    /// Largest accepted clipboard payload in bytes [default: 16 MiB].
    #[arg(long, env = "NETBOARD_SERVER_MAX_PAYLOAD_BYTES")]
    max_payload_bytes: Option<usize>,
}

#[derive(Debug, Args)]
struct ListenArgs {
    /// Relay URL [default: https://127.0.0.1:8989].
    #[arg(short = 'u', long, env = "NETBOARD_LISTEN_URL")]
    url: Option<String>,

    /// Client certificate (PEM).
    #[arg(short = 'c', long, env = "NETBOARD_LISTEN_CERT")]
    cert: Option<String>,

    /// Client private key (PEM).
    #[arg(short = 'k', long, env = "NETBOARD_LISTEN_CERT_KEY")]
    cert_key: Option<String>,

    /// Passphrase of an encrypted private key.
    #[arg(short = 'p', long, env = "NETBOARD_LISTEN_CERT_KEY_PASS", hide_env_values = true)]
    cert_key_pass: Option<String>,

    /// CA bundle the relay certificate must chain to (PEM).  Without it the
    /// bundled web PKI roots are used.
    #[arg(short = 'C', long, env = "NETBOARD_LISTEN_SERVER_CA")]
    server_ca: Option<String>,

    /// Do not verify the relay certificate.
    #[arg(long, env = "NETBOARD_LISTEN_INSECURE_SKIP_VERIFY")]
    insecure_skip_verify: bool,

    /// Clipboard backend: `lib` or `wl-clipboard` [default: wl-clipboard].
    #[arg(long, env = "NETBOARD_LISTEN_MODE")]
    mode: Option<String>,

    /// Subscription transport: `websocket` or `chunked` [default: websocket].
    #[arg(long, env = "NETBOARD_LISTEN_TRANSPORT")]
    transport: Option<String>,

    /// Seconds between reconnect attempts [default: 1 for websocket, 5 for
    /// chunked].
    #[arg(long, env = "NETBOARD_LISTEN_RECONNECT_DELAY")]
    reconnect_delay: Option<u64>,
}

impl From<ServerArgs> for ServerSection {
    fn from(args: ServerArgs) -> Self {
        Self {
            listen: args.listen,
            cert: args.cert,
            cert_key: args.cert_key,
            cert_key_pass: args.cert_key_pass,
            client_ca: args.client_ca,
            queue_capacity: args.queue_capacity,
            max_payload_bytes: args.max_payload_bytes,
        }
    }
}

impl From<ListenArgs> for ListenSection {
    fn from(args: ListenArgs) -> Self {
        Self {
            url: args.url,
            cert: args.cert,
            cert_key: args.cert_key,
            cert_key_pass: args.cert_key_pass,
            server_ca: args.server_ca,
            // An absent flag leaves the decision to the config file.
            insecure_skip_verify: args.insecure_skip_verify.then_some(true),
            mode: args.mode,
            transport: args.transport,
            reconnect_delay: args.reconnect_delay,
        }
    }
}

// ── Process plumbing ──────────────────────────────────────────────────────────

fn init_logging(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        level
            .and_then(|level| EnvFilter::try_new(level).ok())
            .unwrap_or_else(|| EnvFilter::new("info"))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Cancels `shutdown` on Ctrl+C or, on Unix, SIGTERM.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        let terminate = async {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("failed to listen for SIGTERM: {e}");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("received Ctrl+C, shutting down"),
                Err(e) => {
                    error!("failed to listen for Ctrl+C: {e}");
                    return;
                }
            },
            _ = terminate => info!("received SIGTERM, shutting down"),
        }
        shutdown.cancel();
    });
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (file, file_path) = config::load(cli.config.as_deref(), &config::search_dirs())
        .context("unable to load config file")?;
    init_logging(cli.log_level.as_deref().or(file.log_level.as_deref()));
    if let Some(path) = &file_path {
        info!(path = %path.display(), "loaded config file");
    }

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    match cli.command {
        Command::Server(args) => {
            let settings = ServerSettings::resolve(ServerSection::from(args).or(file.server))
                .context("invalid server configuration")?;
            run_server(settings, shutdown).await?;
            info!("netboard relay stopped");
        }
        Command::Listen(args) => {
            let settings = ListenSettings::resolve(ListenSection::from(args).or(file.listen))
                .context("invalid client configuration")?;
            let report = run_listen(settings, shutdown).await?;
            info!(?report, "netboard client stopped");
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
