//! Configuration file loading and merging.
//!
//! Settings come from four places.  For every field the first one that sets
//! it wins:
//!
//! 1. command-line flag
//! 2. `NETBOARD_*` environment variable (handled by clap)
//! 3. the TOML config file
//! 4. the built-in default
//!
//! # Config file location
//!
//! `--config` / `NETBOARD_CONFIG` names the file explicitly; it must exist.
//! Otherwise the first `config.toml` found in these directories is used, and
//! having none at all is fine:
//!
//! | Directory                                        |
//! |--------------------------------------------------|
//! | `$XDG_CONFIG_HOME/netboard` (`~/.config/netboard`) |
//! | `/usr/local/etc/netboard`                        |
//! | `/etc/netboard`                                  |
//!
//! # Example
//!
//! ```toml
//! log_level = "debug"
//!
//! [server]
//! listen = "0.0.0.0:8989"
//! cert = "$HOME/.netboard/server.pem"
//! cert_key = "$HOME/.netboard/server.key"
//! client_ca = "/etc/netboard/ca.pem"
//!
//! [listen]
//! url = "https://relay.lan:8989"
//! cert = "~/.netboard/laptop.pem"
//! cert_key = "~/.netboard/laptop.key"
//! server_ca = "/etc/netboard/ca.pem"
//! mode = "lib"
//! transport = "chunked"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use netboard_client::domain::config::{SubscribeConfig, TransportKind, DEFAULT_SERVER_URL};
use netboard_client::infrastructure::clipboard::ClipboardMode;
use netboard_server::domain::RelayConfig;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Name of the config file inside each search directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

// ── Errors ────────────────────────────────────────────────────────────────────

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unable to expand '{value}': {message}")]
    Expand { value: String, message: String },

    #[error("missing required setting '{0}' (flag, environment or config file)")]
    Missing(&'static str),

    #[error("invalid value for '{field}': {message}")]
    Invalid { field: &'static str, message: String },
}

// ── File schema ───────────────────────────────────────────────────────────────

/// Contents of `config.toml`.  Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// `tracing` filter used when `RUST_LOG` is not set.
    pub log_level: Option<String>,
    pub server: ServerSection,
    pub listen: ListenSection,
}

/// `[server]` table, also the shape of the `server` subcommand's flags.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub listen: Option<String>,
    pub cert: Option<String>,
    pub cert_key: Option<String>,
    pub cert_key_pass: Option<String>,
    pub client_ca: Option<String>,
    pub queue_capacity: Option<usize>,
    pub max_payload_bytes: Option<usize>,
}

/// `[listen]` table, also the shape of the `listen` subcommand's flags.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ListenSection {
    pub url: Option<String>,
    pub cert: Option<String>,
    pub cert_key: Option<String>,
    pub cert_key_pass: Option<String>,
    pub server_ca: Option<String>,
    pub insecure_skip_verify: Option<bool>,
    pub mode: Option<String>,
    pub transport: Option<String>,
    /// Seconds.
    pub reconnect_delay: Option<u64>,
}

impl ServerSection {
    /// Fills every field `self` leaves unset from `fallback`.
    pub fn or(self, fallback: Self) -> Self {
        Self {
            listen: self.listen.or(fallback.listen),
            cert: self.cert.or(fallback.cert),
            cert_key: self.cert_key.or(fallback.cert_key),
            cert_key_pass: self.cert_key_pass.or(fallback.cert_key_pass),
            client_ca: self.client_ca.or(fallback.client_ca),
            queue_capacity: self.queue_capacity.or(fallback.queue_capacity),
            max_payload_bytes: self.max_payload_bytes.or(fallback.max_payload_bytes),
        }
    }
}

impl ListenSection {
    /// Fills every field `self` leaves unset from `fallback`.
    pub fn or(self, fallback: Self) -> Self {
        Self {
            url: self.url.or(fallback.url),
            cert: self.cert.or(fallback.cert),
            cert_key: self.cert_key.or(fallback.cert_key),
            cert_key_pass: self.cert_key_pass.or(fallback.cert_key_pass),
            server_ca: self.server_ca.or(fallback.server_ca),
            insecure_skip_verify: self.insecure_skip_verify.or(fallback.insecure_skip_verify),
            mode: self.mode.or(fallback.mode),
            transport: self.transport.or(fallback.transport),
            reconnect_delay: self.reconnect_delay.or(fallback.reconnect_delay),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Directories searched for [`CONFIG_FILE_NAME`], in order.
pub fn search_dirs() -> Vec<PathBuf> {
    let mut search = Vec::with_capacity(3);
    if let Some(config_dir) = dirs::config_dir() {
        search.push(config_dir.join("netboard"));
    }
    search.push(PathBuf::from("/usr/local/etc/netboard"));
    search.push(PathBuf::from("/etc/netboard"));
    search
}

/// Loads the config file.
///
/// With `explicit` set, that file is read and must exist.  Otherwise the
/// first file found in `search` is read; if there is none an empty
/// [`FileConfig`] is returned.  The path actually read is returned with it.
pub fn load(
    explicit: Option<&Path>,
    search: &[PathBuf],
) -> Result<(FileConfig, Option<PathBuf>), ConfigError> {
    if let Some(path) = explicit {
        return Ok((load_from(path)?, Some(path.to_path_buf())));
    }

    for dir in search {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Ok((load_from(&candidate)?, Some(candidate)));
        }
    }

    debug!("no config file found, using flags, environment and defaults");
    Ok((FileConfig::default(), None))
}

/// Reads and parses one config file.
pub fn load_from(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Expands `~`, `$VAR` and `${VAR}` in a configured path.
pub fn expand_path(value: &str) -> Result<PathBuf, ConfigError> {
    shellexpand::full(value)
        .map(|expanded| PathBuf::from(expanded.into_owned()))
        .map_err(|e| ConfigError::Expand {
            value: value.to_string(),
            message: e.to_string(),
        })
}

fn required_path(value: Option<String>, field: &'static str) -> Result<PathBuf, ConfigError> {
    expand_path(&value.ok_or(ConfigError::Missing(field))?)
}

fn optional_path(value: Option<String>) -> Result<Option<PathBuf>, ConfigError> {
    value.as_deref().map(expand_path).transpose()
}

/// Accepts `host:port` or the `:port` shorthand for all interfaces.
pub fn parse_listen_addr(value: &str) -> Result<SocketAddr, ConfigError> {
    let full = if value.starts_with(':') {
        format!("0.0.0.0{value}")
    } else {
        value.to_string()
    };
    full.parse().map_err(|e| ConfigError::Invalid {
        field: "listen",
        message: format!("'{value}': {e}"),
    })
}

// ── Resolved settings ─────────────────────────────────────────────────────────

/// Material for one side of the mutual-TLS link.
#[derive(Debug, Clone, PartialEq)]
pub struct TlsFiles {
    pub cert: PathBuf,
    pub cert_key: PathBuf,
    pub cert_key_pass: Option<String>,
}

/// Everything `netboard server` needs.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub relay: RelayConfig,
    pub identity: TlsFiles,
    pub client_ca: PathBuf,
}

impl ServerSettings {
    /// Applies defaults to a merged section and checks required fields.
    pub fn resolve(section: ServerSection) -> Result<Self, ConfigError> {
        let mut relay = RelayConfig::default();
        if let Some(listen) = section.listen.as_deref() {
            relay.listen_addr = parse_listen_addr(listen)?;
        }
        if let Some(queue_capacity) = section.queue_capacity {
            if queue_capacity == 0 {
                return Err(ConfigError::Invalid {
                    field: "queue_capacity",
                    message: "must be at least 1".into(),
                });
            }
            relay.queue_capacity = queue_capacity;
        }
        if let Some(max_payload_bytes) = section.max_payload_bytes {
            relay.max_payload_bytes = max_payload_bytes;
        }

        Ok(Self {
            relay,
            identity: TlsFiles {
                cert: required_path(section.cert, "cert")?,
                cert_key: required_path(section.cert_key, "cert-key")?,
                cert_key_pass: section.cert_key_pass,
            },
            client_ca: required_path(section.client_ca, "client-ca")?,
        })
    }
}

/// Everything `netboard listen` needs.
#[derive(Debug, Clone)]
pub struct ListenSettings {
    pub subscribe: SubscribeConfig,
    pub mode: ClipboardMode,
    pub identity: TlsFiles,
    /// Trusted roots for the relay certificate; `None` uses the bundled
    /// web PKI roots.
    pub server_ca: Option<PathBuf>,
    pub insecure_skip_verify: bool,
}

impl ListenSettings {
    /// Applies defaults to a merged section and checks required fields.
    pub fn resolve(section: ListenSection) -> Result<Self, ConfigError> {
        let mode = match section.mode.as_deref() {
            Some(mode) => mode.parse().map_err(|e| ConfigError::Invalid {
                field: "mode",
                message: format!("{e}"),
            })?,
            None => ClipboardMode::default(),
        };
        let transport = match section.transport.as_deref() {
            Some(transport) => transport
                .parse::<TransportKind>()
                .map_err(|message| ConfigError::Invalid {
                    field: "transport",
                    message,
                })?,
            None => TransportKind::default(),
        };

        let subscribe = SubscribeConfig {
            server_url: section.url.unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            transport,
            reconnect_delay: section.reconnect_delay.map(Duration::from_secs),
            ..SubscribeConfig::default()
        };

        Ok(Self {
            subscribe,
            mode,
            identity: TlsFiles {
                cert: required_path(section.cert, "cert")?,
                cert_key: required_path(section.cert_key, "cert-key")?,
                cert_key_pass: section.cert_key_pass,
            },
            server_ca: optional_path(section.server_ca)?,
            insecure_skip_verify: section.insecure_skip_verify.unwrap_or(false),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
