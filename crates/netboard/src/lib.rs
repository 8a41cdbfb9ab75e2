//! # netboard
//!
//! The `netboard` binary and the glue it is made of.
//!
//! - **`config`** – TOML config file discovery, flag/env/file merging, and
//!   the resolved [`config::ServerSettings`] / [`config::ListenSettings`].
//! - **`tls`** – rustls server and client configs built from PEM files.
//! - **`server`** – `netboard server`: runs the relay until shutdown.
//! - **`client`** – `netboard listen`: wires a clipboard, the publisher, a
//!   subscriber and the sync loop together.
//!
//! The relay itself lives in `netboard-server` and the client logic in
//! `netboard-client`; nothing here knows about frames or queues.

pub mod client;
pub mod config;
pub mod server;
pub mod tls;
