//! Application layer for the client.
//!
//! - **`ports`** – The [`Clipboard`] and [`Publish`] capability traits the
//!   sync loop is written against.
//!
//! - **`sync_loop`** – The two-path loop that publishes local clipboard
//!   changes and applies remote ones without feeding them back.

pub mod ports;
pub mod sync_loop;

pub use ports::{Clipboard, ClipboardError, Publish, PublishError};
pub use sync_loop::{LocalPublisher, RemoteApplier, SyncLoop, SyncReport};
