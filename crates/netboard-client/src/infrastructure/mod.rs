//! Infrastructure layer for the client.
//!
//! **Dependency rule**: this layer implements the traits declared in
//! `application::ports` and may depend on `application` and `domain`, but
//! MUST NOT be imported by them (tests excepted).
//!
//! # Sub-modules
//!
//! - **`clipboard`** – `Clipboard` backends: `arboard`, the `wl-clipboard`
//!   tools, and an in-memory one for tests.
//!
//! - **`transport`** – The HTTP publisher, the chunked and WebSocket
//!   subscribers, and the reconnect loop that drives them.

pub mod clipboard;
pub mod transport;

pub use clipboard::{open_clipboard, ClipboardMode, MemoryClipboard};
pub use transport::{
    build_subscriber, spawn_subscriber, HttpPublisher, ServerEndpoint, SubscribeTransport,
    TransportError,
};
