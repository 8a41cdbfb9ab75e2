//! Application layer for the relay.
//!
//! - **`dispatcher`** – The pub/sub broker.  It maps each subscriber identity
//!   to a bounded queue of pending frames and fans every publish out to all
//!   subscribers except the publisher.  It knows nothing about HTTP, TLS or
//!   WebSockets; the infrastructure layer feeds it.

pub mod dispatcher;

pub use dispatcher::{DispatchReport, Dispatcher, DispatcherStats, Subscription};
