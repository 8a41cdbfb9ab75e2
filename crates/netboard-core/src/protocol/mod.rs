//! Wire protocol for clipboard frames.
//!
//! - **`frame`** – Encoding and decoding of a single [`frame::Frame`].
//! - **`reader`** – Incremental splitter that turns an arbitrary sequence of
//!   byte chunks back into whole frames.

pub mod frame;
pub mod reader;
