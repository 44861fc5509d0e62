//! Client connection handles

mod handle;

pub use handle::{ConnectionHandle, Outbound};
