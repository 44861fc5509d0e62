//! Call correlation
//!
//! Deferred commands are submitted to the backend, which answers under its
//! own call ID at some later drain cycle. The correlator remembers, for
//! every outstanding call, which connection asked and under which client
//! request ID, so the result can be routed back exactly once.
//!
//! # Call lifecycle
//!
//! ```text
//!            track()                     resolve_all()
//!   ─────────────────────▶  PENDING  ─────────────────────▶  RESOLVED
//!                              │                          (reply delivered, or
//!                              │ disconnect() / expire()   dropped if closed)
//!                              ▼
//!                           ORPHANED
//!                     (record discarded; the backend
//!                      still runs the call, its result
//!                      is ignored on arrival)
//! ```
//!
//! Only `PENDING` calls have a record; the other two states are "gone".

mod drain;
mod table;

pub use drain::{drain_once, run_drain_loop};
pub use table::{CallCorrelator, InFlightCall, ResolveSummary};
