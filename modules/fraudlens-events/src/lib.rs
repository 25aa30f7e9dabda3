//! Per-submission progress event log.
//!
//! Append-only, single writer (the owning pipeline task), arbitrarily many
//! concurrent readers. A reader connecting late still receives the full
//! sequence from index 0 and stops after the terminal `complete` event.

mod log;
mod types;

pub use log::EventLog;
pub use types::{EventKind, EventRecord};
