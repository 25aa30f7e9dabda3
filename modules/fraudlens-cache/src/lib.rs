//! Content-addressed result cache.
//!
//! Maps an input fingerprint to a previously computed result plus the event
//! sequence captured during the original run, so byte-identical resubmissions
//! replay instantly without touching any collaborator. SQLite-backed and
//! durable across restarts; also holds the completed-submission archive.

mod fingerprint;
mod store;

pub use fingerprint::{fingerprint_bytes, fingerprint_text};
pub use store::{CacheEntry, CacheStats, RemoteMirror, ResultCache};
