//! Event cache
//!
//! Durable mapping from a monitored object (host, service) to the last
//! notification seen for it and the ticket tracking it. Backed by SQLite so
//! the association survives restarts.

mod sqlite;

pub use sqlite::{CacheEntry, EventCache};
