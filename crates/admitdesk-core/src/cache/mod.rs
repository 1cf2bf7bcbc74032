//! In-memory query cache for server resources.
//!
//! `QueryCache` stores one `CacheEntry` per `QueryKey` (resource, page,
//! filter). Concurrent reads of the same key share a single network
//! request, and `invalidate` marks families of keys stale so that the
//! next read goes back to the server. Entries older than the configured
//! freshness window are refetched as well.

pub mod entry;
pub mod key;
pub mod query;

pub use entry::{CacheEntry, QueryStatus, ResourcePayload};
pub use key::{QueryKey, QueryPrefix, Resource};
pub use query::QueryCache;
