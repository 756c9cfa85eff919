/// Offline cache module
///
/// This module handles:
/// - The persistent, partitioned record store (store.rs)
/// - The network retrieval primitive (network.rs)
/// - Strategy selection and generation-based eviction (coordinator.rs)
/// - The synthetic "unavailable" image (placeholder.rs)

pub mod coordinator;
pub mod network;
pub mod placeholder;
pub mod store;

pub use coordinator::{CacheCoordinator, CacheSettings};
pub use network::{HttpNetwork, Network};
pub use store::{CacheStore, MemoryCacheStore, SqliteCacheStore};

use thiserror::Error;

/// Errors raised by the cache store and the install lifecycle hook.
///
/// Store errors never reach a resource caller: the coordinator logs and
/// swallows them, and always answers with some response.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("could not create cache directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("install failed, {} manifest resource(s) could not be fetched: {}", failed.len(), failed.join(", "))]
    Install { failed: Vec<String> },

    #[error("cache store lock poisoned")]
    Poisoned,
}

/// A stored copy of a network response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// One record in a cache partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    /// The resource URL the record answers for
    pub resource_key: String,
    /// Cache version that wrote the record (e.g., "v1")
    pub generation: String,
    pub response: CachedResponse,
    /// Unix timestamp of the write
    pub stored_at: i64,
}

/// Where a coordinator response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOrigin {
    Network,
    Cache,
    /// Generated locally because neither network nor cache could answer
    Synthetic,
}

/// A response handed back to the gallery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub origin: ResponseOrigin,
}

impl Response {
    /// True for 2xx statuses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub(crate) fn from_cached(cached: CachedResponse) -> Self {
        Self {
            status: cached.status,
            content_type: cached.content_type,
            body: cached.body,
            origin: ResponseOrigin::Cache,
        }
    }

    pub(crate) fn to_cached(&self) -> CachedResponse {
        CachedResponse {
            status: self.status,
            content_type: self.content_type.clone(),
            body: self.body.clone(),
        }
    }
}
