//! Offline support for the site: a stale-while-revalidate cache kept in
//! versioned generations.
//!
//! The caching rules live in [`OfflineCache`] and only talk to storage and the
//! network through [`CacheStore`] and [`Network`], so they run (and are tested)
//! outside a browser. The `web` module binds them to the service worker APIs.

pub mod cache;
pub mod config;
pub mod error;
pub mod network;
pub mod response;
pub mod store;

#[cfg(target_arch = "wasm32")]
mod web;

pub use cache::{FetchPlan, OfflineCache};
pub use config::{CacheConfig, CACHE_VERSION, NETWORK_ONLY, PRECACHE};
pub use error::{CacheError, CacheResult, InstallError};
pub use network::Network;
pub use response::{fallback_response, CachedResponse, RequestKey, ResponseKind};
pub use store::{CacheStore, MemoryCacheStore};
