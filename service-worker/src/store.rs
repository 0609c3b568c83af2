use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use crate::error::CacheResult;
use crate::response::{CachedResponse, RequestKey};

/// Named generations of cached responses, the shape of the browser's
/// `CacheStorage`.
#[async_trait(?Send)]
pub trait CacheStore {
    /// Creates the generation if missing. Opening an existing one is a no-op.
    async fn open(&self, tag: &str) -> CacheResult<()>;

    async fn generations(&self) -> CacheResult<Vec<String>>;

    /// Returns whether a generation with that tag existed.
    async fn delete_generation(&self, tag: &str) -> CacheResult<bool>;

    async fn lookup(&self, tag: &str, key: &RequestKey) -> CacheResult<Option<CachedResponse>>;

    /// Overwrites any entry already stored under `key`.
    async fn store(&self, tag: &str, key: &RequestKey, response: &CachedResponse) -> CacheResult<()>;
}

/// In-process store used off the web and in tests.
#[derive(Default)]
pub struct MemoryCacheStore {
    generations: RefCell<BTreeMap<String, HashMap<RequestKey, CachedResponse>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, tag: &str) -> usize {
        self.generations.borrow().get(tag).map_or(0, HashMap::len)
    }
}

#[async_trait(?Send)]
impl CacheStore for MemoryCacheStore {
    async fn open(&self, tag: &str) -> CacheResult<()> {
        self.generations.borrow_mut().entry(tag.to_string()).or_default();
        Ok(())
    }

    async fn generations(&self) -> CacheResult<Vec<String>> {
        Ok(self.generations.borrow().keys().cloned().collect())
    }

    async fn delete_generation(&self, tag: &str) -> CacheResult<bool> {
        Ok(self.generations.borrow_mut().remove(tag).is_some())
    }

    async fn lookup(&self, tag: &str, key: &RequestKey) -> CacheResult<Option<CachedResponse>> {
        Ok(self
            .generations
            .borrow()
            .get(tag)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn store(&self, tag: &str, key: &RequestKey, response: &CachedResponse) -> CacheResult<()> {
        self.generations
            .borrow_mut()
            .entry(tag.to_string())
            .or_default()
            .insert(key.clone(), response.clone());
        Ok(())
    }
}
