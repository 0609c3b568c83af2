use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture, Shared};
use http::Method;
use log::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::{CacheResult, InstallError};
use crate::network::Network;
use crate::response::{fallback_response, CachedResponse, RequestKey};
use crate::store::CacheStore;

type NetworkFuture = Shared<LocalBoxFuture<'static, CacheResult<CachedResponse>>>;

/// What the fetch handler should do with an intercepted request.
pub enum FetchPlan {
    /// Not ours, let the browser handle it.
    Passthrough,
    Intercept {
        /// The answer for the page: cached copy right away, else the network,
        /// else the offline fallback. Never fails.
        response: LocalBoxFuture<'static, CachedResponse>,
        /// Writes the network answer into the active generation. Keep the
        /// worker alive until it finishes.
        refresh: LocalBoxFuture<'static, ()>,
    },
}

impl FetchPlan {
    pub fn is_passthrough(&self) -> bool {
        matches!(self, FetchPlan::Passthrough)
    }
}

/// Stale-while-revalidate cache over versioned generations.
pub struct OfflineCache<S, N> {
    config: Rc<CacheConfig>,
    store: Rc<S>,
    network: Rc<N>,
}

impl<S, N> Clone for OfflineCache<S, N> {
    fn clone(&self) -> Self {
        Self {
            config: Rc::clone(&self.config),
            store: Rc::clone(&self.store),
            network: Rc::clone(&self.network),
        }
    }
}

impl<S, N> OfflineCache<S, N>
where
    S: CacheStore + 'static,
    N: Network + 'static,
{
    pub fn new(config: CacheConfig, store: S, network: N) -> Self {
        Self {
            config: Rc::new(config),
            store: Rc::new(store),
            network: Rc::new(network),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Populates the current generation with the precache list.
    ///
    /// Everything is fetched before anything is written, so a failed install
    /// never leaves a half-filled generation behind.
    pub async fn install(&self) -> Result<(), InstallError> {
        let tag = &self.config.version_tag;
        info!("installing cache generation {} ({} entries)", tag, self.config.precache.len());

        let fetches = self.config.precache.iter().map(|url| {
            let network = Rc::clone(&self.network);
            async move {
                let fetch_error = |source| InstallError::Fetch {
                    url: url.to_string(),
                    source,
                };
                let request = network.request_for(url).map_err(fetch_error)?;
                let response = network.fetch(request).await.map_err(fetch_error)?;
                if !response.is_ok() {
                    return Err(InstallError::Status {
                        url: url.to_string(),
                        status: response.status.as_u16(),
                    });
                }
                Ok((RequestKey::get(url.clone()), response))
            }
        });
        let entries = future::try_join_all(fetches).await?;

        let store_error = |url: &RequestKey, source| InstallError::Store {
            url: url.url.to_string(),
            source,
        };
        self.store
            .open(tag)
            .await
            .map_err(|source| InstallError::Open { tag: tag.clone(), source })?;
        for (key, response) in &entries {
            self.store
                .store(tag, key, response)
                .await
                .map_err(|source| store_error(key, source))?;
        }
        info!("cache generation {} installed", tag);
        Ok(())
    }

    /// Deletes every generation but the current one and returns their tags.
    pub async fn activate(&self) -> CacheResult<Vec<String>> {
        let current = &self.config.version_tag;
        let mut purged = Vec::new();
        for tag in self.store.generations().await? {
            if &tag == current {
                continue;
            }
            if self.store.delete_generation(&tag).await? {
                info!("deleted stale cache generation {}", tag);
                purged.push(tag);
            }
        }
        Ok(purged)
    }

    pub fn handle_fetch(&self, key: RequestKey, request: N::Request) -> FetchPlan {
        if !self.config.is_same_origin(&key.url) {
            return FetchPlan::Passthrough;
        }
        if key.method == Method::GET && self.config.is_network_only(&key.url) {
            debug!("{} is network only", key.url);
            return FetchPlan::Passthrough;
        }

        // one network request feeds both the answer and the refresh
        let network: NetworkFuture = {
            let network = Rc::clone(&self.network);
            async move { network.fetch(request).await }.boxed_local().shared()
        };

        let refresh = {
            let cache = self.clone();
            let key = key.clone();
            let network = network.clone();
            async move { cache.refresh(&key, network).await }.boxed_local()
        };

        let response = {
            let cache = self.clone();
            async move { cache.respond(&key, network).await }.boxed_local()
        };

        FetchPlan::Intercept { response, refresh }
    }

    async fn respond(&self, key: &RequestKey, network: NetworkFuture) -> CachedResponse {
        if key.method == Method::GET {
            match self.store.lookup(&self.config.version_tag, key).await {
                Ok(Some(cached)) => {
                    debug!("cache hit for {}", key.url);
                    return cached;
                }
                Ok(None) => {}
                Err(err) => warn!("cache lookup for {} failed: {}", key.url, err),
            }
        }
        match network.await {
            Ok(response) => response,
            Err(err) => {
                warn!("{} {} failed with nothing cached: {}", key.method, key.url, err);
                fallback_response()
            }
        }
    }

    async fn refresh(&self, key: &RequestKey, network: NetworkFuture) {
        let response = match network.await {
            Ok(response) => response,
            Err(err) => {
                // a cached copy may already have been served, the visitor sees nothing of this
                warn!("revalidating {} failed: {}", key.url, err);
                return;
            }
        };
        if !response.is_cacheable_for(key) {
            debug!("not caching {} {} ({}, {:?})", key.method, key.url, response.status, response.kind);
            return;
        }
        if let Err(err) = self.store.store(&self.config.version_tag, key, &response).await {
            warn!("could not update cache for {}: {}", key.url, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};

    use async_trait::async_trait;
    use futures::channel::oneshot;
    use futures::executor::{block_on, LocalPool};
    use futures::task::LocalSpawnExt;
    use http::StatusCode;
    use url::Url;

    use super::*;
    use crate::error::CacheError;
    use crate::response::{ResponseKind, FALLBACK_BODY};
    use crate::store::MemoryCacheStore;

    const ORIGIN: &str = "https://studio.example/";

    fn url(path: &str) -> Url {
        Url::parse(ORIGIN).unwrap().join(path).unwrap()
    }

    fn page(body: &'static str) -> CachedResponse {
        CachedResponse::new(StatusCode::OK, ResponseKind::Basic, body)
    }

    /// Answers come from per-URL queues; a URL with no queued answer fails.
    /// `hold` parks the next fetch for a URL until the test releases it.
    #[derive(Default)]
    struct FakeNetwork {
        answers: RefCell<HashMap<String, VecDeque<CacheResult<CachedResponse>>>>,
        held: RefCell<HashMap<String, oneshot::Receiver<CacheResult<CachedResponse>>>>,
        requests: RefCell<Vec<RequestKey>>,
    }

    impl FakeNetwork {
        fn answer(&self, path: &str, response: CacheResult<CachedResponse>) {
            self.answers
                .borrow_mut()
                .entry(url(path).to_string())
                .or_default()
                .push_back(response);
        }

        fn hold(&self, path: &str) -> oneshot::Sender<CacheResult<CachedResponse>> {
            let (tx, rx) = oneshot::channel();
            self.held.borrow_mut().insert(url(path).to_string(), rx);
            tx
        }

        fn request_count(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    #[async_trait(?Send)]
    impl Network for Rc<FakeNetwork> {
        type Request = RequestKey;

        fn request_for(&self, url: &Url) -> CacheResult<RequestKey> {
            Ok(RequestKey::get(url.clone()))
        }

        async fn fetch(&self, request: RequestKey) -> CacheResult<CachedResponse> {
            self.requests.borrow_mut().push(request.clone());
            let held = self.held.borrow_mut().remove(request.url.as_str());
            if let Some(rx) = held {
                return rx.await.unwrap_or_else(|_| Err(CacheError::Network("dropped".into())));
            }
            self.answers
                .borrow_mut()
                .get_mut(request.url.as_str())
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Err(CacheError::Network("offline".into())))
        }
    }

    fn cache_with(tag: &str, precache: &[&str]) -> (OfflineCache<MemoryCacheStore, Rc<FakeNetwork>>, Rc<FakeNetwork>) {
        let network = Rc::new(FakeNetwork::default());
        let config = CacheConfig::new(Url::parse(ORIGIN).unwrap(), tag, precache).unwrap();
        (OfflineCache::new(config, MemoryCacheStore::new(), Rc::clone(&network)), network)
    }

    fn intercept(
        cache: &OfflineCache<MemoryCacheStore, Rc<FakeNetwork>>,
        key: RequestKey,
    ) -> (LocalBoxFuture<'static, CachedResponse>, LocalBoxFuture<'static, ()>) {
        match cache.handle_fetch(key.clone(), key) {
            FetchPlan::Intercept { response, refresh } => (response, refresh),
            FetchPlan::Passthrough => panic!("same-origin request was passed through"),
        }
    }

    #[test]
    fn serves_stale_copy_and_stores_fresh_one_for_next_time() {
        let (cache, network) = cache_with("cache-v1", &[]);
        let key = RequestKey::get(url("/work"));
        block_on(cache.store().store("cache-v1", &key, &page("A"))).unwrap();

        let release = network.hold("/work");
        let (response, refresh) = intercept(&cache, key.clone());

        let mut pool = LocalPool::new();
        pool.spawner().spawn_local(refresh).unwrap();
        pool.run_until_stalled();
        // the cached copy arrives while the network is still pending
        let served = pool.run_until(response);
        assert_eq!(served.body, "A");
        assert_eq!(network.request_count(), 1);

        release.send(Ok(page("B"))).unwrap();
        pool.run();
        let next = block_on(cache.store().lookup("cache-v1", &key)).unwrap();
        assert_eq!(next.map(|r| r.body), Some("B".into()));
    }

    #[test]
    fn miss_waits_for_network_and_caches_it() {
        let (cache, network) = cache_with("cache-v1", &[]);
        network.answer("/services", Ok(page("services")));
        let key = RequestKey::get(url("/services"));

        let (response, refresh) = intercept(&cache, key.clone());
        let (served, ()) = block_on(future::join(response, refresh));

        assert_eq!(served.body, "services");
        assert_eq!(network.request_count(), 1);
        assert_eq!(cache.store().len("cache-v1"), 1);
    }

    #[test]
    fn network_failure_without_cache_yields_fallback() {
        let (cache, network) = cache_with("cache-v1", &[]);
        let key = RequestKey::get(url("/contact"));

        let (response, refresh) = intercept(&cache, key);
        let (served, ()) = block_on(future::join(response, refresh));

        assert_eq!(served.status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(served.body, FALLBACK_BODY);
        assert_eq!(network.request_count(), 1);
        assert_eq!(cache.store().len("cache-v1"), 0);
    }

    #[test]
    fn network_failure_with_cache_keeps_serving_the_copy() {
        let (cache, _network) = cache_with("cache-v1", &[]);
        let key = RequestKey::get(url("/"));
        block_on(cache.store().store("cache-v1", &key, &page("home"))).unwrap();

        let (response, refresh) = intercept(&cache, key.clone());
        let (served, ()) = block_on(future::join(response, refresh));

        assert_eq!(served.body, "home");
        let kept = block_on(cache.store().lookup("cache-v1", &key)).unwrap();
        assert_eq!(kept.map(|r| r.body), Some("home".into()));
    }

    #[test]
    fn cross_origin_requests_pass_through() {
        let (cache, network) = cache_with("cache-v1", &[]);
        let cdn = RequestKey::get(Url::parse("https://cdn.jsdelivr.net/npm/three@0.160.0/build/three.min.js").unwrap());

        assert!(cache.handle_fetch(cdn.clone(), cdn).is_passthrough());
        assert_eq!(network.request_count(), 0);
    }

    #[test]
    fn api_reads_bypass_the_cache() {
        let (cache, network) = cache_with("cache-v1", &[]);
        let health = RequestKey::get(url("/api/health"));
        block_on(cache.store().store("cache-v1", &health, &page("app;dur=1.0"))).unwrap();

        assert!(cache.handle_fetch(health.clone(), health).is_passthrough());
        assert!(cache.handle_fetch(RequestKey::get(url("/api/vitals")), RequestKey::get(url("/api/vitals"))).is_passthrough());
        assert_eq!(network.request_count(), 0);

        // submissions still get the offline fallback
        let submit = RequestKey::new(Method::POST, url("/api/contact"));
        let (response, refresh) = intercept(&cache, submit);
        let (served, ()) = block_on(future::join(response, refresh));
        assert_eq!(served.status, StatusCode::REQUEST_TIMEOUT);
    }

    #[test]
    fn only_cacheable_responses_are_stored() {
        let (cache, network) = cache_with("cache-v1", &[]);
        network.answer("/missing", Ok(CachedResponse::new(StatusCode::NOT_FOUND, ResponseKind::Basic, "no")));
        network.answer("/api/contact", Ok(page("sent")));
        network.answer("/redirect", Ok(CachedResponse::new(StatusCode::OK, ResponseKind::OpaqueRedirect, "")));

        for key in [
            RequestKey::get(url("/missing")),
            RequestKey::new(Method::POST, url("/api/contact")),
            RequestKey::get(url("/redirect")),
        ] {
            let (response, refresh) = intercept(&cache, key);
            block_on(future::join(response, refresh));
        }
        assert_eq!(cache.store().len("cache-v1"), 0);
    }

    #[test]
    fn post_is_never_answered_from_cache() {
        let (cache, network) = cache_with("cache-v1", &[]);
        let key = RequestKey::new(Method::POST, url("/api/contact"));
        block_on(cache.store().store("cache-v1", &key, &page("stale"))).unwrap();
        network.answer("/api/contact", Ok(page("fresh")));

        let (response, refresh) = intercept(&cache, key);
        let (served, ()) = block_on(future::join(response, refresh));
        assert_eq!(served.body, "fresh");
    }

    #[test]
    fn install_stores_whole_precache_list() {
        let (cache, network) = cache_with("cache-v1", &["/", "/index.html"]);
        network.answer("/", Ok(page("root")));
        network.answer("/index.html", Ok(page("index")));

        block_on(cache.install()).unwrap();

        assert_eq!(cache.store().len("cache-v1"), 2);
        let root = block_on(cache.store().lookup("cache-v1", &RequestKey::get(url("/")))).unwrap();
        assert_eq!(root.map(|r| r.body), Some("root".into()));
    }

    #[test]
    fn install_aborts_when_any_precache_entry_fails() {
        let (cache, network) = cache_with("cache-v2", &["/", "/animations/motion.json"]);
        network.answer("/", Ok(page("root")));
        network.answer(
            "/animations/motion.json",
            Ok(CachedResponse::new(StatusCode::NOT_FOUND, ResponseKind::Basic, "")),
        );

        let err = block_on(cache.install()).unwrap_err();
        assert_eq!(
            err,
            InstallError::Status {
                url: url("/animations/motion.json").to_string(),
                status: 404,
            }
        );
        assert!(block_on(cache.store().generations()).unwrap().is_empty());

        let (cache, _network) = cache_with("cache-v2", &["/"]);
        assert!(matches!(block_on(cache.install()), Err(InstallError::Fetch { .. })));
    }

    #[test]
    fn activation_cuts_over_to_the_new_generation() {
        let store = MemoryCacheStore::new();
        let key = RequestKey::get(url("/"));
        block_on(async {
            store.open("cache-v1").await.unwrap();
            store.store("cache-v1", &key, &page("old")).await.unwrap();
            store.open("cache-v2").await.unwrap();
        });

        let network = Rc::new(FakeNetwork::default());
        let config = CacheConfig::new(Url::parse(ORIGIN).unwrap(), "cache-v2", &[]).unwrap();
        let cache = OfflineCache::new(config, store, Rc::clone(&network));

        let purged = block_on(cache.activate()).unwrap();
        assert_eq!(purged, vec!["cache-v1".to_string()]);
        assert_eq!(block_on(cache.store().generations()).unwrap(), vec!["cache-v2".to_string()]);

        // v1's copy is gone, so an offline request falls back instead of serving it
        let (response, refresh) = intercept(&cache, key);
        let (served, ()) = block_on(future::join(response, refresh));
        assert_eq!(served.status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(network.request_count(), 1);
    }
}
