use std::cell::RefCell;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use js_sys::{Array, Promise, Uint8Array};
use log::{error, info, Level};
use url::Url;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{future_to_promise, JsFuture};
use web_sys::{
    Cache, CacheStorage, FetchEvent, Headers, Request, RequestInit, Response, ResponseInit, ResponseType,
    ServiceWorkerGlobalScope,
};

use crate::cache::{FetchPlan, OfflineCache};
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::network::Network;
use crate::response::{CachedResponse, RequestKey, ResponseKind};
use crate::store::CacheStore;

type WebCache = OfflineCache<WebCacheStore, WebNetwork>;

thread_local! {
    static WORKER: RefCell<Option<WebCache>> = RefCell::new(None);
}

fn scope() -> ServiceWorkerGlobalScope {
    js_sys::global().unchecked_into()
}

fn storage_error(err: JsValue) -> CacheError {
    CacheError::Storage(format!("{:?}", err))
}

fn network_error(err: JsValue) -> CacheError {
    CacheError::Network(format!("{:?}", err))
}

fn worker() -> Result<WebCache, JsValue> {
    WORKER.with(|slot| {
        if let Some(cache) = slot.borrow().as_ref() {
            return Ok(cache.clone());
        }
        let scope = scope();
        let origin = Url::parse(&scope.location().href()).map_err(|e| JsValue::from_str(&e.to_string()))?;
        let config = CacheConfig::for_origin(origin).map_err(|e| JsValue::from_str(&e.to_string()))?;
        let cache = OfflineCache::new(
            config,
            WebCacheStore { caches: scope.caches()? },
            WebNetwork { scope },
        );
        *slot.borrow_mut() = Some(cache.clone());
        Ok(cache)
    })
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    let level = if cfg!(debug_assertions) { Level::Debug } else { Level::Info };
    if let Err(err) = console_log::init_with_level(level) {
        web_sys::console::warn_1(&JsValue::from_str(&err.to_string()));
    }
}

/// Install handler. The shim passes the returned promise to `waitUntil`.
#[wasm_bindgen]
pub fn on_install() -> Promise {
    future_to_promise(async {
        let cache = worker()?;
        if let Err(err) = cache.install().await {
            error!("install failed: {}", err);
            return Err(JsValue::from_str(&err.to_string()));
        }
        // take over without waiting for old tabs to close
        JsFuture::from(scope().skip_waiting()?).await?;
        Ok(JsValue::UNDEFINED)
    })
}

#[wasm_bindgen]
pub fn on_activate() -> Promise {
    future_to_promise(async {
        let cache = worker()?;
        let purged = cache.activate().await.map_err(|e| JsValue::from_str(&e.to_string()))?;
        info!("activated {}, purged {:?}", cache.config().version_tag, purged);
        JsFuture::from(scope().clients().claim()).await?;
        Ok(JsValue::UNDEFINED)
    })
}

/// Fetch handler. Resolves to the `Response` for `respondWith`; background
/// revalidation is attached to the event through `waitUntil`.
#[wasm_bindgen]
pub fn on_fetch(event: FetchEvent) -> Promise {
    let request = event.request();
    let plan = match request_key(&request).and_then(|key| Ok((worker()?, key))) {
        Ok((cache, key)) => cache.handle_fetch(key, request.clone()),
        Err(err) => {
            error!("cannot handle {}: {:?}", request.url(), err);
            FetchPlan::Passthrough
        }
    };

    match plan {
        FetchPlan::Passthrough => scope().fetch_with_request(&request),
        FetchPlan::Intercept { response, refresh } => {
            let refresh = future_to_promise(async move {
                refresh.await;
                Ok(JsValue::UNDEFINED)
            });
            if let Err(err) = event.wait_until(&refresh) {
                error!("could not extend fetch event: {:?}", err);
            }
            future_to_promise(async move {
                let cached = response.await;
                Ok(to_web_response(&cached)?.into())
            })
        }
    }
}

fn request_key(request: &Request) -> Result<RequestKey, JsValue> {
    let method = Method::from_bytes(request.method().as_bytes()).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let url = Url::parse(&request.url()).map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(RequestKey::new(method, url))
}

fn web_request(key: &RequestKey) -> Result<Request, JsValue> {
    let init = RequestInit::new();
    init.set_method(key.method.as_str());
    Request::new_with_str_and_init(key.url.as_str(), &init)
}

fn response_kind(kind: ResponseType) -> ResponseKind {
    match kind {
        ResponseType::Basic => ResponseKind::Basic,
        ResponseType::Cors => ResponseKind::Cors,
        ResponseType::Error => ResponseKind::Error,
        ResponseType::Opaque => ResponseKind::Opaque,
        ResponseType::Opaqueredirect => ResponseKind::OpaqueRedirect,
        _ => ResponseKind::Default,
    }
}

async fn from_web_response(response: Response) -> CacheResult<CachedResponse> {
    let status = StatusCode::from_u16(response.status()).unwrap_or(StatusCode::BAD_GATEWAY);
    let kind = response_kind(response.type_());

    let mut headers = HeaderMap::new();
    if let Ok(Some(entries)) = js_sys::try_iter(&response.headers()) {
        for pair in entries.flatten() {
            let pair: Array = pair.unchecked_into();
            let (Some(name), Some(value)) = (pair.get(0).as_string(), pair.get(1).as_string()) else {
                continue;
            };
            if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
                headers.append(name, value);
            }
        }
    }

    // opaque bodies are unreadable, and never stored anyway
    let body = match kind {
        ResponseKind::Opaque | ResponseKind::OpaqueRedirect | ResponseKind::Error => Bytes::new(),
        _ => {
            let buffer = JsFuture::from(response.array_buffer().map_err(network_error)?)
                .await
                .map_err(network_error)?;
            Bytes::from(Uint8Array::new(&buffer).to_vec())
        }
    };

    Ok(CachedResponse {
        status,
        kind,
        headers,
        body,
    })
}

fn to_web_response(cached: &CachedResponse) -> Result<Response, JsValue> {
    let headers = Headers::new()?;
    for (name, value) in &cached.headers {
        if let Ok(value) = value.to_str() {
            headers.append(name.as_str(), value)?;
        }
    }
    let init = ResponseInit::new();
    init.set_status(cached.status.as_u16());
    init.set_headers(&headers);
    if cached.body.is_empty() {
        Response::new_with_opt_str_and_init(None, &init)
    } else {
        let body = Uint8Array::from(&cached.body[..]);
        Response::new_with_opt_buffer_source_and_init(Some(body.as_ref()), &init)
    }
}

pub struct WebCacheStore {
    caches: CacheStorage,
}

impl WebCacheStore {
    async fn cache(&self, tag: &str) -> CacheResult<Cache> {
        let cache = JsFuture::from(self.caches.open(tag)).await.map_err(storage_error)?;
        Ok(cache.unchecked_into())
    }
}

#[async_trait(?Send)]
impl CacheStore for WebCacheStore {
    async fn open(&self, tag: &str) -> CacheResult<()> {
        self.cache(tag).await.map(|_| ())
    }

    async fn generations(&self) -> CacheResult<Vec<String>> {
        let keys = JsFuture::from(self.caches.keys()).await.map_err(storage_error)?;
        Ok(keys
            .unchecked_into::<Array>()
            .iter()
            .filter_map(|key| key.as_string())
            .collect())
    }

    async fn delete_generation(&self, tag: &str) -> CacheResult<bool> {
        let deleted = JsFuture::from(self.caches.delete(tag)).await.map_err(storage_error)?;
        Ok(deleted.as_bool().unwrap_or(false))
    }

    async fn lookup(&self, tag: &str, key: &RequestKey) -> CacheResult<Option<CachedResponse>> {
        let cache = self.cache(tag).await?;
        let request = web_request(key).map_err(storage_error)?;
        let found = JsFuture::from(cache.match_with_request(&request))
            .await
            .map_err(storage_error)?;
        if found.is_undefined() {
            return Ok(None);
        }
        from_web_response(found.unchecked_into()).await.map(Some)
    }

    async fn store(&self, tag: &str, key: &RequestKey, response: &CachedResponse) -> CacheResult<()> {
        let cache = self.cache(tag).await?;
        let request = web_request(key).map_err(storage_error)?;
        let response = to_web_response(response).map_err(storage_error)?;
        JsFuture::from(cache.put_with_request(&request, &response))
            .await
            .map_err(storage_error)?;
        Ok(())
    }
}

pub struct WebNetwork {
    scope: ServiceWorkerGlobalScope,
}

#[async_trait(?Send)]
impl Network for WebNetwork {
    type Request = Request;

    fn request_for(&self, url: &Url) -> CacheResult<Request> {
        Request::new_with_str(url.as_str()).map_err(network_error)
    }

    async fn fetch(&self, request: Request) -> CacheResult<CachedResponse> {
        let response = JsFuture::from(self.scope.fetch_with_request(&request))
            .await
            .map_err(network_error)?;
        from_web_response(response.unchecked_into()).await
    }
}
