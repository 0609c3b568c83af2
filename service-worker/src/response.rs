use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method, StatusCode};
use url::Url;

/// Identity of a cached entry. Two requests for the same method and URL share
/// one entry no matter how their other headers differ.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub method: Method,
    pub url: Url,
}

impl RequestKey {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }
}

/// Mirrors the Fetch API's `Response.type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseKind {
    Basic,
    Cors,
    Default,
    Error,
    Opaque,
    OpaqueRedirect,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub kind: ResponseKind,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(status: StatusCode, kind: ResponseKind, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            kind,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: http::header::HeaderName, value: &'static str) -> Self {
        self.headers.insert(name, HeaderValue::from_static(value));
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }

    /// Only plain same-origin `200` answers to `GET` are worth keeping.
    /// Partial, opaque and redirect responses would replay wrongly later.
    pub fn is_cacheable_for(&self, key: &RequestKey) -> bool {
        key.method == Method::GET && self.status == StatusCode::OK && self.kind == ResponseKind::Basic
    }
}

pub const FALLBACK_STATUS: StatusCode = StatusCode::REQUEST_TIMEOUT;

pub const FALLBACK_BODY: &str =
    "Network error: the request could not be completed. Anything you entered has been kept, please try again once you are back online.";

/// Served when the network failed and nothing was cached for the request.
pub fn fallback_response() -> CachedResponse {
    CachedResponse::new(FALLBACK_STATUS, ResponseKind::Basic, FALLBACK_BODY)
        .with_header(CONTENT_TYPE, "text/plain; charset=utf-8")
}
