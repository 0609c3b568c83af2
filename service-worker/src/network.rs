use async_trait::async_trait;
use url::Url;

use crate::error::CacheResult;
use crate::response::CachedResponse;

#[async_trait(?Send)]
pub trait Network {
    /// Whatever the platform needs to replay a request, e.g. a `web_sys::Request`
    /// carrying the original body.
    type Request: 'static;

    /// A plain `GET` for precaching.
    fn request_for(&self, url: &Url) -> CacheResult<Self::Request>;

    async fn fetch(&self, request: Self::Request) -> CacheResult<CachedResponse>;
}
