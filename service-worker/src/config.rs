use url::Url;

/// Bump on every deploy that changes precached assets. Activation deletes
/// every cache generation carrying another tag.
pub const CACHE_VERSION: &str = "cache-v1";

/// Fetched and stored before the worker activates, in this order.
pub const PRECACHE: &[&str] = &[
    "/",
    "/index.html",
    "/manifest.json",
    "/animations/web-design.json",
    "/animations/motion.json",
    "/animations/performance.json",
];

/// Path prefixes whose GETs always go straight to the backend. Other methods
/// under them are still intercepted so a failure gets the offline fallback.
pub const NETWORK_ONLY: &[&str] = &["/api/"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    pub version_tag: String,
    /// Absolute URLs, resolved against `origin`.
    pub precache: Vec<Url>,
    pub origin: Url,
    pub network_only: Vec<String>,
}

impl CacheConfig {
    /// Site defaults for a worker served from `origin`.
    pub fn for_origin(origin: Url) -> Result<Self, url::ParseError> {
        Self::new(origin, CACHE_VERSION, PRECACHE)
    }

    pub fn new(origin: Url, version_tag: &str, precache: &[&str]) -> Result<Self, url::ParseError> {
        let precache = precache
            .iter()
            .map(|path| origin.join(path))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            version_tag: version_tag.to_string(),
            precache,
            origin,
            network_only: NETWORK_ONLY.iter().map(|prefix| prefix.to_string()).collect(),
        })
    }

    pub fn with_network_only(mut self, prefixes: &[&str]) -> Self {
        self.network_only = prefixes.iter().map(|prefix| prefix.to_string()).collect();
        self
    }

    pub fn is_network_only(&self, url: &Url) -> bool {
        self.network_only.iter().any(|prefix| url.path().starts_with(prefix.as_str()))
    }

    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }
}
