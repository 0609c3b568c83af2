use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("network request failed: {0}")]
    Network(String),
    #[error("cache storage failed: {0}")]
    Storage(String),
    #[error("invalid url {0:?}")]
    InvalidUrl(String),
}

/// Why a new cache generation could not be populated. Any of these leaves the
/// previous worker in charge; the browser retries the install later.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InstallError {
    #[error("could not fetch {url}: {source}")]
    Fetch { url: String, source: CacheError },
    #[error("{url} answered {status}")]
    Status { url: String, status: u16 },
    #[error("could not open cache generation {tag}: {source}")]
    Open { tag: String, source: CacheError },
    #[error("could not store {url}: {source}")]
    Store { url: String, source: CacheError },
}

pub type CacheResult<T> = Result<T, CacheError>;

impl From<url::ParseError> for CacheError {
    fn from(err: url::ParseError) -> Self {
        CacheError::InvalidUrl(err.to_string())
    }
}
