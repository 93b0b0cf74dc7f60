use thiserror::Error;

/// Internal cache failures. Never returned from the public read/write API;
/// they are logged and turned into misses.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("TTL out of range: {0:?}")]
    InvalidTtl(std::time::Duration),

    #[error("failed to encode cache value: {0}")]
    Encode(String),

    #[error("failed to decode cache value: {0}")]
    Decode(String),

    #[error("scope of {0} was invalidated while the value was being fetched")]
    Superseded(String),
}

pub type CacheResult<T> = Result<T, CacheError>;
