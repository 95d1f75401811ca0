use thiserror::Error;

/// Error taxonomy for the cache data model (see spec §7).
///
/// Indexing failures are deliberately absent here: an extractor throwing is
/// recovered locally by `SimpleMapIndex` (the key is excluded, a rate-limited
/// warning is logged) and never surfaces as a `CacheError` to the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("no such element: {0}")]
    NoSuchElement(String),

    #[error("index out of bounds: {0}")]
    IndexOutOfBounds(String),

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    #[error("concurrent modification detected: {0}")]
    ConcurrentModification(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;
