use snaplink_core::StorageError;
use thiserror::Error;

/// Why [`ShortLinkStore::save`](crate::ShortLinkStore::save) gave up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaveError {
    /// Every generated candidate was already taken.
    #[error("no free short code after {attempts} attempts")]
    GenerationExhausted { attempts: u32 },
    #[error("persistence failure: {0}")]
    Persistence(#[source] StorageError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("short code not found: {0}")]
    NotFound(String),
    #[error("persistence failure: {0}")]
    Persistence(#[source] StorageError),
}

/// Errors raised while opening a store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("invalid store settings: {0}")]
    InvalidSettings(String),
    #[error("failed to initialize backend: {0}")]
    Storage(#[from] StorageError),
}
