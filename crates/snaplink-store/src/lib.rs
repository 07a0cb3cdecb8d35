//! Short-link store.
//!
//! [`ShortLinkStore`] ties a code [`Generator`](snaplink_generator::Generator)
//! to a persistence [`Backend`](snaplink_core::Backend) and retries generation
//! when a candidate is already taken.

pub mod error;
pub mod store;

pub use error::{ResolveError, SaveError, StoreError};
pub use store::{ShortLinkStore, StoreSettings, DEFAULT_MAX_ATTEMPTS};
