use crate::error::{ResolveError, SaveError, StoreError};
use snaplink_core::{Backend, InsertOutcome, ShortCode};
use snaplink_generator::Generator;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use typed_builder::TypedBuilder;

/// Candidates tried per save unless configured otherwise.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct StoreSettings {
    /// Upper bound on generated candidates per save. Must be at least 1.
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Maps targets to freshly generated short codes and back.
///
/// Uniqueness is decided by the backend's atomic insert; the store only
/// retries with a new candidate when told the code is taken. Backend failures
/// are surfaced right away and never retried.
///
/// Cloning is cheap and every clone shares the same backend.
#[derive(Debug)]
pub struct ShortLinkStore<B, G> {
    backend: Arc<B>,
    generator: Arc<G>,
    settings: StoreSettings,
}

impl<B, G> Clone for ShortLinkStore<B, G> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            generator: Arc::clone(&self.generator),
            settings: self.settings,
        }
    }
}

impl<B: Backend, G: Generator> ShortLinkStore<B, G> {
    /// Initializes `backend` and returns a store ready for use.
    pub async fn open(
        backend: B,
        generator: G,
        settings: StoreSettings,
    ) -> Result<Self, StoreError> {
        if settings.max_attempts == 0 {
            return Err(StoreError::InvalidSettings(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        let restored = backend.initialize().await?;
        info!(
            backend = backend.name(),
            restored,
            max_attempts = settings.max_attempts,
            "short link store opened"
        );

        Ok(Self {
            backend: Arc::new(backend),
            generator: Arc::new(generator),
            settings,
        })
    }

    /// Stores `target` under a newly generated code and returns that code.
    ///
    /// The target is stored as given; no normalization or deduplication is
    /// applied, so saving the same target twice yields two codes.
    pub async fn save(&self, target: &str) -> Result<ShortCode, SaveError> {
        let max_attempts = self.settings.max_attempts;

        for attempt in 1..=max_attempts {
            let code: ShortCode = self.generator.generate().into();

            match self.backend.insert_if_absent(&code, target).await {
                Ok(InsertOutcome::Inserted) => {
                    trace!(code = %code, attempt, "short link saved");
                    return Ok(code);
                }
                Ok(InsertOutcome::AlreadyExists) => {
                    debug!(code = %code, attempt, max_attempts, "code collision, retrying");
                }
                Err(err) => {
                    warn!(code = %code, attempt, error = %err, "failed to persist short link");
                    return Err(SaveError::Persistence(err));
                }
            }
        }

        warn!(attempts = max_attempts, "gave up generating a free code");
        Err(SaveError::GenerationExhausted {
            attempts: max_attempts,
        })
    }

    /// Returns the target stored under `code`.
    pub async fn resolve(&self, code: &ShortCode) -> Result<String, ResolveError> {
        match self.backend.lookup(code).await {
            Ok(Some(target)) => Ok(target),
            Ok(None) => Err(ResolveError::NotFound(code.to_string())),
            Err(err) => Err(ResolveError::Persistence(err)),
        }
    }

    /// Releases the backend. Other clones of this store see a closed backend
    /// afterwards.
    pub async fn close(self) -> Result<(), StoreError> {
        self.backend.close().await?;
        debug!(backend = self.backend.name(), "short link store closed");
        Ok(())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn settings(&self) -> StoreSettings {
        self.settings
    }
}
