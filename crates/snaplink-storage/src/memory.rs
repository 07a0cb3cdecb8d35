use async_trait::async_trait;
use parking_lot::RwLock;
use snaplink_core::backend::{Backend, InsertOutcome};
use snaplink_core::error::Result;
use snaplink_core::ShortCode;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::trace;

/// In-memory implementation of the [`Backend`] trait.
///
/// All codes live in one map behind a single reader/writer lock: lookups
/// share the read side, and every insert runs its existence check and write
/// under the exclusive side so two racing inserts can never both win.
/// Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    links: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    /// Creates a new in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory backend with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            links: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.links.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.read().is_empty()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn initialize(&self) -> Result<usize> {
        Ok(0)
    }

    async fn insert_if_absent(&self, code: &ShortCode, target: &str) -> Result<InsertOutcome> {
        let mut links = self.links.write();

        match links.entry(code.as_str().to_owned()) {
            Entry::Occupied(_) => {
                trace!(code = %code, "code already taken");
                Ok(InsertOutcome::AlreadyExists)
            }
            Entry::Vacant(slot) => {
                slot.insert(target.to_owned());
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn lookup(&self, code: &ShortCode) -> Result<Option<String>> {
        Ok(self.links.read().get(code.as_str()).cloned())
    }
}
