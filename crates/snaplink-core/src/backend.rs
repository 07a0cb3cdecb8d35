use crate::error::Result;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A short code together with the long URL it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortLink {
    pub code: ShortCode,
    /// The original URL. Not validated at this layer.
    pub target: String,
}

/// Outcome of [`Backend::insert_if_absent`] when the backend itself did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was stored durably.
    Inserted,
    /// Another record already owns the code; nothing was written.
    AlreadyExists,
}

/// Persistence contract shared by the memory, file-log and relational backends.
///
/// `insert_if_absent` is atomic per backend instance: when two callers race on
/// the same code exactly one observes [`InsertOutcome::Inserted`].
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Prepares the backend and returns the number of records restored into
    /// memory. Stateless backends return `0`.
    async fn initialize(&self) -> Result<usize>;

    /// Stores `target` under `code` unless the code is already taken.
    ///
    /// `Err` means the backend could not tell or could not persist; in that
    /// case no trace of the record is left behind.
    async fn insert_if_absent(&self, code: &ShortCode, target: &str) -> Result<InsertOutcome>;

    /// Retrieves the target for a code. Returns `None` if the code does not exist.
    async fn lookup(&self, code: &ShortCode) -> Result<Option<String>>;

    /// Releases any handle the backend holds.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
