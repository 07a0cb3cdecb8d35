//! Persistence backends for short links.
//!
//! Three implementations of [`Backend`] live here: a process-local map, an
//! append-only file log replayed on start, and a MySQL table.

pub mod file_log;
pub mod memory;
pub mod mysql;

pub use file_log::{FileLogBackend, FileLogSettings, FileSink, LogSink};
pub use memory::MemoryBackend;
pub use mysql::{MySqlBackend, MySqlSettings};
pub use snaplink_core::{Backend, InsertOutcome, ShortCode, StorageError};
