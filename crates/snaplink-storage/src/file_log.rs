//! Append-only file log backend.
//!
//! Every record is one line of the form `<code>\t<target>\n`. The whole log is
//! replayed into an in-memory index on [`Backend::initialize`]; afterwards the
//! index answers lookups and existence checks, and the file is only ever
//! appended to.

use async_trait::async_trait;
use snaplink_core::backend::{Backend, InsertOutcome, ShortLink};
use snaplink_core::error::{Result, StorageError};
use snaplink_core::ShortCode;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::{debug, info, trace, warn};
use typed_builder::TypedBuilder;

const BACKEND_NAME: &str = "file-log";

/// Configures a [`FileLogBackend`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct FileLogSettings {
    /// Location of the log. Created on first use.
    #[builder(setter(into))]
    pub path: PathBuf,
    /// Call `sync_data` after every append.
    #[builder(default = false)]
    pub sync_writes: bool,
}

/// Durable destination for log records.
///
/// `append` receives one complete record. On `Err` the sink must leave no
/// part of that record behind.
#[async_trait]
pub trait LogSink: Send + Sync + 'static {
    async fn append(&mut self, record: &[u8]) -> io::Result<()>;

    async fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// [`LogSink`] writing to a file opened in append mode.
///
/// The file never keeps bytes past the last acknowledged record: a failed
/// append is truncated away immediately, and an append whose future was
/// dropped mid-write is truncated away before the next append or on close.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: File,
    /// Length of the prefix made of acknowledged records.
    committed: u64,
    /// Set while an append is in flight; still set on entry if the previous
    /// append was cancelled.
    dirty: bool,
    sync_writes: bool,
}

impl FileSink {
    /// Opens `path` for appending. `committed` is the length of the file made
    /// of complete records; unacknowledged bytes are truncated back to it.
    pub async fn open(path: &Path, committed: u64, sync_writes: bool) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            committed,
            dirty: false,
            sync_writes,
        })
    }

    /// Waits for any write still running in the background, then cuts the
    /// file back to the committed length.
    async fn discard_uncommitted(&mut self) -> io::Result<()> {
        if let Err(err) = self.file.flush().await {
            debug!(path = %self.path.display(), error = %err, "pending log write failed");
        }

        // A handle that just failed a write may keep reporting that error.
        OpenOptions::new()
            .write(true)
            .open(&self.path)
            .await?
            .set_len(self.committed)
            .await?;

        self.dirty = false;
        Ok(())
    }

    async fn write_record(&mut self, record: &[u8]) -> io::Result<()> {
        self.file.write_all(record).await?;
        self.file.flush().await?;
        if self.sync_writes {
            self.file.sync_data().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl LogSink for FileSink {
    async fn append(&mut self, record: &[u8]) -> io::Result<()> {
        if self.dirty {
            warn!(
                committed = self.committed,
                "discarding log record left by an interrupted append"
            );
            self.discard_uncommitted().await?;
        }

        self.dirty = true;
        match self.write_record(record).await {
            Ok(()) => {
                self.committed += record.len() as u64;
                self.dirty = false;
                Ok(())
            }
            Err(err) => {
                if let Err(truncate_err) = self.discard_uncommitted().await {
                    warn!(
                        committed = self.committed,
                        error = %truncate_err,
                        "failed to discard partial log record"
                    );
                }
                Err(err)
            }
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        if self.dirty {
            self.discard_uncommitted().await?;
        }
        self.file.flush().await?;
        self.file.sync_all().await
    }
}

struct LogState {
    index: HashMap<String, String>,
    sink: Option<Box<dyn LogSink>>,
}

/// File-backed implementation of the [`Backend`] trait.
///
/// Inserts take the exclusive lock, append the record and only then publish
/// it in the index. A failed or cancelled append therefore leaves nothing
/// visible in memory that is not also on disk.
pub struct FileLogBackend {
    settings: FileLogSettings,
    state: RwLock<LogState>,
}

impl FileLogBackend {
    pub fn new(settings: FileLogSettings) -> Self {
        Self {
            settings,
            state: RwLock::new(LogState {
                index: HashMap::new(),
                sink: None,
            }),
        }
    }

    /// Uses `sink` for appends instead of opening the log file. The file at
    /// `settings.path` is still replayed on initialization.
    pub fn with_sink(settings: FileLogSettings, sink: impl LogSink) -> Self {
        Self {
            settings,
            state: RwLock::new(LogState {
                index: HashMap::new(),
                sink: Some(Box::new(sink)),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.settings.path
    }

    /// Number of records in the in-memory index.
    pub async fn len(&self) -> usize {
        self.state.read().await.index.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.index.is_empty()
    }
}

impl fmt::Debug for FileLogBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileLogBackend")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Backend for FileLogBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn initialize(&self) -> Result<usize> {
        let path = self.settings.path.as_path();
        let replay = replay(path).await?;
        let restored = replay.index.len();

        let mut state = self.state.write().await;
        if state.sink.is_none() {
            let sink = FileSink::open(path, replay.committed, self.settings.sync_writes).await?;
            state.sink = Some(Box::new(sink));
        }
        state.index = replay.index;

        info!(path = %path.display(), restored, "file log replayed");
        Ok(restored)
    }

    async fn insert_if_absent(&self, code: &ShortCode, target: &str) -> Result<InsertOutcome> {
        if code.as_str().contains(['\t', '\n', '\r']) {
            return Err(StorageError::InvalidData(format!(
                "code cannot be stored in a line record: {code:?}"
            )));
        }
        if target.contains(['\n', '\r']) {
            return Err(StorageError::InvalidData(
                "target contains a line break".to_string(),
            ));
        }

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let Some(sink) = state.sink.as_mut() else {
            return Err(StorageError::NotOpen(BACKEND_NAME));
        };

        if state.index.contains_key(code.as_str()) {
            trace!(code = %code, "code already taken");
            return Ok(InsertOutcome::AlreadyExists);
        }

        let record = format!("{code}\t{target}\n");
        if let Err(err) = sink.append(record.as_bytes()).await {
            debug!(code = %code, error = %err, "append failed, record not indexed");
            return Err(StorageError::Io(format!(
                "failed to append record for '{code}' to {}: {err}",
                self.settings.path.display()
            )));
        }

        state
            .index
            .insert(code.as_str().to_owned(), target.to_owned());
        Ok(InsertOutcome::Inserted)
    }

    async fn lookup(&self, code: &ShortCode) -> Result<Option<String>> {
        let state = self.state.read().await;
        if state.sink.is_none() {
            return Err(StorageError::NotOpen(BACKEND_NAME));
        }
        Ok(state.index.get(code.as_str()).cloned())
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(mut sink) = state.sink.take() {
            sink.close().await?;
        }
        state.index.clear();
        Ok(())
    }
}

struct Replay {
    index: HashMap<String, String>,
    /// Length of the prefix made of complete records.
    committed: u64,
}

async fn replay(path: &Path) -> Result<Replay> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .await
        .map_err(|e| {
            StorageError::Io(format!("failed to open log {}: {e}", path.display()))
        })?;

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).await?;

    let complete_len = bytes.iter().rposition(|b| *b == b'\n').map_or(0, |pos| pos + 1);
    if complete_len < bytes.len() {
        warn!(
            path = %path.display(),
            discarded = bytes.len() - complete_len,
            "discarding torn record at end of log"
        );
        file.set_len(complete_len as u64).await?;
    }

    let mut index = HashMap::new();
    let mut records = 0usize;
    for (line_no, line) in bytes[..complete_len].split(|b| *b == b'\n').enumerate() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            continue;
        }

        match parse_record(line) {
            Some(link) => {
                records += 1;
                index.insert(link.code.into_string(), link.target);
            }
            None => warn!(
                path = %path.display(),
                line = line_no + 1,
                "skipping malformed log record"
            ),
        }
    }

    if records > index.len() {
        debug!(
            path = %path.display(),
            duplicates = records - index.len(),
            "log contains repeated codes, kept the latest"
        );
    }

    Ok(Replay {
        index,
        committed: complete_len as u64,
    })
}

/// Splits a line on its first tab. The target keeps any further tabs.
fn parse_record(line: &[u8]) -> Option<ShortLink> {
    let line = std::str::from_utf8(line).ok()?;
    let (code, target) = line.split_once('\t')?;
    if code.is_empty() {
        return None;
    }
    Some(ShortLink {
        code: ShortCode::new_unchecked(code),
        target: target.to_owned(),
    })
}
