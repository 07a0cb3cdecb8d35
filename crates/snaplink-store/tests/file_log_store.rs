use async_trait::async_trait;
use snaplink_core::{ShortCode, StorageError};
use snaplink_generator::{RandomGenerator, RandomGeneratorSettings};
use snaplink_storage::{FileLogBackend, FileLogSettings, LogSink};
use snaplink_store::{ResolveError, SaveError, ShortLinkStore, StoreSettings};
use std::io;
use tempfile::TempDir;

fn generator() -> RandomGenerator {
    RandomGenerator::new(RandomGeneratorSettings::default()).unwrap()
}

fn settings(dir: &TempDir) -> FileLogSettings {
    FileLogSettings::builder()
        .path(dir.path().join("links.tsv"))
        .build()
}

async fn open(dir: &TempDir) -> ShortLinkStore<FileLogBackend, RandomGenerator> {
    ShortLinkStore::open(
        FileLogBackend::new(settings(dir)),
        generator(),
        StoreSettings::default(),
    )
    .await
    .unwrap()
}

struct FullDisk;

#[async_trait]
impl LogSink for FullDisk {
    async fn append(&mut self, _record: &[u8]) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
    }
}

#[tokio::test]
async fn saved_links_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let targets: Vec<String> = (0..20)
        .map(|i| format!("https://example.com/articles/{i}?ref=feed"))
        .collect();

    let mut saved = vec![];
    {
        let store = open(&dir).await;
        for target in &targets {
            saved.push((store.save(target).await.unwrap(), target.clone()));
        }
        store.close().await.unwrap();
    }

    let store = open(&dir).await;
    assert_eq!(store.backend().len().await, targets.len());
    for (code, target) in saved {
        assert_eq!(store.resolve(&code).await.unwrap(), target);
    }
}

fn seeded(seed: u64) -> RandomGenerator {
    RandomGenerator::new(RandomGeneratorSettings::builder().seed(seed).build()).unwrap()
}

#[tokio::test]
async fn failed_append_is_not_visible() {
    let dir = TempDir::new().unwrap();
    let backend = FileLogBackend::with_sink(settings(&dir), FullDisk);
    let store = ShortLinkStore::open(backend, seeded(11), StoreSettings::default())
        .await
        .unwrap();
    let attempted: ShortCode = seeded(11).next_code();

    let err = store.save("https://example.com").await.unwrap_err();
    assert!(matches!(err, SaveError::Persistence(StorageError::Io(_))));
    assert!(store.backend().is_empty().await);

    let err = store.resolve(&attempted).await.unwrap_err();
    assert_eq!(err, ResolveError::NotFound(attempted.to_string()));
}

#[tokio::test]
async fn closed_store_clones_report_not_open() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir).await;
    let code = store.save("https://example.com").await.unwrap();
    let other = store.clone();

    store.close().await.unwrap();

    let err = other.resolve(&code).await.unwrap_err();
    assert_eq!(
        err,
        ResolveError::Persistence(StorageError::NotOpen("file-log"))
    );
}
