use std::time::Duration;

use snaplink_storage::{Backend, InsertOutcome, MySqlBackend, MySqlSettings, ShortCode};
use snaplink_test_infra::{MySqlServer, MysqlConfig};

struct Fixture {
    _mysql: MySqlServer,
    backend: MySqlBackend,
}

impl Fixture {
    async fn start() -> Self {
        let mysql = MySqlServer::new(MysqlConfig::builder().build())
            .await
            .expect("start mysql");
        let dsn = mysql.dsn().await.expect("mysql dsn");
        let backend = connect_with_retry(&dsn).await;

        backend.initialize().await.expect("create schema");

        Self {
            _mysql: mysql,
            backend,
        }
    }
}

async fn connect_with_retry(dsn: &str) -> MySqlBackend {
    let mut last_error = None;

    for _ in 0..20 {
        match MySqlBackend::connect(dsn, MySqlSettings::default()).await {
            Ok(backend) => return backend,
            Err(err) => {
                last_error = Some(err);
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }

    panic!("failed to connect mysql: {last_error:?}");
}

fn code(value: &str) -> ShortCode {
    ShortCode::new_unchecked(value)
}

#[tokio::test]
async fn insert_and_lookup() {
    let fixture = Fixture::start().await;

    let outcome = fixture
        .backend
        .insert_if_absent(&code("abc123"), "https://example.com")
        .await
        .unwrap();
    assert_eq!(outcome, InsertOutcome::Inserted);

    let target = fixture.backend.lookup(&code("abc123")).await.unwrap();
    assert_eq!(target.as_deref(), Some("https://example.com"));
}

#[tokio::test]
async fn duplicate_code_reports_already_exists() {
    let fixture = Fixture::start().await;

    fixture
        .backend
        .insert_if_absent(&code("abc123"), "https://one.example")
        .await
        .unwrap();
    let outcome = fixture
        .backend
        .insert_if_absent(&code("abc123"), "https://two.example")
        .await
        .unwrap();

    assert_eq!(outcome, InsertOutcome::AlreadyExists);
    let target = fixture.backend.lookup(&code("abc123")).await.unwrap();
    assert_eq!(target.as_deref(), Some("https://one.example"));
}

#[tokio::test]
async fn lookup_missing_code_is_none() {
    let fixture = Fixture::start().await;

    assert!(fixture
        .backend
        .lookup(&code("doesnotexist"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn codes_differing_only_in_case_are_distinct() {
    let fixture = Fixture::start().await;

    fixture
        .backend
        .insert_if_absent(&code("abcDEF"), "https://lower.example")
        .await
        .unwrap();
    let outcome = fixture
        .backend
        .insert_if_absent(&code("ABCdef"), "https://upper.example")
        .await
        .unwrap();

    assert_eq!(outcome, InsertOutcome::Inserted);
    let target = fixture.backend.lookup(&code("ABCdef")).await.unwrap();
    assert_eq!(target.as_deref(), Some("https://upper.example"));
}

#[tokio::test]
async fn initialize_is_idempotent() {
    let fixture = Fixture::start().await;

    fixture
        .backend
        .insert_if_absent(&code("keep01"), "https://example.com")
        .await
        .unwrap();

    assert_eq!(fixture.backend.initialize().await.unwrap(), 0);
    assert!(fixture
        .backend
        .lookup(&code("keep01"))
        .await
        .unwrap()
        .is_some());
}
