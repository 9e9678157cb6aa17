use std::time::Duration;

use burrow_core::{ShortCode, Store, StoreError, UserUrl};
use burrow_storage::{open, Backend, PostgresStore, StoreConfig};
use burrow_test_infra::postgres::{PostgresConfig, PostgresServer};
use sqlx::postgres::PgPoolOptions;

const BASE_URL: &str = "http://localhost:8080";

struct Fixture {
    _postgres: PostgresServer,
    url: String,
    store: PostgresStore,
}

impl Fixture {
    async fn start() -> Self {
        let postgres = PostgresServer::new(PostgresConfig::builder().build())
            .await
            .expect("start postgres");
        let url = postgres.database_url().await.expect("postgres url");
        let pool = connect_with_retry(&url).await;

        let store = PostgresStore::new(pool, Duration::from_secs(5));
        store.migrate().await.expect("migrate schema");

        Self {
            _postgres: postgres,
            url,
            store,
        }
    }

    async fn row_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM shortener")
            .fetch_one(self.store.pool())
            .await
            .unwrap()
    }
}

async fn connect_with_retry(url: &str) -> sqlx::PgPool {
    let mut last_error = None;

    for _ in 0..20 {
        match PgPoolOptions::new().max_connections(5).connect(url).await {
            Ok(pool) => return pool,
            Err(err) => {
                last_error = Some(err);
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }

    panic!("failed to connect postgres: {last_error:?}");
}

fn urls(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn shorten_is_idempotent_across_users() {
    let fixture = Fixture::start().await;
    let store = &fixture.store;

    let code = store
        .shorten_url("user-1", "https://practicum.yandex.ru/")
        .await
        .unwrap();
    assert_eq!(code.as_str(), "QrPnX5IU");

    let again = store
        .shorten_url("user-2", "https://practicum.yandex.ru/")
        .await
        .unwrap_err();
    assert!(matches!(&again, StoreError::Duplicate(existing) if *existing == code));

    assert_eq!(
        store.redirect_url(&code).await.unwrap(),
        "https://practicum.yandex.ru/"
    );
    assert_eq!(
        store.user_urls("user-1", BASE_URL).await.unwrap(),
        vec![UserUrl {
            short_url: format!("{BASE_URL}/{code}"),
            original_url: "https://practicum.yandex.ru/".to_string(),
        }]
    );
    assert!(store.user_urls("user-2", BASE_URL).await.unwrap().is_empty());
    assert_eq!(fixture.row_count().await, 1);
}

#[tokio::test]
async fn redirect_unknown_code_is_not_found() {
    let fixture = Fixture::start().await;

    let err = fixture
        .store
        .redirect_url(&ShortCode::parse("abcdefgh").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn batch_commits_every_item() {
    let fixture = Fixture::start().await;
    let store = &fixture.store;
    let existing = store
        .shorten_url("user-2", "https://example.com/existing")
        .await
        .unwrap();

    let batch = urls(&[
        "https://example.com/a",
        "https://example.com/existing",
        "https://example.com/a",
        "https://example.com/b",
    ]);
    let codes = store.batch_shorten_urls("user-1", &batch).await.unwrap();

    assert_eq!(codes[0], ShortCode::generate("https://example.com/a"));
    assert_eq!(codes[1], existing);
    assert_eq!(codes[2], codes[0]);
    assert_eq!(codes[3], ShortCode::generate("https://example.com/b"));
    assert_eq!(fixture.row_count().await, 3);
    assert_eq!(store.user_urls("user-1", BASE_URL).await.unwrap().len(), 2);
}

#[tokio::test]
async fn batch_deadline_applies_per_statement() {
    let fixture = Fixture::start().await;
    // each round trip fits the deadline easily, the whole batch does not
    let store = PostgresStore::new(fixture.store.pool().clone(), Duration::from_millis(200));

    let batch: Vec<String> = (0..2_000)
        .map(|i| format!("https://example.com/page/{i}"))
        .collect();
    let codes = store.batch_shorten_urls("user-1", &batch).await.unwrap();

    assert_eq!(codes.len(), batch.len());
    assert_eq!(fixture.row_count().await, 2_000);
}

#[tokio::test]
async fn batch_with_rejected_item_leaves_no_rows() {
    let fixture = Fixture::start().await;

    // postgres refuses NUL bytes in text columns
    let batch = urls(&[
        "https://example.com/a",
        "https://example.com/\u{0}broken",
        "https://example.com/b",
    ]);
    let err = fixture
        .store
        .batch_shorten_urls("user-1", &batch)
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Query(_)), "unexpected error: {err}");
    assert_eq!(fixture.row_count().await, 0);
}

#[tokio::test]
async fn soft_delete_hides_record_but_keeps_row() {
    let fixture = Fixture::start().await;
    let store = &fixture.store;
    let code = store
        .shorten_url("user-1", "https://example.com")
        .await
        .unwrap();

    store
        .delete_user_urls("user-1", std::slice::from_ref(&code))
        .await
        .unwrap();

    let err = store.redirect_url(&code).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
    assert!(store.user_urls("user-1", BASE_URL).await.unwrap().is_empty());
    assert_eq!(fixture.row_count().await, 1);

    let deleted: bool = sqlx::query_scalar("SELECT is_deleted FROM shortener WHERE short_code = $1")
        .bind(code.as_str())
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert!(deleted);
}

#[tokio::test]
async fn delete_by_non_owner_is_ignored() {
    let fixture = Fixture::start().await;
    let store = &fixture.store;
    let code = store
        .shorten_url("owner", "https://example.com")
        .await
        .unwrap();

    store
        .delete_user_urls("intruder", &[code.clone(), ShortCode::parse("zzzzzzzz").unwrap()])
        .await
        .unwrap();

    assert_eq!(
        store.redirect_url(&code).await.unwrap(),
        "https://example.com"
    );
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let fixture = Fixture::start().await;

    fixture.store.migrate().await.unwrap();
    fixture.store.migrate().await.unwrap();
    fixture.store.ping().await.unwrap();
}

#[tokio::test]
async fn open_prefers_database_over_file() {
    let fixture = Fixture::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::builder()
        .file_storage_path(dir.path().join("urls.json"))
        .database_dsn(fixture.url.clone())
        .build();

    let store = open(&config).await.unwrap();
    assert_eq!(store.backend(), Backend::Postgres);
    store.ping().await.unwrap();

    let code = store
        .shorten_url("user-1", "https://example.com")
        .await
        .unwrap();
    assert_eq!(
        fixture.store.redirect_url(&code).await.unwrap(),
        "https://example.com"
    );
    assert!(!dir.path().join("urls.json").exists());
}
