use crate::config::StoreConfig;
use async_trait::async_trait;
use burrow_core::{validate_original_url, Result, ShortCode, Store, StoreError, UserUrl};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, PgExecutor, PgPool};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// PostgreSQL implementation of the store contract.
///
/// Uniqueness of original URLs and short codes is enforced by unique indexes;
/// a violated original URL index turns into the duplicate signal. Soft delete
/// is the `is_deleted` flag; reads only return rows where it is false.
///
/// Every round trip runs under the configured statement timeout. Dropping a
/// future aborts the in-flight statement and rolls back an open transaction.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    statement_timeout: Duration,
}

impl PostgresStore {
    /// Creates a store from an existing connection pool.
    ///
    /// Migrations are not applied; call [`PostgresStore::migrate`] first if
    /// the schema may be missing.
    pub fn new(pool: PgPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }

    /// Opens a connection pool from `config` and brings the schema up to date.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let dsn = config.dsn()?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.statement_timeout)
            .connect(dsn)
            .await
            .map_err(|e| {
                error!(error = %e, "failed to connect to postgres");
                StoreError::Initialization(format!("failed to connect: {e}"))
            })?;

        let store = Self::new(pool, config.statement_timeout);
        store.migrate().await?;
        Ok(store)
    }

    /// Applies pending schema migrations. Safe to run on every startup.
    pub async fn migrate(&self) -> Result<()> {
        info!("applying database migrations");
        MIGRATOR.run(&self.pool).await.map_err(|e| {
            error!(error = %e, "database migration failed");
            StoreError::Migration(e.to_string())
        })
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn with_deadline<T, E, F>(
        &self,
        op: &'static str,
        fut: F,
    ) -> Result<std::result::Result<T, E>>
    where
        F: Future<Output = std::result::Result<T, E>>,
    {
        tokio::time::timeout(self.statement_timeout, fut)
            .await
            .map_err(|_| {
                error!(op, timeout = ?self.statement_timeout, "database call timed out");
                StoreError::Timeout(format!("{op} exceeded {:?}", self.statement_timeout))
            })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StoreError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StoreError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StoreError::InvalidData(message),
        _ => StoreError::Query(message),
    }
}

fn stored_code(raw: String) -> Result<ShortCode> {
    ShortCode::parse(raw).map_err(|e| StoreError::InvalidData(e.to_string()))
}

async fn find_code<'e, E: PgExecutor<'e>>(
    executor: E,
    original_url: &str,
) -> std::result::Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT short_code
        FROM shortener
        WHERE original_url = $1
        LIMIT 1
        "#,
    )
    .bind(original_url)
    .fetch_optional(executor)
    .await
}

#[async_trait]
impl Store for PostgresStore {
    #[tracing::instrument(skip(self))]
    async fn shorten_url(&self, user_id: &str, original_url: &str) -> Result<ShortCode> {
        validate_original_url(original_url)?;
        let code = ShortCode::generate(original_url);

        let inserted = self
            .with_deadline(
                "insert",
                sqlx::query(
                    r#"
                    INSERT INTO shortener (short_code, original_url, user_id)
                    VALUES ($1, $2, $3)
                    "#,
                )
                .bind(code.as_str())
                .bind(original_url)
                .bind(user_id)
                .execute(&self.pool),
            )
            .await?;

        match inserted {
            Ok(_) => Ok(code),
            Err(err) if is_unique_violation(&err) => {
                let existing = self
                    .with_deadline("select existing", find_code(&self.pool, original_url))
                    .await?
                    .map_err(map_sqlx_error)?;

                match existing {
                    Some(existing) => {
                        debug!(code = %existing, "url already shortened");
                        Err(StoreError::Duplicate(stored_code(existing)?))
                    }
                    None => Err(StoreError::CodeCollision(code.to_string())),
                }
            }
            Err(err) => {
                error!(error = %err, "insert failed");
                Err(map_sqlx_error(err))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn redirect_url(&self, code: &ShortCode) -> Result<String> {
        let original_url: Option<String> = self
            .with_deadline(
                "select original url",
                sqlx::query_scalar(
                    r#"
                    SELECT original_url
                    FROM shortener
                    WHERE short_code = $1
                      AND NOT is_deleted
                    LIMIT 1
                    "#,
                )
                .bind(code.as_str())
                .fetch_optional(&self.pool),
            )
            .await?
            .map_err(map_sqlx_error)?;

        original_url.ok_or_else(|| StoreError::NotFound(code.to_string()))
    }

    #[tracing::instrument(skip(self, original_urls), fields(items = original_urls.len()))]
    async fn batch_shorten_urls(
        &self,
        user_id: &str,
        original_urls: &[String],
    ) -> Result<Vec<ShortCode>> {
        for url in original_urls {
            validate_original_url(url)?;
        }

        let mut tx = self
            .with_deadline("begin batch", self.pool.begin())
            .await?
            .map_err(map_sqlx_error)?;
        let mut codes = Vec::with_capacity(original_urls.len());

        // an early return drops `tx`, which rolls the whole batch back
        for url in original_urls {
            let code = ShortCode::generate(url);
            let inserted = self
                .with_deadline(
                    "batch insert",
                    sqlx::query(
                        r#"
                        INSERT INTO shortener (short_code, original_url, user_id)
                        VALUES ($1, $2, $3)
                        ON CONFLICT (original_url) DO NOTHING
                        "#,
                    )
                    .bind(code.as_str())
                    .bind(url)
                    .bind(user_id)
                    .execute(&mut *tx),
                )
                .await?
                .map_err(|err| {
                    if is_unique_violation(&err) {
                        StoreError::CodeCollision(code.to_string())
                    } else {
                        error!(error = %err, "batch insert failed, rolling back");
                        map_sqlx_error(err)
                    }
                })?
                .rows_affected();

            if inserted == 0 {
                let existing = self
                    .with_deadline("batch select existing", find_code(&mut *tx, url))
                    .await?
                    .map_err(map_sqlx_error)?
                    .ok_or_else(|| {
                        StoreError::InvalidData(format!("conflicting row for {url} vanished"))
                    })?;
                codes.push(stored_code(existing)?);
            } else {
                codes.push(code);
            }
        }

        self.with_deadline("batch commit", tx.commit())
            .await?
            .map_err(map_sqlx_error)?;
        Ok(codes)
    }

    #[tracing::instrument(skip(self))]
    async fn user_urls(&self, user_id: &str, base_url: &str) -> Result<Vec<UserUrl>> {
        let rows: Vec<(String, String)> = self
            .with_deadline(
                "select user urls",
                sqlx::query_as(
                    r#"
                    SELECT short_code, original_url
                    FROM shortener
                    WHERE user_id = $1
                      AND NOT is_deleted
                    ORDER BY id
                    "#,
                )
                .bind(user_id)
                .fetch_all(&self.pool),
            )
            .await?
            .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|(code, original_url)| {
                Ok(UserUrl {
                    short_url: stored_code(code)?.to_url(base_url),
                    original_url,
                })
            })
            .collect()
    }

    #[tracing::instrument(skip(self, codes), fields(items = codes.len()))]
    async fn delete_user_urls(&self, user_id: &str, codes: &[ShortCode]) -> Result<()> {
        if codes.is_empty() {
            return Ok(());
        }
        let codes: Vec<String> = codes.iter().map(|code| code.as_str().to_owned()).collect();

        // one round trip; rows not owned by `user_id` simply do not match
        let result = self
            .with_deadline(
                "soft delete",
                sqlx::query(
                    r#"
                    UPDATE shortener
                    SET is_deleted = TRUE
                    WHERE user_id = $1
                      AND short_code = ANY($2)
                      AND NOT is_deleted
                    "#,
                )
                .bind(user_id)
                .bind(codes)
                .execute(&self.pool),
            )
            .await?
            .map_err(map_sqlx_error)?;

        debug!(rows = result.rows_affected(), "urls marked deleted");
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let ping = async {
            let mut conn = self.pool.acquire().await?;
            conn.ping().await
        };

        self.with_deadline("ping", ping)
            .await?
            .map_err(map_sqlx_error)
    }
}
