use crate::config::{Backend, StoreConfig};
use crate::journal::JournalStore;
use crate::postgres::PostgresStore;
use async_trait::async_trait;
use burrow_core::{Result, ShortCode, Store, UserUrl};
use tracing::info;

/// The store selected from a [`StoreConfig`].
///
/// Exactly one backend is chosen when the store is opened; callers only see
/// the [`Store`] capability.
#[derive(Debug, Clone)]
pub enum AnyStore {
    Journal(JournalStore),
    Postgres(PostgresStore),
}

impl AnyStore {
    pub fn backend(&self) -> Backend {
        match self {
            AnyStore::Journal(_) => Backend::Journal,
            AnyStore::Postgres(_) => Backend::Postgres,
        }
    }
}

impl From<JournalStore> for AnyStore {
    fn from(store: JournalStore) -> Self {
        AnyStore::Journal(store)
    }
}

impl From<PostgresStore> for AnyStore {
    fn from(store: PostgresStore) -> Self {
        AnyStore::Postgres(store)
    }
}

/// Opens the store described by `config`.
///
/// A database DSN wins over a file path. Any error returned here is fatal for
/// the caller: the store could not be constructed.
pub async fn open(config: &StoreConfig) -> Result<AnyStore> {
    let backend = config.backend()?;
    info!(%backend, "opening store");

    match backend {
        Backend::Postgres => Ok(PostgresStore::connect(config).await?.into()),
        Backend::Journal => Ok(JournalStore::open(config.journal_path()?).await?.into()),
    }
}

macro_rules! delegate {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            AnyStore::Journal($store) => $call,
            AnyStore::Postgres($store) => $call,
        }
    };
}

#[async_trait]
impl Store for AnyStore {
    async fn shorten_url(&self, user_id: &str, original_url: &str) -> Result<ShortCode> {
        delegate!(self, store => store.shorten_url(user_id, original_url).await)
    }

    async fn redirect_url(&self, code: &ShortCode) -> Result<String> {
        delegate!(self, store => store.redirect_url(code).await)
    }

    async fn batch_shorten_urls(
        &self,
        user_id: &str,
        original_urls: &[String],
    ) -> Result<Vec<ShortCode>> {
        delegate!(self, store => store.batch_shorten_urls(user_id, original_urls).await)
    }

    async fn user_urls(&self, user_id: &str, base_url: &str) -> Result<Vec<UserUrl>> {
        delegate!(self, store => store.user_urls(user_id, base_url).await)
    }

    async fn delete_user_urls(&self, user_id: &str, codes: &[ShortCode]) -> Result<()> {
        delegate!(self, store => store.delete_user_urls(user_id, codes).await)
    }

    async fn ping(&self) -> Result<()> {
        delegate!(self, store => store.ping().await)
    }
}
