use burrow_core::{Result, StoreError};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use typed_builder::TypedBuilder;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Inputs for opening a store.
///
/// A database DSN selects the PostgreSQL backend and takes precedence over a
/// journal file path.
#[derive(Debug, Clone, TypedBuilder)]
pub struct StoreConfig {
    #[builder(default, setter(strip_option, into))]
    pub file_storage_path: Option<PathBuf>,
    #[builder(default, setter(strip_option, into))]
    pub database_dsn: Option<String>,
    #[builder(default = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,
    /// Deadline applied to every database round trip.
    #[builder(default = DEFAULT_STATEMENT_TIMEOUT)]
    pub statement_timeout: Duration,
}

/// The backend a [`StoreConfig`] resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Journal,
    Postgres,
}

impl Display for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Journal => write!(f, "journal"),
            Backend::Postgres => write!(f, "postgres"),
        }
    }
}

impl StoreConfig {
    /// Picks the backend. Fails when neither input is present.
    pub fn backend(&self) -> Result<Backend> {
        if self.database_dsn.as_deref().is_some_and(|dsn| !dsn.is_empty()) {
            return Ok(Backend::Postgres);
        }
        if self
            .file_storage_path
            .as_deref()
            .is_some_and(|path| !path.as_os_str().is_empty())
        {
            return Ok(Backend::Journal);
        }
        Err(StoreError::Configuration(
            "either a database DSN or a file storage path is required".to_string(),
        ))
    }

    pub(crate) fn journal_path(&self) -> Result<&Path> {
        self.file_storage_path
            .as_deref()
            .ok_or_else(|| StoreError::Configuration("file storage path is missing".to_string()))
    }

    pub(crate) fn dsn(&self) -> Result<&str> {
        self.database_dsn
            .as_deref()
            .ok_or_else(|| StoreError::Configuration("database DSN is missing".to_string()))
    }
}
