use async_trait::async_trait;
use burrow_core::{
    validate_original_url, Result, ShortCode, ShorteningRecord, Store, StoreError, UserUrl,
};
use jiff::Timestamp;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// One line of the journal file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum JournalEvent {
    Insert {
        id: Uuid,
        created_at: Timestamp,
        user_id: String,
        short_url: ShortCode,
        original_url: String,
    },
    Delete {
        id: Uuid,
        created_at: Timestamp,
        user_id: String,
        short_url: ShortCode,
    },
}

impl JournalEvent {
    fn insert(user_id: &str, short_url: ShortCode, original_url: &str) -> Self {
        Self::Insert {
            id: Uuid::new_v4(),
            created_at: Timestamp::now(),
            user_id: user_id.to_owned(),
            short_url,
            original_url: original_url.to_owned(),
        }
    }

    fn delete(user_id: &str, short_url: ShortCode) -> Self {
        Self::Delete {
            id: Uuid::new_v4(),
            created_at: Timestamp::now(),
            user_id: user_id.to_owned(),
            short_url,
        }
    }
}

/// Everything guarded by the journal lock: the file handle and the index it
/// backs. Appends and index updates happen under the same guard so that file
/// order is insertion order.
#[derive(Debug)]
struct JournalState {
    file: File,
    /// Length of the file up to the end of the last complete record.
    len: u64,
    index: HashMap<ShortCode, ShorteningRecord>,
    by_user: HashMap<String, Vec<ShortCode>>,
}

impl JournalState {
    fn apply(&mut self, event: JournalEvent) {
        match event {
            JournalEvent::Insert {
                user_id,
                short_url,
                original_url,
                ..
            } => {
                let codes = self.by_user.entry(user_id.clone()).or_default();
                if !codes.contains(&short_url) {
                    codes.push(short_url.clone());
                }
                self.index.insert(
                    short_url.clone(),
                    ShorteningRecord {
                        user_id,
                        short_code: short_url,
                        original_url,
                        deleted: false,
                    },
                );
            }
            JournalEvent::Delete {
                user_id, short_url, ..
            } => {
                if let Some(entry) = self.index.get_mut(&short_url) {
                    if entry.user_id == user_id {
                        entry.deleted = true;
                    }
                }
            }
        }
    }

    /// Appends `events` with a single write and flushes them to disk.
    ///
    /// On failure the file is cut back to its previous length and nothing is
    /// applied to the index.
    fn append(&mut self, events: &[JournalEvent]) -> Result<()> {
        let mut buf = Vec::new();
        for event in events {
            serde_json::to_writer(&mut buf, event).map_err(|e| {
                StoreError::Journal(format!("failed to encode journal record: {e}"))
            })?;
            buf.push(b'\n');
        }

        let written = self
            .file
            .write_all(&buf)
            .and_then(|_| self.file.sync_data());

        if let Err(e) = written {
            error!(error = %e, "journal append failed");
            if let Err(e) = self.file.set_len(self.len) {
                error!(error = %e, "failed to roll back torn journal append");
            }
            return Err(StoreError::Journal(e.to_string()));
        }

        self.len += buf.len() as u64;
        Ok(())
    }

    fn is_owned_live(&self, user_id: &str, code: &ShortCode) -> bool {
        self.index
            .get(code)
            .is_some_and(|entry| entry.user_id == user_id && !entry.deleted)
    }
}

/// A store backed by an append-only journal file.
///
/// The whole index lives in memory and is rebuilt by replaying the journal
/// when the store is opened. Every mutation is appended and flushed to the
/// journal before it becomes visible in memory.
///
/// Every operation runs on the blocking thread pool. Writers hold the lock
/// through `sync_data`, so reads waiting on it never park an async worker.
/// Mutations are not tied to the caller's future: a cancelled caller never
/// interrupts a write halfway.
#[derive(Debug, Clone)]
pub struct JournalStore {
    path: Arc<PathBuf>,
    state: Arc<Mutex<JournalState>>,
}

impl JournalStore {
    /// Opens (creating if needed) the journal at `path` and replays it.
    ///
    /// Replay stops at the first malformed or partial record. A torn final
    /// record is truncated away so later appends start on a clean line; a
    /// malformed record with intact records after it fails the open with
    /// [`StoreError::Initialization`] and the file is left as it is.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let replay_path = path.clone();

        let state = tokio::task::spawn_blocking(move || replay(&replay_path))
            .await
            .map_err(|e| {
                StoreError::Initialization(format!("journal replay task failed: {e}"))
            })??;

        info!(
            path = %path.display(),
            records = state.index.len(),
            "journal replayed"
        );

        Ok(Self {
            path: Arc::new(path),
            state: Arc::new(Mutex::new(state)),
        })
    }

    /// Returns the journal file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn locked<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut JournalState) -> Result<T> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        tokio::task::spawn_blocking(move || {
            let mut guard = state.lock();
            op(&mut *guard)
        })
        .await
        .map_err(|e| StoreError::Journal(format!("journal task failed: {e}")))?
    }
}

fn replay(path: &Path) -> Result<JournalState> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            StoreError::Initialization(format!(
                "failed to open journal {}: {e}",
                path.display()
            ))
        })?;
    let file_len = file
        .metadata()
        .map_err(|e| StoreError::Initialization(e.to_string()))?
        .len();

    let mut state = JournalState {
        file,
        len: 0,
        index: HashMap::new(),
        by_user: HashMap::new(),
    };
    let mut missing_newline = false;
    let mut events = Vec::new();

    {
        let mut reader = BufReader::new(&state.file);
        let mut line = Vec::new();

        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| StoreError::Initialization(e.to_string()))?;
            if read == 0 {
                break;
            }

            let complete = line.ends_with(b"\n");
            let body = line.trim_ascii();
            if body.is_empty() {
                if !complete {
                    break;
                }
                state.len += read as u64;
                continue;
            }

            match serde_json::from_slice::<JournalEvent>(body) {
                Ok(event) => {
                    events.push(event);
                    state.len += read as u64;
                    missing_newline = !complete;
                }
                Err(e) => {
                    let mut rest = Vec::new();
                    reader
                        .read_to_end(&mut rest)
                        .map_err(|e| StoreError::Initialization(e.to_string()))?;

                    if complete && !rest.trim_ascii().is_empty() {
                        error!(
                            path = %path.display(),
                            offset = state.len,
                            error = %e,
                            "malformed journal record followed by further records"
                        );
                        return Err(StoreError::Initialization(format!(
                            "journal {} is corrupt at byte {}: {e}",
                            path.display(),
                            state.len
                        )));
                    }

                    warn!(
                        path = %path.display(),
                        offset = state.len,
                        error = %e,
                        "stopping journal replay at torn final record"
                    );
                    break;
                }
            }
        }
    }

    for event in events {
        state.apply(event);
    }

    if state.len < file_len {
        warn!(
            path = %path.display(),
            kept = state.len,
            dropped = file_len - state.len,
            "truncating journal tail"
        );
        state
            .file
            .set_len(state.len)
            .map_err(|e| StoreError::Initialization(format!("failed to truncate journal: {e}")))?;
    }

    if missing_newline {
        state
            .file
            .write_all(b"\n")
            .map_err(|e| StoreError::Initialization(e.to_string()))?;
        state.len += 1;
    }

    Ok(state)
}

#[async_trait]
impl Store for JournalStore {
    #[tracing::instrument(skip(self))]
    async fn shorten_url(&self, user_id: &str, original_url: &str) -> Result<ShortCode> {
        validate_original_url(original_url)?;
        let code = ShortCode::generate(original_url);
        let user_id = user_id.to_owned();
        let original_url = original_url.to_owned();

        self.locked(move |state| {
            if let Some(entry) = state.index.get(&code) {
                if entry.original_url != original_url {
                    return Err(StoreError::CodeCollision(code.to_string()));
                }
                debug!(%code, "url already shortened");
                return Err(StoreError::Duplicate(code));
            }

            let event = JournalEvent::insert(&user_id, code.clone(), &original_url);
            state.append(std::slice::from_ref(&event))?;
            state.apply(event);
            Ok(code)
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn redirect_url(&self, code: &ShortCode) -> Result<String> {
        let code = code.clone();

        self.locked(move |state| match state.index.get(&code) {
            Some(entry) if !entry.deleted => Ok(entry.original_url.clone()),
            Some(_) => {
                debug!(%code, "short code was deleted");
                Err(StoreError::NotFound(code.to_string()))
            }
            None => Err(StoreError::NotFound(code.to_string())),
        })
        .await
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
        let user_id = user_id.to_owned();
        let original_urls = original_urls.to_vec();

        self.locked(move |state| {
            let mut pending: HashMap<ShortCode, &str> = HashMap::new();
            let mut events = Vec::new();
            let mut codes = Vec::with_capacity(original_urls.len());

            for url in &original_urls {
                let code = ShortCode::generate(url);
                let existing = state
                    .index
                    .get(&code)
                    .map(|entry| entry.original_url.as_str())
                    .or_else(|| pending.get(&code).copied());

                match existing {
                    Some(existing) if existing != url => {
                        return Err(StoreError::CodeCollision(code.to_string()));
                    }
                    Some(_) => {}
                    None => {
                        pending.insert(code.clone(), url.as_str());
                        events.push(JournalEvent::insert(&user_id, code.clone(), url));
                    }
                }
                codes.push(code);
            }

            if !events.is_empty() {
                state.append(&events)?;
                for event in events {
                    state.apply(event);
                }
            }
            Ok(codes)
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn user_urls(&self, user_id: &str, base_url: &str) -> Result<Vec<UserUrl>> {
        let user_id = user_id.to_owned();
        let base_url = base_url.to_owned();

        self.locked(move |state| {
            let Some(codes) = state.by_user.get(&user_id) else {
                return Ok(Vec::new());
            };

            let urls = codes
                .iter()
                .filter_map(|code| {
                    let entry = state.index.get(code)?;
                    (entry.user_id == user_id && !entry.deleted).then(|| UserUrl {
                        short_url: code.to_url(&base_url),
                        original_url: entry.original_url.clone(),
                    })
                })
                .collect();
            Ok(urls)
        })
        .await
    }

    #[tracing::instrument(skip(self, codes), fields(items = codes.len()))]
    async fn delete_user_urls(&self, user_id: &str, codes: &[ShortCode]) -> Result<()> {
        let user_id = user_id.to_owned();
        let codes = codes.to_vec();

        self.locked(move |state| {
            let mut events: Vec<JournalEvent> = Vec::new();
            for code in codes {
                let queued = events.iter().any(|event| {
                    matches!(event, JournalEvent::Delete { short_url, .. } if *short_url == code)
                });
                if !queued && state.is_owned_live(&user_id, &code) {
                    events.push(JournalEvent::delete(&user_id, code));
                }
            }

            if events.is_empty() {
                return Ok(());
            }
            state.append(&events)?;
            for event in events {
                state.apply(event);
            }
            Ok(())
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        self.locked(|state| {
            state
                .file
                .metadata()
                .map(|_| ())
                .map_err(|e| StoreError::Unavailable(format!("journal unreachable: {e}")))
        })
        .await
    }
}
