use crate::cli::Command;
use anyhow::{Context, Result};
use burrow_core::{ShortCode, Store, StoreError};
use std::io::Write;
use tracing::info;

/// Runs one command against `store`, writing its result to `out`.
pub async fn run<S: Store>(
    store: &S,
    base_url: &str,
    command: Command,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::Shorten { user, url } => match store.shorten_url(&user, &url).await {
            Ok(code) => writeln!(out, "{}", code.to_url(base_url))?,
            Err(StoreError::Duplicate(existing)) => {
                info!(code = %existing, "url was already shortened");
                writeln!(out, "conflict {}", existing.to_url(base_url))?;
            }
            Err(err) => return Err(err).context("failed to shorten url"),
        },
        Command::Batch { user, urls } => {
            let codes = store
                .batch_shorten_urls(&user, &urls)
                .await
                .context("batch was rolled back")?;
            for (url, code) in urls.iter().zip(codes) {
                writeln!(out, "{} {}", code.to_url(base_url), url)?;
            }
        }
        Command::Resolve { code } => {
            let code = ShortCode::parse(code)?;
            let original_url = store.redirect_url(&code).await?;
            writeln!(out, "{original_url}")?;
        }
        Command::List { user } => {
            let urls = store.user_urls(&user, base_url).await?;
            serde_json::to_writer_pretty(&mut *out, &urls)?;
            writeln!(out)?;
        }
        Command::Delete { user, codes } => {
            let codes = codes
                .into_iter()
                .map(|code| ShortCode::parse(code))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            store.delete_user_urls(&user, &codes).await?;
            writeln!(out, "accepted {} code(s)", codes.len())?;
        }
        Command::Ping => {
            store.ping().await.context("store is unreachable")?;
            writeln!(out, "ok")?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_storage::JournalStore;
    use tempfile::TempDir;

    const BASE_URL: &str = "http://localhost:8080";

    async fn store() -> (TempDir, JournalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JournalStore::open(dir.path().join("urls.json"))
            .await
            .unwrap();
        (dir, store)
    }

    async fn exec(store: &JournalStore, command: Command) -> Result<String> {
        let mut out = Vec::new();
        run(store, BASE_URL, command, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn shorten(user: &str, url: &str) -> Command {
        Command::Shorten {
            user: user.to_string(),
            url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn shorten_prints_short_url_then_conflict() {
        let (_dir, store) = store().await;

        let first = exec(&store, shorten("u1", "https://practicum.yandex.ru/"))
            .await
            .unwrap();
        let second = exec(&store, shorten("u2", "https://practicum.yandex.ru/"))
            .await
            .unwrap();

        assert_eq!(first, "http://localhost:8080/QrPnX5IU\n");
        assert_eq!(second, "conflict http://localhost:8080/QrPnX5IU\n");

        let resolved = exec(
            &store,
            Command::Resolve {
                code: "QrPnX5IU".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(resolved, "https://practicum.yandex.ru/\n");
    }

    #[tokio::test]
    async fn list_prints_json() {
        let (_dir, store) = store().await;
        exec(&store, shorten("u1", "https://practicum.yandex.ru/"))
            .await
            .unwrap();

        let listing = exec(
            &store,
            Command::List {
                user: "u1".to_string(),
            },
        )
        .await
        .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&listing).unwrap();
        assert_eq!(
            parsed,
            serde_json::json!([{
                "short_url": "http://localhost:8080/QrPnX5IU",
                "original_url": "https://practicum.yandex.ru/",
            }])
        );
    }

    #[tokio::test]
    async fn delete_then_resolve_fails() {
        let (_dir, store) = store().await;
        exec(&store, shorten("u1", "https://practicum.yandex.ru/"))
            .await
            .unwrap();

        exec(
            &store,
            Command::Delete {
                user: "u1".to_string(),
                codes: vec!["QrPnX5IU".to_string()],
            },
        )
        .await
        .unwrap();

        let err = exec(
            &store,
            Command::Resolve {
                code: "QrPnX5IU".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn resolve_rejects_malformed_code() {
        let (_dir, store) = store().await;

        let err = exec(
            &store,
            Command::Resolve {
                code: "not/a/code".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::InvalidShortCode(_))
        ));
    }

    #[tokio::test]
    async fn batch_prints_one_line_per_url() {
        let (_dir, store) = store().await;

        let output = exec(
            &store,
            Command::Batch {
                user: "u1".to_string(),
                urls: vec![
                    "https://example.com".to_string(),
                    "https://practicum.yandex.ru/".to_string(),
                ],
            },
        )
        .await
        .unwrap();

        assert_eq!(
            output,
            "http://localhost:8080/EAaArVRs https://example.com\n\
             http://localhost:8080/QrPnX5IU https://practicum.yandex.ru/\n"
        );
        assert_eq!(exec(&store, Command::Ping).await.unwrap(), "ok\n");
    }
}
