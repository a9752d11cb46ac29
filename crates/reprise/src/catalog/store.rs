//! Durable fixture storage.
//!
//! The catalog only needs a stable round trip of [`FixtureEntry`] values; how they
//! land on disk is up to the [`FixtureStore`] implementation. [`FileStore`] keeps
//! one JSON-lines file per host under the fixtures root.

use super::entry::FixtureEntry;
use crate::error::{ReplayError, Result};
use async_trait::async_trait;
use hyper::Uri;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Backend-agnostic fixture persistence
#[async_trait]
pub trait FixtureStore: Send + Sync {
    /// Load every entry under `root`, in recorded order per host.
    async fn load(&self, root: &Path) -> Result<Vec<FixtureEntry>>;

    /// Append one entry under `root`.
    async fn append(&self, root: &Path, entry: &FixtureEntry) -> Result<()>;
}

/// Fixture file extension
pub const FIXTURE_EXTENSION: &str = "jsonl";

/// JSON-lines store, one `<host>[_<port>].jsonl` file per host
#[derive(Debug, Default, Clone, Copy)]
pub struct FileStore;

impl FileStore {
    pub fn new() -> Self {
        Self
    }

    /// Path of the file an entry is appended to.
    pub fn file_for(root: &Path, entry: &FixtureEntry) -> PathBuf {
        root.join(format!(
            "{}.{FIXTURE_EXTENSION}",
            host_file_stem(&entry.request.url)
        ))
    }
}

/// File stem for a canonical URL: the host, plus `_<port>` for non-default ports.
pub fn host_file_stem(url: &str) -> String {
    let uri: Option<Uri> = url.parse().ok();
    let host = uri
        .as_ref()
        .and_then(|u| u.host())
        .unwrap_or("unknown-host")
        .trim_start_matches('[')
        .trim_end_matches(']');

    let mut stem: String = host
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    // Canonical URLs only carry a port when it is not the scheme default
    if let Some(port) = uri.as_ref().and_then(|u| u.port_u16()) {
        stem.push('_');
        stem.push_str(&port.to_string());
    }
    stem
}

#[async_trait]
impl FixtureStore for FileStore {
    async fn load(&self, root: &Path) -> Result<Vec<FixtureEntry>> {
        let metadata = match tokio::fs::metadata(root).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Fixtures directory {:?} does not exist, starting fresh", root);
                return Ok(Vec::new());
            }
            Err(e) => return Err(ReplayError::storage(root, e)),
        };
        if !metadata.is_dir() {
            return Err(ReplayError::storage(root, "not a directory"));
        }

        let mut files = Vec::new();
        let mut dir = tokio::fs::read_dir(root)
            .await
            .map_err(|e| ReplayError::storage(root, e))?;
        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| ReplayError::storage(root, e))?
        {
            let path = item.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(FIXTURE_EXTENSION) {
                files.push(path);
            }
        }
        files.sort();

        let mut entries = Vec::new();
        for path in &files {
            let contents = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ReplayError::storage(path, e))?;
            for (index, line) in contents.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let entry: FixtureEntry = serde_json::from_str(line)
                    .map_err(|e| ReplayError::storage(path, format!("line {}: {e}", index + 1)))?;
                entries.push(entry);
            }
        }

        info!(
            "Loaded {} fixtures from {} files in {:?}",
            entries.len(),
            files.len(),
            root
        );
        Ok(entries)
    }

    async fn append(&self, root: &Path, entry: &FixtureEntry) -> Result<()> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| ReplayError::storage(root, e))?;

        let path = Self::file_for(root, entry);
        let mut line = serde_json::to_string(entry).map_err(|e| ReplayError::storage(&path, e))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| ReplayError::storage(&path, e))?;
        // Single write so a line is never interleaved with another writer's
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| ReplayError::storage(&path, e))?;
        file.flush()
            .await
            .map_err(|e| ReplayError::storage(&path, e))?;

        debug!("Appended fixture for {} to {:?}", entry.request.url, path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::HeaderMatchList;
    use crate::message::{Request, Response};
    use tempfile::TempDir;

    fn entry(url: &str, body: &str) -> FixtureEntry {
        FixtureEntry::capture(
            &Request::get(url).unwrap(),
            &Response::new(200).with_body(body.to_string()),
            &HeaderMatchList::default(),
        )
    }

    #[test]
    fn test_host_file_stem() {
        assert_eq!(host_file_stem("http://example.com/a"), "example.com");
        assert_eq!(host_file_stem("http://localhost:3000/"), "localhost_3000");
        assert_eq!(host_file_stem("http://[::1]:8080/"), "__1_8080");
        assert_eq!(host_file_stem("not a url"), "unknown-host");
    }

    #[tokio::test]
    async fn test_load_missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        let entries = FileStore.load(&dir.path().join("missing")).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_load_root_that_is_a_file_fails() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("fixtures");
        std::fs::write(&file, "").unwrap();
        let err = FileStore.load(&file).await.unwrap_err();
        assert!(matches!(err, ReplayError::Storage { .. }));
    }

    #[tokio::test]
    async fn test_append_then_load_preserves_order() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("fixtures");

        FileStore.append(&root, &entry("http://a.example.com/", "one")).await.unwrap();
        FileStore.append(&root, &entry("http://b.example.com/", "other host")).await.unwrap();
        FileStore.append(&root, &entry("http://a.example.com/", "two")).await.unwrap();

        assert!(root.join("a.example.com.jsonl").exists());
        assert!(root.join("b.example.com.jsonl").exists());

        let loaded = FileStore.load(&root).await.unwrap();
        let bodies: Vec<String> = loaded.iter().map(|e| e.response.text()).collect();
        assert_eq!(bodies, vec!["one", "two", "other host"]);
    }

    #[tokio::test]
    async fn test_load_reports_corrupt_line() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("example.com.jsonl"), "{not json}\n").unwrap();
        let err = FileStore.load(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[tokio::test]
    async fn test_load_ignores_other_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("README.md"), "notes").unwrap();
        assert!(FileStore.load(dir.path()).await.unwrap().is_empty());
    }
}
