use crate::traits::{ProcessedStore, SocialError, SocialResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Process-local store; forgets everything on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ids: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: Mutex::new(ids.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl ProcessedStore for MemoryStore {
    async fn processed_ids(&self) -> SocialResult<HashSet<String>> {
        Ok(self.ids.lock().await.clone())
    }

    async fn mark_processed(&self, post_id: &str) -> SocialResult<()> {
        self.ids.lock().await.insert(post_id.to_string());
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProcessedFile {
    #[serde(default)]
    processed_post_ids: BTreeSet<String>,
}

/// JSON file of processed post ids, rewritten atomically on every mark.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> SocialResult<ProcessedFile> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(ProcessedFile::default()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                SocialError::Storage(format!("{}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ProcessedFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, file: &ProcessedFile) -> SocialResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(file)
            .map_err(|e| SocialError::Storage(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl ProcessedStore for JsonFileStore {
    async fn processed_ids(&self) -> SocialResult<HashSet<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.processed_post_ids.into_iter().collect())
    }

    async fn mark_processed(&self, post_id: &str) -> SocialResult<()> {
        let _guard = self.lock.lock().await;
        let mut file = self.load().await?;
        if file.processed_post_ids.insert(post_id.to_string()) {
            self.save(&file).await?;
            tracing::debug!(post_id, path = %self.path.display(), "store.marked");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_marks() {
        let store = MemoryStore::with_ids(["1"]);
        store.mark_processed("2").await.unwrap();
        let ids = store.processed_ids().await.unwrap();
        assert!(ids.contains("1") && ids.contains("2"));
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("processed.json");

        let store = JsonFileStore::new(&path);
        assert!(store.processed_ids().await.unwrap().is_empty());
        store.mark_processed("42").await.unwrap();
        store.mark_processed("42").await.unwrap();
        store.mark_processed("7").await.unwrap();

        let reopened = JsonFileStore::new(&path);
        let ids = reopened.processed_ids().await.unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("42"));

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["processed_post_ids"], serde_json::json!(["42", "7"]));
    }

    #[tokio::test]
    async fn corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed.json");
        std::fs::write(&path, b"{not json").unwrap();
        let err = JsonFileStore::new(&path).processed_ids().await.unwrap_err();
        assert!(matches!(err, SocialError::Storage(_)));
    }
}
