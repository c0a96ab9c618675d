//! Persistence of comparison results: one JSON document per
//! comparison, written atomically under the data directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use vigil_core_types::ComparisonResult;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("result serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Seam for persisting and retrieving comparison results.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Persist one result, returning the path it was written to.
    async fn save(&self, result: &ComparisonResult) -> Result<PathBuf, StoreError>;

    /// Load a previously saved result.
    async fn load(&self, path: &Path) -> Result<ComparisonResult, StoreError>;

    /// List saved result documents, oldest first.
    async fn list(&self) -> Result<Vec<PathBuf>, StoreError>;
}

/// Filesystem-backed store. Writes go to a temp file first and are
/// renamed into place so readers never observe a partial document.
pub struct FsResultStore {
    dir: PathBuf,
}

impl FsResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn document_name(result: &ComparisonResult) -> String {
        format!(
            "{}-comparison.json",
            result.timestamp.format("%Y%m%d-%H%M%S%3f")
        )
    }
}

#[async_trait]
impl ResultStore for FsResultStore {
    async fn save(&self, result: &ComparisonResult) -> Result<PathBuf, StoreError> {
        let bytes = serde_json::to_vec_pretty(result)?;
        let path = self.dir.join(Self::document_name(result));
        let tmp = path.with_extension("json.tmp");

        tokio::fs::create_dir_all(&self.dir).await?;
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, &path).await?;

        info!(path = %path.display(), "comparison result saved");
        Ok(path)
    }

    async fn load(&self, path: &Path) -> Result<ComparisonResult, StoreError> {
        let bytes = tokio::fs::read(path).await?;
        let result = serde_json::from_slice(&bytes)?;
        debug!(path = %path.display(), "comparison result loaded");
        Ok(result)
    }

    async fn list(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut paths = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(paths),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn sample_result() -> ComparisonResult {
        ComparisonResult {
            before_path: PathBuf::from("before.png"),
            after_path: PathBuf::from("after.png"),
            threshold: 2,
            changed_pixels: 2500,
            total_pixels: 480_000,
            changed_percentage: 0.52,
            intended_changes: Vec::new(),
            unintended_changes: Vec::new(),
            passed: false,
            failure_reason: Some("Too many changed pixels: 0.52% > 0.5%".to_string()),
            analysis_summary: None,
            heatmap_path: None,
            report_path: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = FsResultStore::new(dir.path());

        let result = sample_result();
        let path = store.save(&result).await.unwrap();
        assert!(path.exists());

        let loaded = store.load(&path).await.unwrap();
        assert_eq!(loaded.changed_pixels, 2500);
        assert_eq!(loaded.failure_reason, result.failure_reason);
    }

    #[tokio::test]
    async fn list_returns_only_json_documents() {
        let dir = TempDir::new().unwrap();
        let store = FsResultStore::new(dir.path());

        store.save(&sample_result()).await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let paths = store.list().await.unwrap();
        assert_eq!(paths.len(), 1);
    }

    #[tokio::test]
    async fn list_on_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FsResultStore::new(dir.path().join("never-created"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = FsResultStore::new(dir.path());
        store.save(&sample_result()).await.unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().and_then(|e| e.to_str()) == Some("tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
