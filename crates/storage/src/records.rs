//! Whole-file JSON record store.
//!
//! Every load reads the full file and every save replaces it. Saves go
//! through a temporary file in the same directory followed by a rename, so a
//! reader observes either the previous collection or the new one, never a
//! partial write.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::error::StorageError;

/// Whole-collection persistence used by the catalog service.
#[async_trait]
pub trait RecordRepository<T>: Send + Sync {
    async fn ensure_exists(&self) -> Result<(), StorageError>;

    async fn load(&self) -> Result<Vec<T>, StorageError>;

    async fn save(&self, records: &[T]) -> Result<(), StorageError>;
}

/// Ordered collection of `T` persisted as a single JSON array.
#[derive(Debug)]
pub struct RecordStore<T> {
    path: PathBuf,
    _records: PhantomData<fn() -> T>,
}

impl<T> RecordStore<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _records: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the backing file as an empty collection when it does not exist yet.
    pub async fn ensure_exists(&self) -> Result<(), StorageError> {
        if tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| StorageError::read(&self.path, e))?
        {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::write(parent, e))?;
        }

        tracing::info!(path = %self.path.display(), "creating empty record file");
        self.save(&[]).await
    }

    /// Read and parse the full collection.
    pub async fn load(&self) -> Result<Vec<T>, StorageError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| StorageError::read(&self.path, e))?;

        serde_json::from_slice(&bytes).map_err(|source| StorageError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the full collection.
    pub async fn save(&self, records: &[T]) -> Result<(), StorageError> {
        let mut bytes = serde_json::to_vec_pretty(records)?;
        bytes.push(b'\n');

        let tmp = self.temp_path();
        if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
            return Err(StorageError::write(&tmp, e));
        }

        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StorageError::write(&self.path, e));
        }

        tracing::debug!(
            path = %self.path.display(),
            records = records.len(),
            "record file replaced"
        );
        Ok(())
    }

    // Unique per call so an abandoned temp file never collides with a later save.
    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "records".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", file_name, Uuid::now_v7()))
    }
}

#[async_trait]
impl<T> RecordRepository<T> for RecordStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn ensure_exists(&self) -> Result<(), StorageError> {
        RecordStore::ensure_exists(self).await
    }

    async fn load(&self) -> Result<Vec<T>, StorageError> {
        RecordStore::load(self).await
    }

    async fn save(&self, records: &[T]) -> Result<(), StorageError> {
        RecordStore::save(self, records).await
    }
}
