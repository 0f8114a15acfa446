//! Upload directory for book images.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use crate::error::StorageError;

const MAX_EXTENSION_LEN: usize = 8;

/// Flat directory of uploaded files addressed by their stored name.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the upload directory if it is absent.
    pub async fn ensure_directory(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::write(&self.dir, e))
    }

    /// Store `bytes` under a freshly generated name and return that name.
    ///
    /// The name is a UUID v7 (millisecond timestamp plus random bits) followed
    /// by the original file's extension when it is a plain short token. Nothing
    /// else from the client-supplied name reaches the filesystem.
    pub async fn save(&self, bytes: &[u8], original_name: &str) -> Result<String, StorageError> {
        let stored_name = stored_name_for(original_name);
        let path = self.dir.join(&stored_name);

        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| StorageError::write(&path, e))?;
        write_or_discard(&path, file, bytes).await?;

        tracing::debug!(image = %stored_name, bytes = bytes.len(), "image stored");
        Ok(stored_name)
    }

    /// Remove a stored file. Removing a file that is already gone succeeds.
    pub async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let Some(path) = self.resolve(name) else {
            return Ok(());
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(image = %name, "image deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::write(&path, e)),
        }
    }

    pub async fn exists(&self, name: &str) -> bool {
        match self.resolve(name) {
            Some(path) => tokio::fs::metadata(&path)
                .await
                .map(|meta| meta.is_file())
                .unwrap_or(false),
            None => false,
        }
    }

    /// Read a stored file in full.
    pub async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self
            .resolve(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(StorageError::read(&path, e)),
        }
    }

    // Only bare file names resolve; anything that could escape the directory does not.
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let bare = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\', '\0']);
        bare.then(|| self.dir.join(name))
    }
}

// A file that could not be written in full is removed; no record can refer to it.
async fn write_or_discard<W>(path: &Path, mut file: W, bytes: &[u8]) -> Result<(), StorageError>
where
    W: AsyncWrite + Unpin,
{
    let written = match file.write_all(bytes).await {
        Ok(()) => file.flush().await,
        Err(e) => Err(e),
    };
    let Err(e) = written else {
        return Ok(());
    };

    drop(file);
    if let Err(remove) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %remove, "failed to remove partial image");
    }
    Err(StorageError::write(path, e))
}

fn stored_name_for(original_name: &str) -> String {
    let id = Uuid::now_v7();
    match extension_of(original_name) {
        Some(ext) => format!("{id}.{ext}"),
        None => id.to_string(),
    }
}

fn extension_of(original_name: &str) -> Option<String> {
    let (stem, ext) = original_name.rsplit_once('.')?;
    let usable = !stem.is_empty()
        && !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    usable.then(|| ext.to_ascii_lowercase())
}
