//! Staging store for inbound images.
//!
//! Each staged image gets its own uuid key so concurrent requests never share
//! a path; the gateway serves staged files at /media/{key} and the handler
//! removes them once the request finishes.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Directory-backed store of request-scoped staged images.
#[derive(Clone)]
pub struct MediaStore {
    dir: PathBuf,
}

impl MediaStore {
    /// Create the store, ensuring the directory exists.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating media directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` under a fresh key and return the key.
    pub async fn stage(&self, bytes: &[u8]) -> Result<String> {
        let key = format!("{}.jpg", uuid::Uuid::new_v4());
        let path = self.dir.join(&key);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("staging image to {}", path.display()))?;
        Ok(key)
    }

    /// Path of a staged file. None when the key is not one of ours
    /// (path separators, parent references). Existence is not checked here.
    pub fn path(&self, key: &str) -> Option<PathBuf> {
        if key.is_empty()
            || key.contains('/')
            || key.contains('\\')
            || key.contains("..")
        {
            return None;
        }
        Some(self.dir.join(key))
    }

    /// Remove a staged file; missing files are not an error.
    pub async fn remove(&self, key: &str) {
        let Some(path) = self.path(key) else {
            return;
        };
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("removing staged image {}: {}", path.display(), e);
            }
        }
    }
}
