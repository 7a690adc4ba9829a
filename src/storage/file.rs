//! Filesystem-only `ProxyStorage` implementation.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::IoError;

use super::{ProxyStorage, StorageKind};

/// `ProxyStorage` over the local filesystem.
///
/// Handles only the FILE kind; requests for object kinds fail with
/// [`IoError::BackendUnavailable`]. Suited to purely file-backed pyramids
/// and to tests.
#[derive(Debug, Clone, Default)]
pub struct FileStorage;

impl FileStorage {
    pub fn new() -> Self {
        Self
    }
}

pub(super) async fn read_file(path: &str) -> Result<Bytes, IoError> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(Bytes::from(data)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(IoError::NotFound(path.to_string()))
        }
        Err(e) => Err(IoError::File {
            path: path.to_string(),
            message: e.to_string(),
        }),
    }
}

/// Writes go through a sibling temp file renamed over the target, so a
/// failure mid-write never truncates an existing file.
pub(super) async fn write_file(path: &str, data: &[u8]) -> Result<(), IoError> {
    if let Some(parent) = Path::new(path).parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| IoError::File {
            path: parent.display().to_string(),
            message: e.to_string(),
        })?;
    }
    let tmp = format!("{path}.tmp");
    tokio::fs::write(&tmp, data).await.map_err(|e| IoError::File {
        path: tmp.clone(),
        message: e.to_string(),
    })?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| IoError::File {
        path: path.to_string(),
        message: e.to_string(),
    })
}

fn unavailable(kind: StorageKind) -> IoError {
    IoError::BackendUnavailable {
        kind,
        message: "FileStorage only serves the FILE backend".to_string(),
    }
}

#[async_trait]
impl ProxyStorage for FileStorage {
    async fn fetch(&self, kind: StorageKind, location: &str) -> Result<Bytes, IoError> {
        if kind.is_object() {
            return Err(unavailable(kind));
        }
        debug!(location, "reading file");
        read_file(location).await
    }

    async fn store(&self, kind: StorageKind, location: &str, data: Bytes) -> Result<(), IoError> {
        if kind.is_object() {
            return Err(unavailable(kind));
        }
        debug!(location, size = data.len(), "writing file");
        write_file(location, &data).await
    }

    async fn copy(
        &self,
        src_kind: StorageKind,
        src: &str,
        dst_kind: StorageKind,
        dst: &str,
    ) -> Result<(), IoError> {
        let data = self.fetch(src_kind, src).await?;
        self.store(dst_kind, dst, data).await
    }
}

// =============================================================================
// Tests
// =============================================================================
