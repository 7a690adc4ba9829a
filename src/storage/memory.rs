//! In-memory `ProxyStorage` implementation for tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::error::IoError;

use super::{ProxyStorage, StorageKind};

/// `ProxyStorage` backed by an in-process map.
///
/// Accepts every backend kind, keyed by `(kind, location)`. Lets tests
/// exercise object-storage addressing (including SWIFT and CEPH paths)
/// without any running service.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<RwLock<HashMap<(StorageKind, String), Bytes>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, across all kinds.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether nothing has been stored yet.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ProxyStorage for MemoryStorage {
    async fn fetch(&self, kind: StorageKind, location: &str) -> Result<Bytes, IoError> {
        self.objects
            .read()
            .await
            .get(&(kind, location.to_string()))
            .cloned()
            .ok_or_else(|| IoError::NotFound(format!("{kind}:{location}")))
    }

    async fn store(&self, kind: StorageKind, location: &str, data: Bytes) -> Result<(), IoError> {
        self.objects
            .write()
            .await
            .insert((kind, location.to_string()), data);
        Ok(())
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
