//! S3-backed `ProxyStorage` implementation.
//!
//! Object locations are `"{bucket}/{key}"` strings. The FILE kind is also
//! served (delegated to the local filesystem) so descriptors and lists can
//! be copied between a bucket and local files through the same proxy.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::debug;

use crate::error::IoError;

use super::file::{read_file, write_file};
use super::{ProxyStorage, StorageKind};

/// `ProxyStorage` over S3 or S3-compatible object storage (MinIO, etc.).
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn split_location(location: &str) -> Result<(&str, &str), IoError> {
        location
            .split_once('/')
            .filter(|(bucket, key)| !bucket.is_empty() && !key.is_empty())
            .ok_or_else(|| IoError::S3(format!("malformed object location '{location}'")))
    }

    async fn get_object(&self, location: &str) -> Result<Bytes, IoError> {
        let (bucket, key) = Self::split_location(location)?;
        debug!(bucket, key, "fetching object");

        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let is_not_found = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);
                if is_not_found {
                    IoError::NotFound(format!("s3://{bucket}/{key}"))
                } else {
                    IoError::S3(e.to_string())
                }
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?
            .into_bytes();
        Ok(data)
    }

    async fn put_object(&self, location: &str, data: Bytes) -> Result<(), IoError> {
        let (bucket, key) = Self::split_location(location)?;
        debug!(bucket, key, size = data.len(), "storing object");

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| IoError::S3(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ProxyStorage for S3Storage {
    async fn fetch(&self, kind: StorageKind, location: &str) -> Result<Bytes, IoError> {
        match kind {
            StorageKind::File => read_file(location).await,
            StorageKind::S3 => self.get_object(location).await,
            other => Err(IoError::BackendUnavailable {
                kind: other,
                message: "no client configured".to_string(),
            }),
        }
    }

    async fn store(&self, kind: StorageKind, location: &str, data: Bytes) -> Result<(), IoError> {
        match kind {
            StorageKind::File => write_file(location, &data).await,
            StorageKind::S3 => self.put_object(location, data).await,
            other => Err(IoError::BackendUnavailable {
                kind: other,
                message: "no client configured".to_string(),
            }),
        }
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

/// Create an S3 client with optional custom endpoint and region.
///
/// Use a custom endpoint for S3-compatible services like MinIO:
/// ```ignore
/// let client = create_s3_client(Some("http://localhost:9000"), "us-east-1").await;
/// ```
///
/// For AWS S3, pass `None` to use the default endpoint.
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    // S3-compatible services usually need path-style addressing
    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}
