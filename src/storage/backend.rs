//! Backend kinds and the uniform storage seam.
//!
//! Everything a pyramid persists (descriptor, list file, slabs) lives behind
//! one of four backend kinds. The addressing layer never touches transport
//! details: it computes `(kind, location)` pairs and hands them to a
//! [`ProxyStorage`] implementation.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::error::{IoError, PyramidError};

/// The four supported storage backend kinds.
///
/// Dispatching on this closed enum (rather than on backend-name strings)
/// keeps every per-backend branch exhaustive at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// Local or mounted filesystem
    File,
    /// S3 or S3-compatible object storage
    S3,
    /// OpenStack Swift object storage
    Swift,
    /// Ceph pool (RADOS)
    Ceph,
}

impl StorageKind {
    /// All object-storage kinds (everything but FILE).
    pub const OBJECT_KINDS: [StorageKind; 3] = [StorageKind::S3, StorageKind::Swift, StorageKind::Ceph];

    /// Whether this kind addresses objects in a container rather than files.
    pub fn is_object(self) -> bool {
        !matches!(self, StorageKind::File)
    }

    /// The URI scheme used in descriptor references.
    pub fn scheme(self) -> &'static str {
        match self {
            StorageKind::File => "file",
            StorageKind::S3 => "s3",
            StorageKind::Swift => "swift",
            StorageKind::Ceph => "ceph",
        }
    }

    /// Resolve a URI scheme into a kind.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "file" => Some(StorageKind::File),
            "s3" => Some(StorageKind::S3),
            "swift" => Some(StorageKind::Swift),
            "ceph" => Some(StorageKind::Ceph),
            _ => None,
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageKind::File => "FILE",
            StorageKind::S3 => "S3",
            StorageKind::Swift => "SWIFT",
            StorageKind::Ceph => "CEPH",
        };
        f.write_str(name)
    }
}

/// Split a descriptor URI into its backend kind and location string.
///
/// `file:///data/pyr.json` -> `(File, "/data/pyr.json")`;
/// `s3://bucket/key.json` -> `(S3, "bucket/key.json")`; same shape for
/// `ceph://pool/key` and `swift://container/key`.
pub fn parse_storage_uri(uri: &str) -> Result<(StorageKind, String), PyramidError> {
    let url = Url::parse(uri)
        .map_err(|e| PyramidError::validation(format!("invalid storage URI '{uri}': {e}")))?;

    let kind = StorageKind::from_scheme(url.scheme()).ok_or_else(|| {
        PyramidError::validation(format!(
            "unknown storage scheme '{}' in '{uri}'",
            url.scheme()
        ))
    })?;

    let location = match kind {
        StorageKind::File => url.path().to_string(),
        _ => {
            let container = url
                .host_str()
                .ok_or_else(|| {
                    PyramidError::validation(format!("missing container/bucket in '{uri}'"))
                })?
                .to_string();
            let key = url.path().trim_start_matches('/');
            if key.is_empty() {
                return Err(PyramidError::validation(format!(
                    "missing object key in '{uri}'"
                )));
            }
            format!("{container}/{key}")
        }
    };

    if location.is_empty() {
        return Err(PyramidError::validation(format!("empty path in '{uri}'")));
    }

    Ok((kind, location))
}

/// Uniform get/put/copy over the storage backends.
///
/// Implementations route on [`StorageKind`] and report failures as
/// [`IoError`]; the addressing layer never retries. Credential and
/// environment validation per kind happens before any of these calls.
#[async_trait]
pub trait ProxyStorage: Send + Sync {
    /// Read the full content at `location`.
    async fn fetch(&self, kind: StorageKind, location: &str) -> Result<Bytes, IoError>;

    /// Write `data` to `location`, replacing any previous content.
    async fn store(&self, kind: StorageKind, location: &str, data: Bytes) -> Result<(), IoError>;

    /// Copy a whole file/object, possibly across backend kinds.
    async fn copy(
        &self,
        src_kind: StorageKind,
        src: &str,
        dst_kind: StorageKind,
        dst: &str,
    ) -> Result<(), IoError>;
}

// =============================================================================
// Tests
// =============================================================================
