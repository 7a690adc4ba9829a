//! Storage backends: backend kinds, the `ProxyStorage` seam, and the
//! FILE / S3 / in-memory implementations.

mod backend;
mod file;
mod memory;
mod s3;

pub use backend::{parse_storage_uri, ProxyStorage, StorageKind};
pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use s3::{create_s3_client, S3Storage};
