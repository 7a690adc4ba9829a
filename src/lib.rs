//! # Pyramid Store
//!
//! Slab addressing and list indexing for tile pyramids stored on file
//! systems or object storage (S3, SWIFT, CEPH).
//!
//! Tiles are grouped into slabs (fixed-size tile blocks) addressed by a
//! hierarchical base-36 path on file storage or a flat key on object
//! storage. A pyramid's descriptor binds its levels to a tile matrix set,
//! and its list file records which slabs physically exist, with shared
//! storage roots deduplicated through an integer table.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`codec`] - Base-36 slab path encoding and decoding
//! - [`grid`] - Tile matrix sets and geographic-to-tile index conversion
//! - [`storage`] - Storage backends behind the [`ProxyStorage`] trait
//! - [`pyramid`] - Levels, descriptors, and the slab list index
//! - [`error`] - Error types shared across the crate
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pyramid_store::{Pyramid, PyramidParams, SlabKind, FileStorage, TileMatrixSet};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tms: Arc<TileMatrixSet> = Arc::new(TileMatrixSet::from_json(
//!         &std::fs::read_to_string("/data/tms/PM.json")?,
//!     )?);
//!
//!     let storage = FileStorage::new();
//!     let mut pyramid = Pyramid::new(
//!         &PyramidParams {
//!             name: "WORLD".to_string(),
//!             format: "TIFF_JPG_UINT8".to_string(),
//!             directory: Some("/data/pyramids".to_string()),
//!             ..Default::default()
//!         },
//!         tms,
//!         None,
//!     )?;
//!     pyramid.add_level("12", None)?;
//!
//!     pyramid.load_list(&storage).await?;
//!     pyramid.modify_slab(SlabKind::Data, "12", 5, 300)?;
//!     pyramid.write_descriptor(&storage).await?;
//!     pyramid.flush_list(&storage).await?;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod error;
pub mod grid;
pub mod pyramid;
pub mod storage;

// Re-export commonly used types
pub use codec::{decode_slab_path, encode_slab_path};
pub use error::{IoError, PyramidError};
pub use grid::{TileMatrix, TileMatrixSet};
pub use pyramid::{
    Compatibility, Level, LevelParams, LevelStorage, Pyramid, PyramidDescriptor, PyramidMode,
    PyramidParams, SlabKind, SlabList, StorageRoot, TileLimits, DEFAULT_PATH_DEPTH,
    DEFAULT_SLAB_SIZE,
};
pub use storage::{
    create_s3_client, parse_storage_uri, FileStorage, MemoryStorage, ProxyStorage, S3Storage,
    StorageKind,
};
