//! Pyramid model: levels bound to a tile matrix set, descriptors, and the
//! slab list index.
//!
//! A pyramid aggregates [`Level`]s over a shared [`crate::grid::TileMatrixSet`],
//! addresses its slabs through one storage root, and tracks which slabs
//! physically exist through the [`SlabList`] cache.
//!
//! # Lifecycle
//!
//! - Read path: [`Pyramid::from_uri`] parses a JSON (or legacy XML)
//!   descriptor into a READ pyramid; [`Pyramid::load_list`] then pulls the
//!   slab inventory.
//! - Write path: [`Pyramid::new`] builds a WRITE pyramid (optionally adopting
//!   an ancestor's layout), levels are added with [`Pyramid::add_level`],
//!   slabs claimed with [`Pyramid::modify_slab`], and the state persisted
//!   with [`Pyramid::write_descriptor`] and [`Pyramid::flush_list`].

pub mod descriptor;
pub mod index;
pub mod level;
pub mod list;

pub use descriptor::{
    LevelDescriptor, LimitsDescriptor, PyramidDescriptor, StorageDescriptor, XmlPyramid,
};
pub use index::{
    Compatibility, Pyramid, PyramidMode, PyramidParams, StorageRoot, DEFAULT_PATH_DEPTH,
    DEFAULT_SLAB_SIZE,
};
pub use level::{Level, LevelParams, LevelStorage, SlabKind, TileLimits};
pub use list::{RootTable, SlabKey, SlabList, SlabRecord};
