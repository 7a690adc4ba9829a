//! Pyramid descriptor formats.
//!
//! JSON is the forward format, written and read; XML is the read-only legacy
//! format produced by earlier generations of the toolchain. Both carry the
//! same information: the tile matrix set name, the data-format code, and one
//! block per level with its slab size, optional tile limits, and a storage
//! block whose populated fields identify the backend kind.
//!
//! Grammar handling is entirely mechanical (serde / quick-xml); validation of
//! the field combinations happens in [`LevelDescriptor::to_level`].

use serde::{Deserialize, Serialize};

use crate::error::PyramidError;
use crate::grid::TileMatrixSet;
use crate::storage::StorageKind;

use super::level::{Level, LevelStorage, TileLimits};

// =============================================================================
// JSON descriptor (forward format)
// =============================================================================

/// Top-level pyramid descriptor, serialized to `{root}/{name}.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PyramidDescriptor {
    /// Name of the tile matrix set the pyramid is built against
    pub tile_matrix_set: String,

    /// Data-format code (e.g. "TIFF_RAW_UINT8")
    pub format: String,

    /// Levels, top of the pyramid (coarsest) first
    pub levels: Vec<LevelDescriptor>,
}

/// One level block of the descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelDescriptor {
    /// Tile matrix identifier
    pub id: String,

    /// Slab width, in tiles
    pub tiles_per_width: u32,

    /// Slab height, in tiles
    pub tiles_per_height: u32,

    /// Known data extent; an all-zero block means no extent is known yet
    pub tile_limits: LimitsDescriptor,

    /// Storage block; populated fields identify the backend kind
    pub storage: StorageDescriptor,
}

/// Inclusive tile-index rectangle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsDescriptor {
    pub min_row: u64,
    pub max_row: u64,
    pub min_col: u64,
    pub max_col: u64,
}

impl LimitsDescriptor {
    fn is_zeroed(&self) -> bool {
        *self == LimitsDescriptor::default()
    }
}

impl From<&TileLimits> for LimitsDescriptor {
    fn from(limits: &TileLimits) -> Self {
        LimitsDescriptor {
            min_row: limits.row_min,
            max_row: limits.row_max,
            min_col: limits.col_min,
            max_col: limits.col_max,
        }
    }
}

/// Storage block with one field set per concern.
///
/// The backend kind is not spelled out: it is inferred from which fields are
/// present, with the precedence `path_depth` (FILE) > `bucket_name` (S3) >
/// `pool_name` (CEPH) > `container_name` (SWIFT).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_directory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask_directory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_depth: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
}

impl StorageDescriptor {
    /// Resolve the populated fields into a storage variant.
    pub fn resolve(&self, level_id: &str) -> Result<LevelStorage, PyramidError> {
        if let Some(depth) = self.path_depth {
            if depth < 1 {
                return Err(PyramidError::validation(format!(
                    "level '{level_id}': path depth must be >= 1"
                )));
            }
            let image_dir = self.image_directory.clone().ok_or_else(|| {
                PyramidError::validation(format!("level '{level_id}': missing image directory"))
            })?;
            return Ok(LevelStorage::File {
                image_dir,
                mask_dir: self.mask_directory.clone(),
                path_depth: depth,
            });
        }

        let (kind, container) = if let Some(bucket) = &self.bucket_name {
            (StorageKind::S3, bucket.clone())
        } else if let Some(pool) = &self.pool_name {
            (StorageKind::Ceph, pool.clone())
        } else if let Some(container) = &self.container_name {
            (StorageKind::Swift, container.clone())
        } else {
            return Err(PyramidError::StorageType(format!(
                "level '{level_id}': no storage identifiable"
            )));
        };

        let image_prefix = self.image_prefix.clone().ok_or_else(|| {
            PyramidError::validation(format!("level '{level_id}': missing image prefix"))
        })?;
        Ok(LevelStorage::Object {
            kind,
            container,
            image_prefix,
            mask_prefix: self.mask_prefix.clone(),
        })
    }

    fn from_storage(storage: &LevelStorage) -> Self {
        match storage {
            LevelStorage::File {
                image_dir,
                mask_dir,
                path_depth,
            } => StorageDescriptor {
                image_directory: Some(image_dir.clone()),
                mask_directory: mask_dir.clone(),
                path_depth: Some(*path_depth),
                ..Default::default()
            },
            LevelStorage::Object {
                kind,
                container,
                image_prefix,
                mask_prefix,
            } => {
                let mut descriptor = StorageDescriptor {
                    image_prefix: Some(image_prefix.clone()),
                    mask_prefix: mask_prefix.clone(),
                    ..Default::default()
                };
                match kind {
                    StorageKind::S3 => descriptor.bucket_name = Some(container.clone()),
                    StorageKind::Ceph => descriptor.pool_name = Some(container.clone()),
                    StorageKind::Swift => descriptor.container_name = Some(container.clone()),
                    StorageKind::File => unreachable!("object storage never carries FILE"),
                }
                descriptor
            }
        }
    }
}

impl LevelDescriptor {
    /// Bind this descriptor against a tile matrix set, producing a level.
    pub fn to_level(&self, tms: &TileMatrixSet) -> Result<Level, PyramidError> {
        let storage = self.storage.resolve(&self.id)?;
        let limits = if self.tile_limits.is_zeroed() {
            None
        } else {
            Some(TileLimits::new(
                self.tile_limits.min_row,
                self.tile_limits.max_row,
                self.tile_limits.min_col,
                self.tile_limits.max_col,
            ))
        };
        Level::with_storage(
            &self.id,
            self.tiles_per_width,
            self.tiles_per_height,
            limits,
            storage,
            tms,
        )
    }

    /// Export a level to its descriptor block (the inverse of `to_level`).
    pub fn from_level(level: &Level) -> Self {
        LevelDescriptor {
            id: level.id().to_string(),
            tiles_per_width: level.tiles_per_width(),
            tiles_per_height: level.tiles_per_height(),
            tile_limits: level
                .limits()
                .map(LimitsDescriptor::from)
                .unwrap_or_default(),
            storage: StorageDescriptor::from_storage(level.storage()),
        }
    }
}

impl PyramidDescriptor {
    /// Parse the forward JSON format.
    pub fn from_json(content: &str) -> Result<Self, PyramidError> {
        serde_json::from_str(content)
            .map_err(|e| PyramidError::format(format!("invalid pyramid descriptor JSON: {e}")))
    }

    /// Serialize to the forward JSON format (pretty-printed).
    pub fn to_json(&self) -> Result<String, PyramidError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PyramidError::format(format!("descriptor serialization failed: {e}")))
    }
}

// =============================================================================
// XML descriptor (read-only legacy)
// =============================================================================

/// Legacy XML pyramid descriptor.
#[derive(Debug, Deserialize)]
pub struct XmlPyramid {
    #[serde(rename = "tileMatrixSet")]
    pub tile_matrix_set: String,
    pub format: String,
    #[serde(rename = "level", default)]
    pub levels: Vec<XmlLevel>,
}

/// One `<level>` element of the legacy descriptor.
#[derive(Debug, Deserialize)]
pub struct XmlLevel {
    #[serde(rename = "tileMatrix")]
    pub id: String,
    #[serde(rename = "tilesPerWidth")]
    pub tiles_per_width: u32,
    #[serde(rename = "tilesPerHeight")]
    pub tiles_per_height: u32,

    #[serde(rename = "pathDepth")]
    pub path_depth: Option<usize>,
    #[serde(rename = "baseDir")]
    pub base_dir: Option<String>,
    #[serde(rename = "maskDir")]
    pub mask_dir: Option<String>,

    #[serde(rename = "imagePrefix")]
    pub image_prefix: Option<String>,
    #[serde(rename = "maskPrefix")]
    pub mask_prefix: Option<String>,
    #[serde(rename = "bucketName")]
    pub bucket_name: Option<String>,
    #[serde(rename = "poolName")]
    pub pool_name: Option<String>,
    #[serde(rename = "containerName")]
    pub container_name: Option<String>,

    #[serde(rename = "TMSLimits")]
    pub limits: Option<XmlLimits>,
}

/// `<TMSLimits>` element.
#[derive(Debug, Deserialize)]
pub struct XmlLimits {
    #[serde(rename = "minTileRow")]
    pub min_tile_row: u64,
    #[serde(rename = "maxTileRow")]
    pub max_tile_row: u64,
    #[serde(rename = "minTileCol")]
    pub min_tile_col: u64,
    #[serde(rename = "maxTileCol")]
    pub max_tile_col: u64,
}

impl XmlPyramid {
    /// Parse a legacy XML descriptor.
    pub fn from_xml(content: &str) -> Result<Self, PyramidError> {
        quick_xml::de::from_str(content)
            .map_err(|e| PyramidError::format(format!("invalid pyramid descriptor XML: {e}")))
    }

    /// Normalize the legacy document into the forward descriptor shape.
    pub fn into_descriptor(self) -> PyramidDescriptor {
        PyramidDescriptor {
            tile_matrix_set: self.tile_matrix_set,
            format: self.format,
            levels: self.levels.into_iter().map(XmlLevel::into_descriptor).collect(),
        }
    }
}

impl XmlLevel {
    fn into_descriptor(self) -> LevelDescriptor {
        LevelDescriptor {
            id: self.id,
            tiles_per_width: self.tiles_per_width,
            tiles_per_height: self.tiles_per_height,
            tile_limits: self
                .limits
                .map(|l| LimitsDescriptor {
                    min_row: l.min_tile_row,
                    max_row: l.max_tile_row,
                    min_col: l.min_tile_col,
                    max_col: l.max_tile_col,
                })
                .unwrap_or_default(),
            storage: StorageDescriptor {
                image_directory: self.base_dir,
                mask_directory: self.mask_dir,
                path_depth: self.path_depth,
                image_prefix: self.image_prefix,
                mask_prefix: self.mask_prefix,
                bucket_name: self.bucket_name,
                pool_name: self.pool_name,
                container_name: self.container_name,
            },
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
