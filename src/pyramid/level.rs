//! Pyramid levels: per-level storage location, slab addressing, and the
//! known data-extent rectangle.
//!
//! A [`Level`] is always bound to its tile matrix: every constructor takes
//! the [`TileMatrixSet`] and fails with a binding error when the level id has
//! no matching matrix, so a level can never be used half-initialized.

use std::fmt;

use crate::codec::{decode_slab_path, encode_slab_path};
use crate::error::PyramidError;
use crate::grid::{TileMatrix, TileMatrixSet};
use crate::storage::StorageKind;

// =============================================================================
// SlabKind
// =============================================================================

/// The two kinds of slabs a level can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlabKind {
    /// Image data
    Data,
    /// Binary mask marking which pixels carry data
    Mask,
}

impl SlabKind {
    /// Parse a slab-kind token, accepting the legacy aliases used by old
    /// list files ("IMG", "IMAGE") for data slabs.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "DATA" | "IMG" | "IMAGE" => Some(SlabKind::Data),
            "MASK" => Some(SlabKind::Mask),
            _ => None,
        }
    }
}

impl fmt::Display for SlabKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SlabKind::Data => "DATA",
            SlabKind::Mask => "MASK",
        })
    }
}

// =============================================================================
// TileLimits
// =============================================================================

/// Inclusive rectangle of tile indices known to contain data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLimits {
    pub row_min: u64,
    pub row_max: u64,
    pub col_min: u64,
    pub col_max: u64,
}

impl TileLimits {
    pub fn new(row_min: u64, row_max: u64, col_min: u64, col_max: u64) -> Self {
        Self {
            row_min,
            row_max,
            col_min,
            col_max,
        }
    }

    /// Widen this rectangle to the bounding box of both rectangles.
    ///
    /// Widening is associative, commutative and idempotent, so limits end up
    /// identical whatever order updates arrive in.
    pub fn union_with(&mut self, other: &TileLimits) {
        self.row_min = self.row_min.min(other.row_min);
        self.row_max = self.row_max.max(other.row_max);
        self.col_min = self.col_min.min(other.col_min);
        self.col_max = self.col_max.max(other.col_max);
    }
}

// =============================================================================
// LevelStorage
// =============================================================================

/// Where one level's slabs live: exactly one variant per level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelStorage {
    /// Hierarchical base-36 directories on a filesystem
    File {
        image_dir: String,
        mask_dir: Option<String>,
        /// Number of intermediate directories (>= 1); slab paths have
        /// `path_depth + 1` segments
        path_depth: usize,
    },
    /// Flat delimited keys in an object container
    Object {
        kind: StorageKind,
        container: String,
        image_prefix: String,
        mask_prefix: Option<String>,
    },
}

impl LevelStorage {
    /// Backend kind of this storage variant.
    pub fn kind(&self) -> StorageKind {
        match self {
            LevelStorage::File { .. } => StorageKind::File,
            LevelStorage::Object { kind, .. } => *kind,
        }
    }
}

// =============================================================================
// LevelParams
// =============================================================================

/// Explicit construction parameters for a level.
///
/// The storage variant is inferred from which optional fields are present,
/// in this precedence: `path_depth` implies FILE, else `bucket` implies S3,
/// else `pool` implies CEPH, else `container` implies SWIFT.
#[derive(Debug, Clone, Default)]
pub struct LevelParams {
    pub id: String,
    pub tiles_per_width: u32,
    pub tiles_per_height: u32,
    /// Whether the level stores masks alongside data
    pub own_masks: bool,

    /// FILE: directory fan-out depth
    pub path_depth: Option<usize>,
    /// FILE: root directory the DATA/MASK trees hang under
    pub data_root: Option<String>,

    /// S3 bucket name
    pub bucket: Option<String>,
    /// CEPH pool name
    pub pool: Option<String>,
    /// SWIFT container name
    pub container: Option<String>,
    /// Object key prefix, usually the pyramid name
    pub prefix: Option<String>,
}

impl LevelParams {
    fn resolve_storage(&self) -> Result<LevelStorage, PyramidError> {
        if let Some(depth) = self.path_depth {
            if depth < 1 {
                return Err(PyramidError::validation(format!(
                    "level '{}': path depth must be >= 1",
                    self.id
                )));
            }
            let data_root = self.data_root.as_deref().ok_or_else(|| {
                PyramidError::validation(format!("level '{}': missing data root", self.id))
            })?;
            return Ok(LevelStorage::File {
                image_dir: format!("{data_root}/DATA/{}", self.id),
                mask_dir: self
                    .own_masks
                    .then(|| format!("{data_root}/MASK/{}", self.id)),
                path_depth: depth,
            });
        }

        let (kind, container) = if let Some(bucket) = &self.bucket {
            (StorageKind::S3, bucket.clone())
        } else if let Some(pool) = &self.pool {
            (StorageKind::Ceph, pool.clone())
        } else if let Some(container) = &self.container {
            (StorageKind::Swift, container.clone())
        } else {
            return Err(PyramidError::StorageType(format!(
                "level '{}': no storage identifiable",
                self.id
            )));
        };

        let prefix = self.prefix.as_deref().ok_or_else(|| {
            PyramidError::validation(format!("level '{}': missing object prefix", self.id))
        })?;
        Ok(LevelStorage::Object {
            kind,
            container,
            image_prefix: format!("{prefix}/DATA_{}", self.id),
            mask_prefix: self.own_masks.then(|| format!("{prefix}/MASK_{}", self.id)),
        })
    }
}

// =============================================================================
// Level
// =============================================================================

/// One resolution layer of a pyramid.
#[derive(Debug, Clone)]
pub struct Level {
    id: String,
    order: usize,
    matrix: TileMatrix,
    tiles_per_width: u32,
    tiles_per_height: u32,
    limits: Option<TileLimits>,
    storage: LevelStorage,
}

impl Level {
    /// Build a level from explicit parameters, bound against `tms`.
    pub fn new(params: &LevelParams, tms: &TileMatrixSet) -> Result<Self, PyramidError> {
        let storage = params.resolve_storage()?;
        Self::with_storage(
            &params.id,
            params.tiles_per_width,
            params.tiles_per_height,
            None,
            storage,
            tms,
        )
    }

    /// Build a level from an already-resolved storage variant.
    pub(crate) fn with_storage(
        id: &str,
        tiles_per_width: u32,
        tiles_per_height: u32,
        limits: Option<TileLimits>,
        storage: LevelStorage,
        tms: &TileMatrixSet,
    ) -> Result<Self, PyramidError> {
        if id.is_empty() {
            return Err(PyramidError::validation("level id must not be empty"));
        }
        if tiles_per_width == 0 || tiles_per_height == 0 {
            return Err(PyramidError::validation(format!(
                "level '{id}': slab size must be positive, got {tiles_per_width}x{tiles_per_height}"
            )));
        }

        let matrix = tms
            .matrix(id)
            .cloned()
            .ok_or_else(|| PyramidError::Binding {
                level: id.to_string(),
                tms: tms.name().to_string(),
            })?;
        // order_of cannot fail once the matrix resolved
        let order = tms.order_of(id).unwrap_or_default();

        Ok(Self {
            id: id.to_string(),
            order,
            matrix,
            tiles_per_width,
            tiles_per_height,
            limits,
            storage,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Position in the pyramid: 0 for the coarsest level, increasing with
    /// resolution.
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn matrix(&self) -> &TileMatrix {
        &self.matrix
    }

    /// Slab width, in tiles.
    pub fn tiles_per_width(&self) -> u32 {
        self.tiles_per_width
    }

    /// Slab height, in tiles.
    pub fn tiles_per_height(&self) -> u32 {
        self.tiles_per_height
    }

    pub fn limits(&self) -> Option<&TileLimits> {
        self.limits.as_ref()
    }

    pub fn storage(&self) -> &LevelStorage {
        &self.storage
    }

    pub fn storage_kind(&self) -> StorageKind {
        self.storage.kind()
    }

    /// Whether this level stores masks alongside data.
    pub fn own_masks(&self) -> bool {
        match &self.storage {
            LevelStorage::File { mask_dir, .. } => mask_dir.is_some(),
            LevelStorage::Object { mask_prefix, .. } => mask_prefix.is_some(),
        }
    }

    // -------------------------------------------------------------------------
    // Slab addressing
    // -------------------------------------------------------------------------

    /// Compute the backend-specific key for a slab coordinate.
    ///
    /// Returns `None` for MASK requests on a level that does not own masks.
    /// With `full = false` the result is the backend-relative name used in
    /// list files (`{kind}/{id}/{b36}.tif` resp. `{kind}_{id}_{col}_{row}`);
    /// with `full = true` it is the absolute path/object key.
    pub fn get_slab_path(&self, kind: SlabKind, col: u64, row: u64, full: bool) -> Option<String> {
        if kind == SlabKind::Mask && !self.own_masks() {
            return None;
        }
        match &self.storage {
            LevelStorage::File {
                image_dir,
                path_depth,
                ..
            } => {
                let b36 = encode_slab_path(col, row, path_depth + 1);
                if full {
                    // MASK slabs resolve under image_dir as well; list repair
                    // relies on this exact behavior
                    Some(format!("{image_dir}/{b36}.tif"))
                } else {
                    Some(format!("{kind}/{}/{b36}.tif", self.id))
                }
            }
            LevelStorage::Object {
                container,
                image_prefix,
                mask_prefix,
                ..
            } => {
                if full {
                    let prefix = match kind {
                        SlabKind::Data => image_prefix.as_str(),
                        SlabKind::Mask => mask_prefix.as_deref()?,
                    };
                    Some(format!("{container}/{prefix}_{col}_{row}"))
                } else {
                    Some(format!("{kind}_{}_{col}_{row}", self.id))
                }
            }
        }
    }

    /// Recover the slab coordinate from a stored path, the inverse of
    /// [`Level::get_slab_path`].
    pub fn slab_coordinates(&self, path: &str) -> Result<(u64, u64), PyramidError> {
        match &self.storage {
            LevelStorage::File { path_depth, .. } => {
                let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
                let wanted = path_depth + 1;
                if segments.len() < wanted {
                    return Err(PyramidError::format(format!(
                        "slab path '{path}' has fewer than {wanted} segments"
                    )));
                }
                let mut tail = segments[segments.len() - wanted..].to_vec();
                if let Some(last) = tail.last_mut() {
                    *last = strip_tiff_extension(*last);
                }
                decode_slab_path(&tail.join("/"))
            }
            LevelStorage::Object { .. } => {
                let tokens: Vec<&str> = path.split('_').collect();
                if tokens.len() < 2 {
                    return Err(PyramidError::format(format!(
                        "object slab key '{path}' has no coordinate suffix"
                    )));
                }
                let row = parse_coordinate(tokens[tokens.len() - 1], path)?;
                let col = parse_coordinate(tokens[tokens.len() - 2], path)?;
                Ok((col, row))
            }
        }
    }

    // -------------------------------------------------------------------------
    // Limits
    // -------------------------------------------------------------------------

    /// Widen the known data extent with another rectangle.
    pub fn update_limits(&mut self, row_min: u64, row_max: u64, col_min: u64, col_max: u64) {
        let rect = TileLimits::new(row_min, row_max, col_min, col_max);
        match &mut self.limits {
            Some(limits) => limits.union_with(&rect),
            None => self.limits = Some(rect),
        }
    }

    /// Fold the tile rectangle covered by slab `(col, row)` into the limits.
    pub fn update_limits_from_slab(&mut self, col: u64, row: u64) {
        let w = u64::from(self.tiles_per_width);
        let h = u64::from(self.tiles_per_height);
        self.update_limits(row * h, row * h + h - 1, col * w, col * w + w - 1);
    }

    /// Fold the tile rectangle covered by a bounding box into the limits.
    pub fn update_limits_from_bbox(&mut self, xmin: f64, ymin: f64, xmax: f64, ymax: f64) {
        let (row_min, row_max, col_min, col_max) =
            self.matrix.bbox_to_tile_indices(xmin, ymin, xmax, ymax);
        self.update_limits(row_min, row_max, col_min, col_max);
    }

    // -------------------------------------------------------------------------
    // Cloning / re-homing
    // -------------------------------------------------------------------------

    /// Rewrite the storage location for a pyramid being cloned under a new
    /// name (and, for file storage, a new root directory).
    ///
    /// The grid binding, order, slab size and limits are untouched.
    pub fn update_storage(&mut self, new_name: &str, new_root: Option<&str>) {
        match &mut self.storage {
            LevelStorage::File {
                image_dir,
                mask_dir,
                ..
            } => {
                if let Some(root) = new_root {
                    *image_dir = format!("{root}/{new_name}/DATA/{}", self.id);
                    if let Some(dir) = mask_dir {
                        *dir = format!("{root}/{new_name}/MASK/{}", self.id);
                    }
                }
            }
            LevelStorage::Object {
                image_prefix,
                mask_prefix,
                ..
            } => {
                *image_prefix = format!("{new_name}/DATA_{}", self.id);
                if let Some(prefix) = mask_prefix {
                    *prefix = format!("{new_name}/MASK_{}", self.id);
                }
            }
        }
    }

    /// Shallow copy with the storage location rewritten for `new_name`.
    pub fn clone_to(&self, new_name: &str, new_root: Option<&str>) -> Level {
        let mut cloned = self.clone();
        cloned.update_storage(new_name, new_root);
        cloned
    }
}

/// Strip a trailing `.tif` / `.tiff`, case-insensitively.
fn strip_tiff_extension(name: &str) -> &str {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".tiff") {
        &name[..name.len() - 5]
    } else if lower.ends_with(".tif") {
        &name[..name.len() - 4]
    } else {
        name
    }
}

fn parse_coordinate(token: &str, path: &str) -> Result<u64, PyramidError> {
    token.parse::<u64>().map_err(|_| {
        PyramidError::format(format!("non-numeric coordinate '{token}' in slab key '{path}'"))
    })
}

// =============================================================================
// Tests
// =============================================================================
