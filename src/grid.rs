//! Tile grid geometry: tile matrices and tile matrix sets.
//!
//! A [`TileMatrixSet`] is the geometry definition shared by every pyramid
//! built against it: one [`TileMatrix`] per resolution level, each mapping
//! geographic coordinates to tile indices. Levels reference a matrix by id;
//! the set assigns each matrix an `order` (0 = coarsest, increasing with
//! resolution) used to sort levels from the top of the pyramid down.
//!
//! The full bbox/reprojection engine lives upstream; this module carries only
//! the operations the addressing layer consumes: id lookup, order
//! derivation, and x/y to column/row conversion.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::PyramidError;

// =============================================================================
// TileMatrix
// =============================================================================

/// One resolution level of a tile matrix set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileMatrix {
    /// Identifier, unique within the set (shared with pyramid level ids)
    pub id: String,

    /// Ground size of one pixel, in CRS units
    pub resolution: f64,

    /// X coordinate of the grid's top-left corner
    pub top_left_x: f64,

    /// Y coordinate of the grid's top-left corner
    pub top_left_y: f64,

    /// Tile width in pixels
    pub tile_width: u32,

    /// Tile height in pixels
    pub tile_height: u32,
}

impl TileMatrix {
    /// Convert an X coordinate to a tile column index.
    ///
    /// Coordinates left of the grid origin clamp to column 0.
    pub fn x_to_column(&self, x: f64) -> u64 {
        let span = self.resolution * f64::from(self.tile_width);
        let col = ((x - self.top_left_x) / span).floor();
        if col < 0.0 {
            0
        } else {
            col as u64
        }
    }

    /// Convert a Y coordinate to a tile row index.
    ///
    /// Rows grow downward: Y at the top-left corner is row 0.
    pub fn y_to_row(&self, y: f64) -> u64 {
        let span = self.resolution * f64::from(self.tile_height);
        let row = ((self.top_left_y - y) / span).floor();
        if row < 0.0 {
            0
        } else {
            row as u64
        }
    }

    /// Convert a bounding box to inclusive tile index bounds
    /// `(row_min, row_max, col_min, col_max)`.
    pub fn bbox_to_tile_indices(
        &self,
        xmin: f64,
        ymin: f64,
        xmax: f64,
        ymax: f64,
    ) -> (u64, u64, u64, u64) {
        // Y is inverted relative to rows: ymax gives the top (min) row
        (
            self.y_to_row(ymax),
            self.y_to_row(ymin),
            self.x_to_column(xmin),
            self.x_to_column(xmax),
        )
    }

    /// Convert a bounding box to inclusive slab index bounds for slabs of
    /// `slab_width` x `slab_height` tiles.
    pub fn bbox_to_slab_indices(
        &self,
        xmin: f64,
        ymin: f64,
        xmax: f64,
        ymax: f64,
        slab_width: u32,
        slab_height: u32,
    ) -> (u64, u64, u64, u64) {
        let (row_min, row_max, col_min, col_max) = self.bbox_to_tile_indices(xmin, ymin, xmax, ymax);
        let w = u64::from(slab_width.max(1));
        let h = u64::from(slab_height.max(1));
        (row_min / h, row_max / h, col_min / w, col_max / w)
    }
}

// =============================================================================
// TileMatrixSet
// =============================================================================

/// Serialized form of a tile matrix set document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TileMatrixSetDocument {
    name: String,
    tile_matrices: Vec<TileMatrix>,
}

/// A named collection of tile matrices with derived level ordering.
#[derive(Debug, Clone)]
pub struct TileMatrixSet {
    name: String,
    matrices: HashMap<String, TileMatrix>,
    /// Matrix id -> order, 0 = coarsest resolution
    orders: HashMap<String, usize>,
}

impl TileMatrixSet {
    /// Build a set from a name and its matrices.
    ///
    /// Fails on duplicate matrix ids or an empty matrix list. Orders are
    /// assigned by sorting matrices from coarsest (largest resolution,
    /// order 0) to finest.
    pub fn new(name: impl Into<String>, matrices: Vec<TileMatrix>) -> Result<Self, PyramidError> {
        if matrices.is_empty() {
            return Err(PyramidError::validation(
                "tile matrix set must contain at least one tile matrix",
            ));
        }

        let mut sorted: Vec<(String, f64)> = matrices
            .iter()
            .map(|m| (m.id.clone(), m.resolution))
            .collect();
        sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut orders = HashMap::new();
        for (order, (id, _)) in sorted.into_iter().enumerate() {
            orders.insert(id, order);
        }

        let mut by_id: HashMap<String, TileMatrix> = HashMap::new();
        for matrix in matrices {
            let id = matrix.id.clone();
            if by_id.insert(id.clone(), matrix).is_some() {
                return Err(PyramidError::validation(format!(
                    "duplicate tile matrix id '{id}'"
                )));
            }
        }

        Ok(Self {
            name: name.into(),
            matrices: by_id,
            orders,
        })
    }

    /// Parse a JSON tile matrix set document.
    pub fn from_json(content: &str) -> Result<Self, PyramidError> {
        let doc: TileMatrixSetDocument = serde_json::from_str(content)
            .map_err(|e| PyramidError::format(format!("invalid tile matrix set JSON: {e}")))?;
        Self::new(doc.name, doc.tile_matrices)
    }

    /// Name of the set, as referenced by pyramid descriptors.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a tile matrix by id.
    pub fn matrix(&self, id: &str) -> Option<&TileMatrix> {
        self.matrices.get(id)
    }

    /// Whether a matrix with this id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.matrices.contains_key(id)
    }

    /// Order of a level id: 0 for the coarsest matrix, strictly increasing
    /// with resolution.
    pub fn order_of(&self, id: &str) -> Option<usize> {
        self.orders.get(id).copied()
    }
}

// =============================================================================
// Tests
// =============================================================================
