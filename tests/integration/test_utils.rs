//! Test utilities for integration tests.
//!
//! Provides a shared tile matrix set and pyramid builders for each backend
//! kind.

use std::sync::Arc;

use pyramid_store::{Pyramid, PyramidParams, TileMatrix, TileMatrixSet};

/// Three-level grid: "10" (coarsest) down to "12".
pub fn world_tms() -> Arc<TileMatrixSet> {
    let matrices = vec![
        TileMatrix {
            id: "10".to_string(),
            resolution: 4.0,
            top_left_x: 0.0,
            top_left_y: 1_048_576.0,
            tile_width: 256,
            tile_height: 256,
        },
        TileMatrix {
            id: "11".to_string(),
            resolution: 2.0,
            top_left_x: 0.0,
            top_left_y: 1_048_576.0,
            tile_width: 256,
            tile_height: 256,
        },
        TileMatrix {
            id: "12".to_string(),
            resolution: 1.0,
            top_left_x: 0.0,
            top_left_y: 1_048_576.0,
            tile_width: 256,
            tile_height: 256,
        },
    ];
    Arc::new(TileMatrixSet::new("WORLD_GRID", matrices).expect("valid grid"))
}

/// WRITE-mode file-backed pyramid with levels "11" and "12".
pub fn file_pyramid(directory: &str, name: &str) -> Pyramid {
    let mut pyramid = Pyramid::new(
        &PyramidParams {
            name: name.to_string(),
            format: "TIFF_RAW_UINT8".to_string(),
            own_masks: true,
            directory: Some(directory.to_string()),
            ..Default::default()
        },
        world_tms(),
        None,
    )
    .expect("valid file pyramid");
    pyramid.add_level("11", None).expect("level 11");
    pyramid.add_level("12", None).expect("level 12");
    pyramid
}

/// WRITE-mode S3-backed pyramid with level "12".
pub fn s3_pyramid(bucket: &str, name: &str) -> Pyramid {
    object_pyramid(
        PyramidParams {
            bucket: Some(bucket.to_string()),
            ..Default::default()
        },
        name,
    )
}

/// WRITE-mode SWIFT-backed pyramid with level "12".
pub fn swift_pyramid(container: &str, name: &str) -> Pyramid {
    object_pyramid(
        PyramidParams {
            container: Some(container.to_string()),
            ..Default::default()
        },
        name,
    )
}

/// WRITE-mode CEPH-backed pyramid with level "12".
pub fn ceph_pyramid(pool: &str, name: &str) -> Pyramid {
    object_pyramid(
        PyramidParams {
            pool: Some(pool.to_string()),
            ..Default::default()
        },
        name,
    )
}

fn object_pyramid(base: PyramidParams, name: &str) -> Pyramid {
    let mut pyramid = Pyramid::new(
        &PyramidParams {
            name: name.to_string(),
            format: "TIFF_JPG_UINT8".to_string(),
            slab_size: Some((16, 16)),
            own_masks: false,
            ..base
        },
        world_tms(),
        None,
    )
    .expect("valid object pyramid");
    pyramid.add_level("12", None).expect("level 12");
    pyramid
}
