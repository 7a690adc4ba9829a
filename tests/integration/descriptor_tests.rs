//! Descriptor round-trip and validation tests.
//!
//! Tests verify:
//! - JSON descriptor write/reload over file and object backends
//! - Legacy XML descriptors, including relative directory resolution
//! - Rejection of mixed-backend and mixed-slab-size descriptors

use bytes::Bytes;

use pyramid_store::pyramid::{LevelDescriptor, LimitsDescriptor, StorageDescriptor};
use pyramid_store::{
    Compatibility, MemoryStorage, Pyramid, PyramidDescriptor, PyramidError, PyramidMode,
    ProxyStorage, SlabKind, StorageKind,
};

use super::test_utils::{file_pyramid, swift_pyramid, world_tms};

// =============================================================================
// JSON round trips
// =============================================================================

#[tokio::test]
async fn test_file_descriptor_round_trip() {
    let storage = MemoryStorage::new();
    let original = file_pyramid("/data/pyramids", "WORLD");
    original.write_descriptor(&storage).await.unwrap();

    let loaded = Pyramid::from_uri(
        "file:///data/pyramids/WORLD.json",
        world_tms(),
        &storage,
    )
    .await
    .unwrap();

    assert_eq!(loaded.name(), "WORLD");
    assert_eq!(loaded.mode(), PyramidMode::Read);
    assert_eq!(loaded.format(), "TIFF_RAW_UINT8");
    assert!(loaded.own_masks());

    // Coarsest level first
    let ids: Vec<&str> = loaded.levels_top_down().iter().map(|l| l.id()).collect();
    assert_eq!(ids, vec!["11", "12"]);

    assert_eq!(
        original.check_compatibility(&loaded),
        Compatibility::Identical
    );
}

#[tokio::test]
async fn test_swift_descriptor_round_trip() {
    let storage = MemoryStorage::new();
    let original = swift_pyramid("tiles", "SEA");
    original.write_descriptor(&storage).await.unwrap();

    let loaded = Pyramid::from_uri("swift://tiles/SEA.json", world_tms(), &storage)
        .await
        .unwrap();

    assert_eq!(loaded.storage_kind(), StorageKind::Swift);
    assert_eq!(loaded.data_root(), "tiles/SEA");
    assert_eq!(
        loaded
            .level("12")
            .unwrap()
            .get_slab_path(SlabKind::Data, 5, 300, true)
            .unwrap(),
        "tiles/SEA/DATA_12_5_300"
    );
    assert_eq!(
        original.check_compatibility(&loaded),
        Compatibility::Identical
    );
}

// =============================================================================
// Legacy XML
// =============================================================================

#[tokio::test]
async fn test_legacy_xml_with_relative_directories() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<Pyramid>
    <tileMatrixSet>WORLD_GRID</tileMatrixSet>
    <format>TIFF_RAW_UINT8</format>
    <level>
        <tileMatrix>12</tileMatrix>
        <tilesPerWidth>16</tilesPerWidth>
        <tilesPerHeight>16</tilesPerHeight>
        <baseDir>LEGACY/DATA/12</baseDir>
        <pathDepth>2</pathDepth>
        <TMSLimits>
            <minTileRow>5</minTileRow>
            <maxTileRow>90</maxTileRow>
            <minTileCol>3</minTileCol>
            <maxTileCol>77</maxTileCol>
        </TMSLimits>
    </level>
</Pyramid>"#;

    let storage = MemoryStorage::new();
    storage
        .store(
            StorageKind::File,
            "/data/pyramids/LEGACY.xml",
            Bytes::from(xml),
        )
        .await
        .unwrap();

    let loaded = Pyramid::from_uri("file:///data/pyramids/LEGACY.xml", world_tms(), &storage)
        .await
        .unwrap();

    assert_eq!(loaded.name(), "LEGACY");
    // No maskDir in the descriptor
    assert!(!loaded.own_masks());

    let level = loaded.level("12").unwrap();
    let limits = level.limits().unwrap();
    assert_eq!((limits.row_min, limits.col_max), (5, 77));

    // Relative baseDir resolved against the descriptor's directory
    assert_eq!(
        level.get_slab_path(SlabKind::Data, 5, 300, true).unwrap(),
        "/data/pyramids/LEGACY/DATA/12/00/08/5C.tif"
    );
}

// =============================================================================
// Rejected descriptors
// =============================================================================

fn file_level(id: &str, tiles_per_width: u32) -> LevelDescriptor {
    LevelDescriptor {
        id: id.to_string(),
        tiles_per_width,
        tiles_per_height: 16,
        tile_limits: LimitsDescriptor::default(),
        storage: StorageDescriptor {
            image_directory: Some(format!("/data/pyramids/BAD/DATA/{id}")),
            path_depth: Some(2),
            ..Default::default()
        },
    }
}

#[tokio::test]
async fn test_level_backend_must_match_descriptor_location() {
    let descriptor = PyramidDescriptor {
        tile_matrix_set: "WORLD_GRID".to_string(),
        format: "TIFF_RAW_UINT8".to_string(),
        levels: vec![file_level("12", 16)],
    };

    let storage = MemoryStorage::new();
    storage
        .store(
            StorageKind::S3,
            "tiles/BAD.json",
            Bytes::from(descriptor.to_json().unwrap()),
        )
        .await
        .unwrap();

    // FILE level in a descriptor living on S3
    assert!(matches!(
        Pyramid::from_uri("s3://tiles/BAD.json", world_tms(), &storage).await,
        Err(PyramidError::StorageType(_))
    ));
}

#[tokio::test]
async fn test_levels_must_agree_on_slab_size() {
    let descriptor = PyramidDescriptor {
        tile_matrix_set: "WORLD_GRID".to_string(),
        format: "TIFF_RAW_UINT8".to_string(),
        levels: vec![file_level("11", 16), file_level("12", 8)],
    };

    let storage = MemoryStorage::new();
    storage
        .store(
            StorageKind::File,
            "/data/pyramids/BAD.json",
            Bytes::from(descriptor.to_json().unwrap()),
        )
        .await
        .unwrap();

    assert!(matches!(
        Pyramid::from_uri("file:///data/pyramids/BAD.json", world_tms(), &storage).await,
        Err(PyramidError::Validation(_))
    ));
}

#[tokio::test]
async fn test_descriptor_without_levels_rejected() {
    let descriptor = PyramidDescriptor {
        tile_matrix_set: "WORLD_GRID".to_string(),
        format: "TIFF_RAW_UINT8".to_string(),
        levels: vec![],
    };

    let storage = MemoryStorage::new();
    storage
        .store(
            StorageKind::File,
            "/data/pyramids/EMPTY.json",
            Bytes::from(descriptor.to_json().unwrap()),
        )
        .await
        .unwrap();

    assert!(matches!(
        Pyramid::from_uri("file:///data/pyramids/EMPTY.json", world_tms(), &storage).await,
        Err(PyramidError::Validation(_))
    ));
}
