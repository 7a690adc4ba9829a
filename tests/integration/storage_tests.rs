//! Storage routing tests.
//!
//! Tests verify:
//! - URI parsing for every backend scheme
//! - Backend rejection in `FileStorage`
//! - Kind isolation and cross-kind copies in `MemoryStorage`
//! - Slab addressing across the three object kinds

use bytes::Bytes;

use pyramid_store::{
    parse_storage_uri, FileStorage, IoError, MemoryStorage, ProxyStorage, SlabKind, StorageKind,
};

use super::test_utils::{ceph_pyramid, s3_pyramid, swift_pyramid};

// =============================================================================
// URI parsing
// =============================================================================

#[test]
fn test_parse_uri_for_every_scheme() {
    let (kind, location) = parse_storage_uri("file:///data/pyramids/WORLD.json").unwrap();
    assert_eq!((kind, location.as_str()), (StorageKind::File, "/data/pyramids/WORLD.json"));

    let (kind, location) = parse_storage_uri("s3://tiles/WORLD.json").unwrap();
    assert_eq!((kind, location.as_str()), (StorageKind::S3, "tiles/WORLD.json"));

    let (kind, location) = parse_storage_uri("swift://container/deep/WORLD.json").unwrap();
    assert_eq!(
        (kind, location.as_str()),
        (StorageKind::Swift, "container/deep/WORLD.json")
    );

    let (kind, location) = parse_storage_uri("ceph://pool/WORLD.json").unwrap();
    assert_eq!((kind, location.as_str()), (StorageKind::Ceph, "pool/WORLD.json"));
}

#[test]
fn test_parse_uri_rejects_unknown_scheme() {
    assert!(parse_storage_uri("https://tiles/WORLD.json").is_err());
    assert!(parse_storage_uri("/data/pyramids/WORLD.json").is_err());
}

// =============================================================================
// Backend routing
// =============================================================================

#[tokio::test]
async fn test_file_storage_rejects_object_kinds() {
    let storage = FileStorage::new();
    for kind in StorageKind::OBJECT_KINDS {
        let err = storage.fetch(kind, "container/key").await.unwrap_err();
        match err {
            IoError::BackendUnavailable { kind: reported, .. } => assert_eq!(reported, kind),
            other => panic!("expected BackendUnavailable, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_memory_storage_isolates_kinds() {
    let storage = MemoryStorage::new();
    storage
        .store(StorageKind::S3, "tiles/a", Bytes::from_static(b"s3"))
        .await
        .unwrap();

    // Same location under another kind is a distinct entry
    assert!(matches!(
        storage.fetch(StorageKind::Swift, "tiles/a").await,
        Err(IoError::NotFound(_))
    ));
    storage
        .copy(StorageKind::S3, "tiles/a", StorageKind::Swift, "tiles/a")
        .await
        .unwrap();
    assert_eq!(
        storage.fetch(StorageKind::Swift, "tiles/a").await.unwrap().as_ref(),
        b"s3"
    );
}

// =============================================================================
// Object slab addressing
// =============================================================================

#[test]
fn test_object_addressing_per_kind() {
    let cases = [
        (s3_pyramid("tiles", "PYR"), StorageKind::S3),
        (swift_pyramid("tiles", "PYR"), StorageKind::Swift),
        (ceph_pyramid("tiles", "PYR"), StorageKind::Ceph),
    ];

    for (pyramid, kind) in cases {
        assert_eq!(pyramid.storage_kind(), kind);
        let level = pyramid.level("12").unwrap();
        assert_eq!(level.storage_kind(), kind);
        // Flat keys: no fan-out directories on object storage
        assert_eq!(
            level.get_slab_path(SlabKind::Data, 5, 300, true).unwrap(),
            "tiles/PYR/DATA_12_5_300"
        );
        assert_eq!(
            level.get_slab_path(SlabKind::Data, 5, 300, false).unwrap(),
            "DATA_12_5_300"
        );
    }
}
