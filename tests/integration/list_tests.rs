//! Slab list lifecycle tests.
//!
//! Tests verify:
//! - Full build / claim / flush / reload cycles on the real filesystem
//! - Object-backed list round trips (S3 and CEPH addressing)
//! - Legacy object record repair through claim-and-flush
//! - Root table deduplication and foreign-root preservation
//! - MASK exclusion on flush and the delete/dirty contract

use bytes::Bytes;

use pyramid_store::{
    FileStorage, MemoryStorage, Pyramid, ProxyStorage, SlabKind, StorageKind,
};

use super::test_utils::{ceph_pyramid, file_pyramid, s3_pyramid, world_tms};

// =============================================================================
// File backend, real filesystem
// =============================================================================

#[tokio::test]
async fn test_file_pyramid_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().display().to_string();
    let storage = FileStorage::new();

    // Build and populate a WRITE pyramid
    let mut pyramid = file_pyramid(&root, "WORLD");
    pyramid.load_list(&storage).await.unwrap();
    assert!(pyramid.list().is_empty());

    pyramid.modify_slab(SlabKind::Data, "12", 5, 300).unwrap();
    pyramid.modify_slab(SlabKind::Mask, "12", 5, 300).unwrap();
    pyramid.modify_slab(SlabKind::Data, "11", 2, 1).unwrap();
    pyramid.write_descriptor(&storage).await.unwrap();
    pyramid.flush_list(&storage).await.unwrap();

    assert!(dir.path().join("WORLD.json").is_file());
    assert!(dir.path().join("WORLD.list").is_file());

    // Reload from the descriptor and the list
    let mut reloaded = Pyramid::from_uri(
        &format!("file://{root}/WORLD.json"),
        world_tms(),
        &storage,
    )
    .await
    .unwrap();
    reloaded.load_list(&storage).await.unwrap();

    let (slab_root, name) = reloaded
        .contain_slab(SlabKind::Data, "12", 5, 300)
        .unwrap();
    assert_eq!(slab_root, format!("{root}/WORLD"));
    assert_eq!(name, "DATA/12/00/08/5C.tif");
    assert!(reloaded.contain_slab(SlabKind::Data, "11", 2, 1).is_some());
    // MASK entries are never persisted
    assert!(reloaded.contain_slab(SlabKind::Mask, "12", 5, 300).is_none());

    // Limits claimed before the descriptor write survive the round trip
    let limits = reloaded.level("12").unwrap().limits().unwrap();
    assert_eq!(
        (limits.row_min, limits.row_max, limits.col_min, limits.col_max),
        (4800, 4815, 80, 95)
    );
}

#[tokio::test]
async fn test_file_list_content_shape() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().display().to_string();
    let storage = FileStorage::new();

    let mut pyramid = file_pyramid(&root, "WORLD");
    pyramid.load_list(&storage).await.unwrap();
    pyramid.modify_slab(SlabKind::Data, "12", 5, 300).unwrap();
    pyramid.flush_list(&storage).await.unwrap();

    let content = std::fs::read_to_string(dir.path().join("WORLD.list")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], format!("0={root}/WORLD"));
    assert_eq!(lines[1], "#");
    assert_eq!(lines[2], "0/DATA/12/00/08/5C.tif");
    assert_eq!(lines.len(), 3);
}

// =============================================================================
// Foreign roots
// =============================================================================

#[tokio::test]
async fn test_foreign_roots_survive_flush() {
    let storage = MemoryStorage::new();
    storage
        .store(
            StorageKind::File,
            "/data/pyramids/WORLD.list",
            Bytes::from(
                "0=/data/pyramids/ANCESTOR\n#\n0/DATA/11/00/00/21.tif\n0/DATA/11/00/00/22.tif\n",
            ),
        )
        .await
        .unwrap();

    let mut pyramid = file_pyramid("/data/pyramids", "WORLD");
    pyramid.load_list(&storage).await.unwrap();
    assert_eq!(pyramid.list().len(), 2);

    // Claim one new slab of our own; the ancestor records keep their root
    pyramid.modify_slab(SlabKind::Data, "12", 5, 300).unwrap();
    pyramid.flush_list(&storage).await.unwrap();

    let bytes = storage
        .fetch(StorageKind::File, "/data/pyramids/WORLD.list")
        .await
        .unwrap();
    let content = std::str::from_utf8(&bytes).unwrap();
    let lines: Vec<&str> = content.lines().collect();

    // Own root always sits at index 0; the ancestor root is interned once
    assert_eq!(lines[0], "0=/data/pyramids/WORLD");
    assert_eq!(lines[1], "1=/data/pyramids/ANCESTOR");
    assert_eq!(lines[2], "#");
    assert_eq!(lines.len(), 3 + 3);
    assert_eq!(
        content.matches("/data/pyramids/ANCESTOR").count(),
        1,
        "ancestor root must appear only in the header"
    );
    assert!(content.contains("0/DATA/12/00/08/5C.tif"));
    assert!(content.contains("1/DATA/11/00/00/21.tif"));
}

// =============================================================================
// Object backends
// =============================================================================

#[tokio::test]
async fn test_s3_pyramid_round_trip() {
    let storage = MemoryStorage::new();

    let mut pyramid = s3_pyramid("tiles", "MOUNT");
    pyramid.write_descriptor(&storage).await.unwrap();
    pyramid.load_list(&storage).await.unwrap();
    pyramid.modify_slab(SlabKind::Data, "12", 5, 300).unwrap();
    pyramid.flush_list(&storage).await.unwrap();

    let mut reloaded = Pyramid::from_uri("s3://tiles/MOUNT.json", world_tms(), &storage)
        .await
        .unwrap();
    reloaded.load_list(&storage).await.unwrap();

    let (root, name) = reloaded
        .contain_slab(SlabKind::Data, "12", 5, 300)
        .unwrap();
    assert_eq!(root, "tiles/MOUNT");
    assert_eq!(name, "DATA_12_5_300");
}

#[tokio::test]
async fn test_ceph_pyramid_round_trip() {
    let storage = MemoryStorage::new();

    let mut pyramid = ceph_pyramid("pool1", "DEEP");
    assert_eq!(pyramid.storage_kind(), StorageKind::Ceph);
    pyramid.write_descriptor(&storage).await.unwrap();
    pyramid.load_list(&storage).await.unwrap();
    pyramid.modify_slab(SlabKind::Data, "12", 7, 9).unwrap();
    pyramid.flush_list(&storage).await.unwrap();

    let bytes = storage
        .fetch(StorageKind::Ceph, "pool1/DEEP.list")
        .await
        .unwrap();
    let content = std::str::from_utf8(&bytes).unwrap();
    assert!(content.starts_with("0=pool1/DEEP\n#\n"));
    assert!(content.contains("0/DATA_12_7_9"));

    let mut reloaded = Pyramid::from_uri("ceph://pool1/DEEP.json", world_tms(), &storage)
        .await
        .unwrap();
    reloaded.load_list(&storage).await.unwrap();
    assert!(reloaded.contain_slab(SlabKind::Data, "12", 7, 9).is_some());
}

#[tokio::test]
async fn test_legacy_object_record_repair() {
    let storage = MemoryStorage::new();

    let pyramid = s3_pyramid("tiles", "MOUNT");
    pyramid.write_descriptor(&storage).await.unwrap();

    // Legacy record layout carries the pyramid name inside the target
    storage
        .store(
            StorageKind::S3,
            "tiles/MOUNT.list",
            Bytes::from("0=tiles\n#\n0/OLD_WORLD_DATA_12_5_300\n"),
        )
        .await
        .unwrap();

    let mut loaded = Pyramid::from_uri("s3://tiles/MOUNT.json", world_tms(), &storage)
        .await
        .unwrap();
    loaded.load_list(&storage).await.unwrap();

    // The name prefix is folded back into the root on load
    let (root, name) = loaded.contain_slab(SlabKind::Data, "12", 5, 300).unwrap();
    assert_eq!(root, "tiles/OLD_WORLD");
    assert_eq!(name, "DATA_12_5_300");

    // Claiming the slab rehomes it; the flushed list is fully canonical
    loaded.modify_slab(SlabKind::Data, "12", 5, 300).unwrap();
    loaded.flush_list(&storage).await.unwrap();

    let bytes = storage
        .fetch(StorageKind::S3, "tiles/MOUNT.list")
        .await
        .unwrap();
    let content = std::str::from_utf8(&bytes).unwrap();
    assert_eq!(content, "0=tiles/MOUNT\n#\n0/DATA_12_5_300\n");
}

// =============================================================================
// Delete and dirty contract
// =============================================================================

#[tokio::test]
async fn test_delete_without_mutation_is_not_flushed() {
    let storage = MemoryStorage::new();
    let original = "0=/data/pyramids/WORLD\n#\n0/DATA/12/00/08/5C.tif\n";
    storage
        .store(
            StorageKind::File,
            "/data/pyramids/WORLD.list",
            Bytes::from(original),
        )
        .await
        .unwrap();

    let mut pyramid = file_pyramid("/data/pyramids", "WORLD");
    pyramid.load_list(&storage).await.unwrap();

    assert!(pyramid.delete_slab(SlabKind::Data, "12", 5, 300));
    assert!(!pyramid.list().is_dirty());

    // Clean cache: flush writes nothing, the stored list is untouched
    pyramid.flush_list(&storage).await.unwrap();
    let bytes = storage
        .fetch(StorageKind::File, "/data/pyramids/WORLD.list")
        .await
        .unwrap();
    assert_eq!(std::str::from_utf8(&bytes).unwrap(), original);
}
