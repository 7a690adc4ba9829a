//! The pyramid index: the set of levels, the pyramid-wide storage root, and
//! descriptor construction/loading.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::PyramidError;
use crate::grid::TileMatrixSet;
use crate::storage::{parse_storage_uri, ProxyStorage, StorageKind};

use super::descriptor::{LevelDescriptor, PyramidDescriptor, XmlPyramid};
use super::level::{Level, LevelParams, LevelStorage};
use super::list::SlabList;

/// Default directory fan-out depth for file-backed pyramids.
pub const DEFAULT_PATH_DEPTH: usize = 2;

/// Default slab size (tiles per side) for file-backed pyramids.
pub const DEFAULT_SLAB_SIZE: u32 = 16;

// =============================================================================
// Supporting types
// =============================================================================

/// Lifecycle mode of a pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PyramidMode {
    /// Loaded from an existing descriptor; levels are fixed
    Read,
    /// Being newly constructed; levels may be added
    Write,
}

/// Result of comparing two pyramids for slab-level reuse.
///
/// `Compatible` is reserved for future format-conversion cases; the current
/// checks only produce `Incompatible` or `Identical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Compatibility {
    Incompatible = 0,
    Compatible = 1,
    Identical = 2,
}

/// Pyramid-wide storage root, one variant per backend family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageRoot {
    /// Directory the pyramid's descriptor, list and data tree live under
    File { directory: String, path_depth: usize },
    /// Bucket / pool / container (possibly with a key prefix)
    Object { kind: StorageKind, root: String },
}

impl StorageRoot {
    pub fn kind(&self) -> StorageKind {
        match self {
            StorageRoot::File { .. } => StorageKind::File,
            StorageRoot::Object { kind, .. } => *kind,
        }
    }

    /// The location string descriptor/list paths are joined under.
    pub fn location(&self) -> &str {
        match self {
            StorageRoot::File { directory, .. } => directory,
            StorageRoot::Object { root, .. } => root,
        }
    }
}

/// Explicit construction parameters for a new (WRITE) pyramid.
///
/// The storage kind follows the same field-presence precedence as levels:
/// a directory (or depth) means FILE, else `bucket` means S3, else `pool`
/// means CEPH, else `container` means SWIFT.
#[derive(Debug, Clone, Default)]
pub struct PyramidParams {
    pub name: String,
    /// Data-format code, e.g. "TIFF_RAW_UINT8"
    pub format: String,
    /// Slab size in tiles; defaults to 16x16 for file-backed pyramids
    pub slab_size: Option<(u32, u32)>,
    /// Whether levels store masks alongside data
    pub own_masks: bool,

    /// FILE: directory to put the pyramid under
    pub directory: Option<String>,
    /// FILE: directory fan-out depth (default 2)
    pub path_depth: Option<usize>,
    /// S3 bucket name
    pub bucket: Option<String>,
    /// CEPH pool name
    pub pool: Option<String>,
    /// SWIFT container name
    pub container: Option<String>,
}

impl PyramidParams {
    fn resolve_root(&self) -> Result<StorageRoot, PyramidError> {
        if self.directory.is_some() || self.path_depth.is_some() {
            let directory = self.directory.clone().ok_or_else(|| {
                PyramidError::validation(format!(
                    "pyramid '{}': missing data directory",
                    self.name
                ))
            })?;
            return Ok(StorageRoot::File {
                directory,
                path_depth: self.path_depth.unwrap_or(DEFAULT_PATH_DEPTH),
            });
        }
        if let Some(bucket) = &self.bucket {
            return Ok(StorageRoot::Object {
                kind: StorageKind::S3,
                root: bucket.clone(),
            });
        }
        if let Some(pool) = &self.pool {
            return Ok(StorageRoot::Object {
                kind: StorageKind::Ceph,
                root: pool.clone(),
            });
        }
        if let Some(container) = &self.container {
            return Ok(StorageRoot::Object {
                kind: StorageKind::Swift,
                root: container.clone(),
            });
        }
        Err(PyramidError::StorageType(format!(
            "pyramid '{}': no storage identifiable",
            self.name
        )))
    }
}

// =============================================================================
// Pyramid
// =============================================================================

/// A tile pyramid: levels, storage root, and the slab list index.
#[derive(Debug)]
pub struct Pyramid {
    name: String,
    mode: PyramidMode,
    owns_ancestor: bool,
    tiles_per_width: u32,
    tiles_per_height: u32,
    own_masks: bool,
    format: String,
    tms: Arc<TileMatrixSet>,
    pub(super) levels: HashMap<String, Level>,
    storage_root: StorageRoot,
    pub(super) list: SlabList,
}

impl Pyramid {
    /// Create a new WRITE-mode pyramid from explicit parameters.
    ///
    /// When an ancestor is given its backend kind must match the requested
    /// one; its grid and slab size are adopted verbatim.
    pub fn new(
        params: &PyramidParams,
        tms: Arc<TileMatrixSet>,
        ancestor: Option<&Pyramid>,
    ) -> Result<Self, PyramidError> {
        if params.name.is_empty() {
            return Err(PyramidError::validation("pyramid name must not be empty"));
        }
        if params.format.is_empty() {
            return Err(PyramidError::validation(format!(
                "pyramid '{}': missing format code",
                params.name
            )));
        }
        let storage_root = params.resolve_root()?;

        let (tms, slab_size, owns_ancestor) = match ancestor {
            Some(ancestor) => {
                if ancestor.storage_kind() != storage_root.kind() {
                    return Err(PyramidError::StorageType(format!(
                        "pyramid '{}': ancestor uses {} storage, requested {}",
                        params.name,
                        ancestor.storage_kind(),
                        storage_root.kind()
                    )));
                }
                (
                    ancestor.tms.clone(),
                    (ancestor.tiles_per_width, ancestor.tiles_per_height),
                    true,
                )
            }
            None => {
                let slab_size = match (params.slab_size, &storage_root) {
                    (Some(size), _) => size,
                    (None, StorageRoot::File { .. }) => (DEFAULT_SLAB_SIZE, DEFAULT_SLAB_SIZE),
                    (None, StorageRoot::Object { .. }) => {
                        return Err(PyramidError::validation(format!(
                            "pyramid '{}': slab size required for object storage",
                            params.name
                        )))
                    }
                };
                (tms, slab_size, false)
            }
        };

        if slab_size.0 == 0 || slab_size.1 == 0 {
            return Err(PyramidError::validation(format!(
                "pyramid '{}': slab size must be positive",
                params.name
            )));
        }

        Ok(Self {
            name: params.name.clone(),
            mode: PyramidMode::Write,
            owns_ancestor,
            tiles_per_width: slab_size.0,
            tiles_per_height: slab_size.1,
            own_masks: params.own_masks,
            format: params.format.clone(),
            tms,
            levels: HashMap::new(),
            storage_root,
            list: SlabList::default(),
        })
    }

    /// Load a READ-mode pyramid from a descriptor URI
    /// (`file://`, `s3://`, `ceph://` or `swift://`).
    ///
    /// The pyramid name is the descriptor's filename/key with the extension
    /// stripped; the extension picks the parser (`.json` forward format,
    /// `.xml` legacy).
    pub async fn from_uri(
        uri: &str,
        tms: Arc<TileMatrixSet>,
        storage: &dyn ProxyStorage,
    ) -> Result<Self, PyramidError> {
        let (kind, location) = parse_storage_uri(uri)?;

        let (parent, file_name) = match location.rsplit_once('/') {
            Some((parent, file_name)) => (parent.to_string(), file_name.to_string()),
            None => (String::new(), location.clone()),
        };
        let (name, extension) = file_name.rsplit_once('.').ok_or_else(|| {
            PyramidError::format(format!("descriptor '{uri}' has no file extension"))
        })?;
        if name.is_empty() {
            return Err(PyramidError::validation(format!(
                "cannot derive a pyramid name from '{uri}'"
            )));
        }
        let extension = extension.to_ascii_lowercase();
        if extension != "json" && extension != "xml" {
            return Err(PyramidError::format(format!(
                "unsupported descriptor extension '.{extension}'"
            )));
        }

        debug!(uri, name, "loading pyramid descriptor");
        let bytes = storage.fetch(kind, &location).await?;
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| PyramidError::format(format!("descriptor '{uri}' is not valid UTF-8")))?;

        let mut descriptor = if extension == "json" {
            PyramidDescriptor::from_json(content)?
        } else {
            XmlPyramid::from_xml(content)?.into_descriptor()
        };

        if descriptor.tile_matrix_set != tms.name() {
            return Err(PyramidError::validation(format!(
                "pyramid '{name}' references grid '{}', got '{}'",
                descriptor.tile_matrix_set,
                tms.name()
            )));
        }
        if descriptor.levels.is_empty() {
            return Err(PyramidError::validation(format!(
                "pyramid '{name}' declares no levels"
            )));
        }

        // FILE directories in a descriptor are relative to its own location
        for level in &mut descriptor.levels {
            if level.storage.path_depth.is_some() {
                if let Some(dir) = &mut level.storage.image_directory {
                    *dir = absolutize(dir, &parent);
                }
                if let Some(dir) = &mut level.storage.mask_directory {
                    *dir = absolutize(dir, &parent);
                }
            }
        }

        let mut levels: HashMap<String, Level> = HashMap::new();
        let mut slab_size: Option<(u32, u32)> = None;
        let mut file_depth: Option<usize> = None;
        let mut any_masks = false;

        for level_descriptor in &descriptor.levels {
            let level = level_descriptor.to_level(&tms)?;

            if level.storage_kind() != kind {
                return Err(PyramidError::StorageType(format!(
                    "pyramid '{name}': level '{}' uses {} storage but the descriptor lives on {}",
                    level.id(),
                    level.storage_kind(),
                    kind
                )));
            }

            let size = (level.tiles_per_width(), level.tiles_per_height());
            match slab_size {
                None => slab_size = Some(size),
                Some(expected) if expected != size => {
                    return Err(PyramidError::validation(format!(
                        "pyramid '{name}': level '{}' has slab size {}x{}, expected {}x{}",
                        level.id(),
                        size.0,
                        size.1,
                        expected.0,
                        expected.1
                    )))
                }
                Some(_) => {}
            }

            if let LevelStorage::File { path_depth, .. } = level.storage() {
                file_depth.get_or_insert(*path_depth);
            }
            any_masks |= level.own_masks();

            if levels.insert(level.id().to_string(), level).is_some() {
                return Err(PyramidError::validation(format!(
                    "pyramid '{name}': duplicate level id '{}'",
                    level_descriptor.id
                )));
            }
        }

        let storage_root = match kind {
            StorageKind::File => StorageRoot::File {
                directory: parent,
                path_depth: file_depth.unwrap_or(DEFAULT_PATH_DEPTH),
            },
            object_kind => StorageRoot::Object {
                kind: object_kind,
                root: parent,
            },
        };

        let slab_size = slab_size.expect("at least one level");
        Ok(Self {
            name: name.to_string(),
            mode: PyramidMode::Read,
            owns_ancestor: false,
            tiles_per_width: slab_size.0,
            tiles_per_height: slab_size.1,
            own_masks: any_masks,
            format: descriptor.format,
            tms,
            levels,
            storage_root,
            list: SlabList::default(),
        })
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> PyramidMode {
        self.mode
    }

    pub fn owns_ancestor(&self) -> bool {
        self.owns_ancestor
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn tms(&self) -> &TileMatrixSet {
        &self.tms
    }

    pub fn storage_root(&self) -> &StorageRoot {
        &self.storage_root
    }

    pub fn storage_kind(&self) -> StorageKind {
        self.storage_root.kind()
    }

    /// Slab width, in tiles (shared by all levels).
    pub fn tiles_per_width(&self) -> u32 {
        self.tiles_per_width
    }

    /// Slab height, in tiles (shared by all levels).
    pub fn tiles_per_height(&self) -> u32 {
        self.tiles_per_height
    }

    pub fn own_masks(&self) -> bool {
        self.own_masks
    }

    pub fn level(&self, id: &str) -> Option<&Level> {
        self.levels.get(id)
    }

    /// Levels sorted from the top of the pyramid (coarsest) down.
    pub fn levels_top_down(&self) -> Vec<&Level> {
        let mut levels: Vec<&Level> = self.levels.values().collect();
        levels.sort_by_key(|l| l.order());
        levels
    }

    /// The root the pyramid's data tree hangs under:
    /// `{directory}/{name}` for FILE, `{container}/{name}` for object kinds.
    pub fn data_root(&self) -> String {
        format!("{}/{}", self.storage_root.location(), self.name)
    }

    /// Location of the JSON descriptor.
    pub fn descriptor_path(&self) -> String {
        format!("{}/{}.json", self.storage_root.location(), self.name)
    }

    /// Location of the slab list file.
    pub fn list_path(&self) -> String {
        format!("{}/{}.list", self.storage_root.location(), self.name)
    }

    // -------------------------------------------------------------------------
    // Level management
    // -------------------------------------------------------------------------

    /// Add a level to a WRITE-mode pyramid, deriving its storage from the
    /// pyramid root and inheriting data limits from the ancestor's same-id
    /// level when present.
    pub fn add_level(&mut self, id: &str, ancestor: Option<&Pyramid>) -> Result<(), PyramidError> {
        if self.mode == PyramidMode::Read {
            return Err(PyramidError::state(format!(
                "pyramid '{}': cannot add level to a READ pyramid",
                self.name
            )));
        }
        if self.levels.contains_key(id) {
            return Err(PyramidError::validation(format!(
                "pyramid '{}': level '{id}' already exists",
                self.name
            )));
        }

        let mut params = LevelParams {
            id: id.to_string(),
            tiles_per_width: self.tiles_per_width,
            tiles_per_height: self.tiles_per_height,
            own_masks: self.own_masks,
            ..Default::default()
        };
        match &self.storage_root {
            StorageRoot::File { path_depth, .. } => {
                params.path_depth = Some(*path_depth);
                params.data_root = Some(self.data_root());
            }
            StorageRoot::Object { kind, root } => {
                params.prefix = Some(self.name.clone());
                match kind {
                    StorageKind::S3 => params.bucket = Some(root.clone()),
                    StorageKind::Ceph => params.pool = Some(root.clone()),
                    StorageKind::Swift => params.container = Some(root.clone()),
                    StorageKind::File => unreachable!("object root never carries FILE"),
                }
            }
        }

        let mut level = Level::new(&params, &self.tms)?;
        if let Some(limits) = ancestor.and_then(|a| a.level(id)).and_then(|l| l.limits()) {
            level.update_limits(limits.row_min, limits.row_max, limits.col_min, limits.col_max);
        }
        self.levels.insert(id.to_string(), level);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Compatibility
    // -------------------------------------------------------------------------

    /// Compare storage, geometry and format with another pyramid to decide
    /// whether its slabs can be reused directly.
    pub fn check_compatibility(&self, other: &Pyramid) -> Compatibility {
        match (&self.storage_root, &other.storage_root) {
            (
                StorageRoot::File {
                    path_depth: own, ..
                },
                StorageRoot::File {
                    path_depth: theirs, ..
                },
            ) => {
                if own != theirs {
                    return Compatibility::Incompatible;
                }
            }
            (
                StorageRoot::Object {
                    kind: own_kind,
                    root: own_root,
                },
                StorageRoot::Object {
                    kind: their_kind,
                    root: their_root,
                },
            ) => {
                if own_kind != their_kind || own_root != their_root {
                    return Compatibility::Incompatible;
                }
            }
            _ => return Compatibility::Incompatible,
        }

        if self.tiles_per_width != other.tiles_per_width
            || self.tiles_per_height != other.tiles_per_height
            || self.tms.name() != other.tms.name()
        {
            return Compatibility::Incompatible;
        }
        if self.format != other.format {
            return Compatibility::Incompatible;
        }
        Compatibility::Identical
    }

    // -------------------------------------------------------------------------
    // Descriptor writing
    // -------------------------------------------------------------------------

    /// Export the descriptor, levels ordered top of the pyramid first.
    pub fn to_descriptor(&self) -> PyramidDescriptor {
        PyramidDescriptor {
            tile_matrix_set: self.tms.name().to_string(),
            format: self.format.clone(),
            levels: self
                .levels_top_down()
                .into_iter()
                .map(LevelDescriptor::from_level)
                .collect(),
        }
    }

    /// Serialize the descriptor and write it to `{root}/{name}.json`.
    pub async fn write_descriptor(&self, storage: &dyn ProxyStorage) -> Result<(), PyramidError> {
        let json = self.to_descriptor().to_json()?;
        storage
            .store(
                self.storage_kind(),
                &self.descriptor_path(),
                bytes::Bytes::from(json),
            )
            .await?;
        Ok(())
    }
}

/// Join a relative descriptor directory onto the descriptor's parent.
fn absolutize(dir: &str, parent: &str) -> String {
    if dir.starts_with('/') || parent.is_empty() {
        dir.to_string()
    } else {
        format!("{parent}/{dir}")
    }
}

// =============================================================================
// Tests
// =============================================================================
