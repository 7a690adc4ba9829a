//! The slab list index: the persisted inventory of slabs physically present
//! in a pyramid, cached in memory and flushed back with root-table
//! compaction.
//!
//! # On-disk format
//!
//! Line-oriented text:
//!
//! ```text
//! 0=/data/pyramids/PYR          <- root table, zero or more lines
//! 1=/data/pyramids/ANCESTOR
//! #                             <- single separator line
//! 0/DATA/12/00/08/5C.tif        <- records: {rootIndex}/{relativeSlabPath}
//! 1/DATA/11/00/00/21.tif
//! ```
//!
//! Roots are storage-location strings referenced by integer index so the
//! cache stays memory-bounded however many slabs share a root. Two record
//! layouts exist for object storage: the current `{kind}_{level}_{col}_{row}`
//! and a legacy `{pyramidName}_{kind}_{level}_{col}_{row}` whose pyramid name
//! (which may itself contain `_`) is folded back into the root on load.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::{IoError, PyramidError};
use crate::storage::{ProxyStorage, StorageKind};

use super::index::{Pyramid, PyramidMode};
use super::level::SlabKind;

// =============================================================================
// Records and keys
// =============================================================================

/// Identity of one slab in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlabKey {
    pub level: String,
    pub col: u64,
    pub row: u64,
    pub is_mask: bool,
}

impl SlabKey {
    pub fn new(kind: SlabKind, level: &str, col: u64, row: u64) -> Self {
        Self {
            level: level.to_string(),
            col,
            row,
            is_mask: kind == SlabKind::Mask,
        }
    }

    pub fn kind(&self) -> SlabKind {
        if self.is_mask {
            SlabKind::Mask
        } else {
            SlabKind::Data
        }
    }
}

/// Where one slab physically lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlabRecord {
    /// Storage-location root the slab hangs under (deduplicated on disk)
    pub root: String,
    /// Backend-relative slab key
    pub name: String,
    /// Fully-qualified path as last read from storage
    pub origin: String,
}

// =============================================================================
// RootTable
// =============================================================================

/// Interned table of root location strings.
///
/// `insert_or_get` hands out dense indices in first-seen order, which become
/// the integer references of the list file's header block.
#[derive(Debug, Default)]
pub struct RootTable {
    roots: Vec<String>,
    index: HashMap<String, usize>,
}

impl RootTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a root, returning its index.
    pub fn insert_or_get(&mut self, root: &str) -> usize {
        if let Some(&index) = self.index.get(root) {
            return index;
        }
        let index = self.roots.len();
        self.roots.push(root.to_string());
        self.index.insert(root.to_string(), index);
        index
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.roots.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Roots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.roots.iter().enumerate().map(|(i, r)| (i, r.as_str()))
    }
}

// =============================================================================
// SlabList
// =============================================================================

/// In-memory cache of every slab physically present in a pyramid.
#[derive(Debug, Default)]
pub struct SlabList {
    records: HashMap<SlabKey, SlabRecord>,
    loaded: bool,
    dirty: bool,
}

impl SlabList {
    /// Whether the list has been loaded from storage.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Whether the cache holds edits not yet flushed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of cached records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn get(&self, key: &SlabKey) -> Option<&SlabRecord> {
        self.records.get(key)
    }
}

// =============================================================================
// List file parsing / serialization helpers
// =============================================================================

/// Separator between the root table and the records.
const SEPARATOR: &str = "#";

fn parse_root_line(line: &str) -> Result<(usize, String), PyramidError> {
    let (index, root) = line
        .split_once('=')
        .ok_or_else(|| PyramidError::format(format!("malformed root line '{line}'")))?;
    let index = index
        .parse::<usize>()
        .map_err(|_| PyramidError::format(format!("non-numeric root index in '{line}'")))?;
    if root.is_empty() {
        return Err(PyramidError::format(format!("empty root in line '{line}'")));
    }
    Ok((index, root.to_string()))
}

fn parse_record_line(line: &str) -> Result<(usize, &str), PyramidError> {
    let (index, target) = line
        .split_once('/')
        .ok_or_else(|| PyramidError::format(format!("malformed record line '{line}'")))?;
    let index = index
        .parse::<usize>()
        .map_err(|_| PyramidError::format(format!("non-numeric root index in '{line}'")))?;
    if target.is_empty() {
        return Err(PyramidError::format(format!("empty target in line '{line}'")));
    }
    Ok((index, target))
}

fn parse_decimal(token: &str, line: &str) -> Result<u64, PyramidError> {
    token
        .parse::<u64>()
        .map_err(|_| PyramidError::format(format!("non-numeric coordinate '{token}' in '{line}'")))
}

// =============================================================================
// Pyramid list operations
// =============================================================================

impl Pyramid {
    /// Load the slab list from storage into the in-memory cache.
    ///
    /// Refused while unflushed edits exist (they would be silently
    /// discarded); a no-op when already loaded. For a WRITE pyramid whose
    /// list does not exist yet, loading succeeds with an empty cache.
    pub async fn load_list(&mut self, storage: &dyn ProxyStorage) -> Result<(), PyramidError> {
        if self.list.dirty {
            return Err(PyramidError::state(format!(
                "pyramid '{}': list has unflushed changes, flush before reloading",
                self.name()
            )));
        }
        if self.list.loaded {
            return Ok(());
        }

        let bytes = match storage.fetch(self.storage_kind(), &self.list_path()).await {
            Ok(bytes) => bytes,
            Err(IoError::NotFound(_)) if self.mode() == PyramidMode::Write => {
                // Nothing persisted yet: start from an empty cache
                debug!(pyramid = self.name(), "no list file yet, starting empty");
                self.list.loaded = true;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let content = std::str::from_utf8(&bytes).map_err(|_| {
            PyramidError::format(format!(
                "list file '{}' is not valid UTF-8",
                self.list_path()
            ))
        })?;

        self.parse_list(content)?;
        self.list.loaded = true;
        debug!(
            pyramid = self.name(),
            records = self.list.len(),
            "slab list loaded"
        );
        Ok(())
    }

    /// Parse list content into the cache. Split out of [`Pyramid::load_list`]
    /// so the wire format is testable without I/O.
    pub(super) fn parse_list(&mut self, content: &str) -> Result<(), PyramidError> {
        let mut roots: HashMap<usize, String> = HashMap::new();
        let mut in_header = true;

        for line in content.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            if in_header {
                if line == SEPARATOR {
                    in_header = false;
                    continue;
                }
                let (index, root) = parse_root_line(line)?;
                roots.insert(index, root);
                continue;
            }

            let (index, target) = parse_record_line(line)?;
            let root = roots.get(&index).ok_or_else(|| {
                PyramidError::format(format!("record '{line}' references unknown root {index}"))
            })?;

            let (key, record) = if self.storage_kind() == StorageKind::File {
                self.parse_file_record(root, target, line)?
            } else {
                Self::parse_object_record(root, target, line)?
            };

            if !self.levels.contains_key(&key.level) {
                return Err(PyramidError::format(format!(
                    "record '{line}' references unknown level '{}'",
                    key.level
                )));
            }
            if self.list.records.insert(key.clone(), record).is_some() {
                warn!(
                    pyramid = self.name(),
                    level = %key.level,
                    kind = %key.kind(),
                    col = key.col,
                    row = key.row,
                    "duplicate slab entry in list, keeping the last one"
                );
            }
        }

        Ok(())
    }

    /// `{kind}/{level}/{b36...}.tif` records of file-backed pyramids.
    fn parse_file_record(
        &self,
        root: &str,
        target: &str,
        line: &str,
    ) -> Result<(SlabKey, SlabRecord), PyramidError> {
        let mut parts = target.splitn(3, '/');
        let kind_token = parts.next().unwrap_or_default();
        let level_id = parts.next().unwrap_or_default();
        let rest = parts.next().unwrap_or_default();
        if kind_token.is_empty() || level_id.is_empty() || rest.is_empty() {
            return Err(PyramidError::format(format!(
                "malformed file record '{line}'"
            )));
        }

        let kind = SlabKind::from_token(kind_token)
            .ok_or_else(|| PyramidError::format(format!("unknown slab kind in '{line}'")))?;
        let level = self.levels.get(level_id).ok_or_else(|| {
            PyramidError::format(format!("record '{line}' references unknown level '{level_id}'"))
        })?;
        let (col, row) = level.slab_coordinates(rest)?;

        Ok((
            SlabKey::new(kind, level_id, col, row),
            SlabRecord {
                root: root.to_string(),
                name: target.to_string(),
                origin: format!("{root}/{target}"),
            },
        ))
    }

    /// `{kind}_{level}_{col}_{row}` records of object-backed pyramids, plus
    /// the legacy `{pyramidName}_{kind}_{level}_{col}_{row}` layout whose
    /// pyramid name (possibly containing `_`) is folded back into the root.
    fn parse_object_record(
        root: &str,
        target: &str,
        line: &str,
    ) -> Result<(SlabKey, SlabRecord), PyramidError> {
        let tokens: Vec<&str> = target.split('_').collect();
        if tokens.len() < 4 {
            return Err(PyramidError::format(format!(
                "malformed object record '{line}'"
            )));
        }

        let (kind, level_id, col, row, root, target) = if tokens.len() == 4 {
            let kind = SlabKind::from_token(tokens[0])
                .ok_or_else(|| PyramidError::format(format!("unknown slab kind in '{line}'")))?;
            let col = parse_decimal(tokens[2], line)?;
            let row = parse_decimal(tokens[3], line)?;
            (kind, tokens[1].to_string(), col, row, root.to_string(), target.to_string())
        } else {
            let row = parse_decimal(tokens[tokens.len() - 1], line)?;
            let col = parse_decimal(tokens[tokens.len() - 2], line)?;
            let level_id = tokens[tokens.len() - 3].to_string();
            let kind = SlabKind::from_token(tokens[tokens.len() - 4])
                .ok_or_else(|| PyramidError::format(format!("unknown slab kind in '{line}'")))?;
            let legacy_name = tokens[..tokens.len() - 4].join("_");
            let root = format!("{root}/{legacy_name}");
            let target = format!("{kind}_{level_id}_{col}_{row}");
            (kind, level_id, col, row, root, target)
        };

        Ok((
            SlabKey::new(kind, &level_id, col, row),
            SlabRecord {
                origin: format!("{root}/{target}"),
                root,
                name: target,
            },
        ))
    }

    /// Look up a slab in the cache; pure query, never touches state.
    ///
    /// Returns the `(root, name)` pair when present.
    pub fn contain_slab(
        &self,
        kind: SlabKind,
        level: &str,
        col: u64,
        row: u64,
    ) -> Option<(&str, &str)> {
        self.list
            .get(&SlabKey::new(kind, level, col, row))
            .map(|r| (r.root.as_str(), r.name.as_str()))
    }

    /// Claim a slab for this pyramid: insert or rewrite the record so its
    /// root is the pyramid's own data root, mark the cache dirty, and fold
    /// the slab's tile rectangle into the owning level's limits.
    pub fn modify_slab(
        &mut self,
        kind: SlabKind,
        level_id: &str,
        col: u64,
        row: u64,
    ) -> Result<(), PyramidError> {
        if !self.list.loaded {
            return Err(PyramidError::state(format!(
                "pyramid '{}': list not loaded",
                self.name()
            )));
        }
        let root = self.data_root();

        let level = self.levels.get_mut(level_id).ok_or_else(|| {
            PyramidError::validation(format!("unknown level '{level_id}'"))
        })?;
        let name = level.get_slab_path(kind, col, row, false).ok_or_else(|| {
            PyramidError::validation(format!("level '{level_id}' does not own masks"))
        })?;
        level.update_limits_from_slab(col, row);

        self.list.records.insert(
            SlabKey::new(kind, level_id, col, row),
            SlabRecord {
                origin: format!("{root}/{name}"),
                root,
                name,
            },
        );
        self.list.dirty = true;
        Ok(())
    }

    /// Remove a slab from the cache; a no-op when absent.
    ///
    /// Does not mark the cache dirty: a delete with no following mutation is
    /// lost on flush, and callers wanting it persisted must flush through
    /// another mutating call.
    pub fn delete_slab(&mut self, kind: SlabKind, level: &str, col: u64, row: u64) -> bool {
        self.list
            .records
            .remove(&SlabKey::new(kind, level, col, row))
            .is_some()
    }

    /// Serialize the cache and write it back to the pyramid's list path.
    ///
    /// Only DATA records are persisted; MASK entries live in the cache but
    /// never reach the flushed list. The root table is rebuilt with the
    /// pyramid's own data root at index 0 and the remaining roots in
    /// first-seen order.
    pub async fn flush_list(&mut self, storage: &dyn ProxyStorage) -> Result<(), PyramidError> {
        if !self.list.loaded {
            return Err(PyramidError::state(format!(
                "pyramid '{}': list not loaded",
                self.name()
            )));
        }
        if !self.list.dirty {
            return Ok(());
        }

        let content = self.serialize_list();
        storage
            .store(
                self.storage_kind(),
                &self.list_path(),
                Bytes::from(content),
            )
            .await?;
        self.list.dirty = false;

        debug!(pyramid = self.name(), path = %self.list_path(), "slab list flushed");
        Ok(())
    }

    /// Build the list file content (header + separator + records).
    pub(super) fn serialize_list(&self) -> String {
        let mut table = RootTable::new();
        table.insert_or_get(&self.data_root());

        // Stable output: records sorted by key
        let mut data_records: Vec<(&SlabKey, &SlabRecord)> = self
            .list
            .records
            .iter()
            .filter(|(key, _)| key.kind() == SlabKind::Data)
            .collect();
        data_records.sort_by(|a, b| a.0.cmp(b.0));

        let mut body = String::new();
        for (_, record) in data_records {
            let index = table.insert_or_get(&record.root);
            body.push_str(&format!("{index}/{}\n", record.name));
        }

        let mut content = String::new();
        for (index, root) in table.iter() {
            content.push_str(&format!("{index}={root}\n"));
        }
        content.push_str(SEPARATOR);
        content.push('\n');
        content.push_str(&body);
        content
    }

    /// Shared view of the list cache state.
    pub fn list(&self) -> &SlabList {
        &self.list
    }
}

// =============================================================================
// Tests
// =============================================================================
