//! High-level [`Archive`] API, the primary embedding surface.
//!
//! ```no_run
//! use masterfile::archive::{Archive, ReadOptions};
//! use masterfile::tag;
//!
//! let ar = Archive::open("Oblivion.esm", ReadOptions::for_game("Oblivion")?)?;
//! for (id, record) in ar.records_of(tag::GLOB)? {
//!     println!("{id} {:?}", record.editor_id());
//! }
//! if let Some(cell) = ar.ensure_cell(0, 0, 0)? {
//!     println!("{:?}", ar.view().record(cell.cell).map(|r| r.editor_id()));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Locking
//! All mutable state (stream position, loaded flags, memo sets, indices)
//! sits behind one `RwLock`.  Anything that may read from the stream takes
//! the write lock, so loads on one archive serialise; [`Archive::view`]
//! hands out read guards that may coexist with each other.

mod options;

pub use options::{CorruptRecordPolicy, ReadOptions};

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use std::sync::Arc;

use log::{debug, info};
use parking_lot::{RwLock, RwLockReadGuard};
use serde::Serialize;

use crate::cursor::ByteCursor;
use crate::error::{EsmError, Result};
use crate::group::{GroupArena, GroupId, GroupLoader, GroupNode, RecordHandle, Span};
use crate::header::{ChunkHeader, GroupKind};
use crate::index::CrossReferences;
use crate::record::{decode_record, DecoderRegistry, Record, RecordId};
use crate::revision::FormatRevision;
use crate::spatial::{CellHandle, SpatialIndex};
use crate::tag::{self, Tag};

// ── Diagnostics ───────────────────────────────────────────────────────────────

/// A record dropped under [`CorruptRecordPolicy::Skip`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRecord {
    pub offset: u64,
    pub tag:    Tag,
    pub reason: String,
}

/// Everything the reader tolerated rather than failed on.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    pub unknown_record_types: BTreeMap<Tag, u64>,
    pub unknown_fields:       u64,
    pub skipped_records:      Vec<SkippedRecord>,
    /// Primitive reads issued against the stream so far.
    pub read_calls:           u64,
}

// ── Archive ───────────────────────────────────────────────────────────────────

struct ArchiveState<R> {
    cursor:      ByteCursor<R>,
    arena:       GroupArena,
    spatial:     SpatialIndex,
    diagnostics: Diagnostics,
    xrefs:       Option<Arc<CrossReferences>>,
}

impl<R> ArchiveState<R> {
    fn split<'a>(
        &'a mut self,
        revision: FormatRevision,
        registry: &'a DecoderRegistry,
        policy:   CorruptRecordPolicy,
    ) -> (&'a mut GroupArena, &'a mut SpatialIndex, GroupLoader<'a, R>) {
        let loader = GroupLoader {
            cursor: &mut self.cursor,
            revision,
            registry,
            policy,
            diagnostics: &mut self.diagnostics,
        };
        (&mut self.arena, &mut self.spatial, loader)
    }
}

/// An opened master file.
pub struct Archive<R = BufReader<File>> {
    options:  ReadOptions,
    revision: FormatRevision,
    registry: Arc<DecoderRegistry>,
    header:   Record,
    state:    RwLock<ArchiveState<R>>,
}

impl Archive<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>, options: ReadOptions) -> Result<Self> {
        let path = path.as_ref();
        debug!("opening {}", path.display());
        Self::from_reader(BufReader::new(File::open(path)?), options)
    }
}

impl<R: Read + Seek> Archive<R> {
    pub fn from_reader(reader: R, options: ReadOptions) -> Result<Self> {
        Self::with_registry(reader, options, Arc::new(DecoderRegistry::standard()))
    }

    /// Open with a caller-built registry.  The registry belongs to this
    /// archive; other archives keep their own.
    pub fn with_registry(reader: R, options: ReadOptions, registry: Arc<DecoderRegistry>) -> Result<Self> {
        let revision = options.revision()?;
        let mut state = ArchiveState {
            cursor:      ByteCursor::new(reader)?,
            arena:       GroupArena::new(),
            spatial:     SpatialIndex::default(),
            diagnostics: Diagnostics::default(),
            xrefs:       None,
        };

        let header = {
            let (arena, spatial, mut loader) = state.split(revision, &registry, options.on_corrupt_record);
            let header = read_structure(&mut loader, arena, &options)?;
            if revision == FormatRevision::Legacy {
                let cells = arena.child(GroupId::ROOT, tag::CELL.as_label(), GroupKind::ByRecordType);
                let lands = arena.child(GroupId::ROOT, tag::LAND.as_label(), GroupKind::ByRecordType);
                spatial.index_legacy(arena, cells, lands);
            }
            header
        };

        info!(
            "opened {revision} archive: {} bytes, {} top-level groups, root {}",
            state.cursor.len(),
            state.arena.node(GroupId::ROOT)?.children().len(),
            header.tag()
        );

        Ok(Self { options, revision, registry, header, state: RwLock::new(state) })
    }

    /// The root (file header) record, decoded at open.
    pub fn header(&self) -> &Record {
        &self.header
    }

    pub fn revision(&self) -> FormatRevision {
        self.revision
    }

    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    /// Top-level groups as `(record type, group)` in file order.
    pub fn top_groups(&self) -> Vec<(Tag, GroupId)> {
        let state = self.state.read();
        let Some(root) = state.arena.get(GroupId::ROOT) else { return Vec::new() };
        root.children()
            .iter()
            .filter_map(|&id| state.arena.get(id).map(|n| (n.label_tag(), id)))
            .collect()
    }

    pub fn top_group(&self, t: Tag) -> Option<GroupId> {
        self.state.read().arena.child(GroupId::ROOT, t.as_label(), GroupKind::ByRecordType)
    }

    /// Parse one group's own chunks.  `false` means it was already loaded
    /// and nothing was read.
    pub fn load(&self, group: GroupId) -> Result<bool> {
        let mut state = self.state.write();
        let (arena, _, mut loader) = state.split(self.revision, &self.registry, self.options.on_corrupt_record);
        loader.load(arena, group)
    }

    /// Load a group and all of its descendants, returning how many groups
    /// were newly parsed.
    pub fn load_recursive(&self, group: GroupId) -> Result<usize> {
        let mut state = self.state.write();
        let (arena, _, mut loader) = state.split(self.revision, &self.registry, self.options.on_corrupt_record);
        loader.load_recursive(arena, group)
    }

    /// Every record filed under type `t`, loading its top-level group fully.
    /// With a label remap in effect, `t` is the type after remapping: records
    /// keep their on-disk tag but are matched through the same table.
    pub fn records_of(&self, t: Tag) -> Result<Vec<(RecordId, Record)>> {
        let Some(top) = self.top_group(t) else { return Ok(Vec::new()) };
        self.load_recursive(top)?;
        let wanted = t.as_label();
        let state = self.state.read();
        let mut out = Vec::new();
        for id in state.arena.descendants(top) {
            let node = state.arena.node(id)?;
            out.extend(
                node.records()
                    .iter()
                    .filter(|r| self.options.remap_label(r.tag().as_label()) == wanted)
                    .map(|r| (r.id.clone(), r.clone())),
            );
        }
        Ok(out)
    }

    /// Read access to everything loaded so far.  Holding a view blocks
    /// loads on this archive until it is dropped.
    pub fn view(&self) -> ArchiveView<'_, R> {
        ArchiveView { state: self.state.read() }
    }

    pub fn resolve(&self, id: &RecordId) -> Option<RecordHandle> {
        self.state.read().arena.resolve(id)
    }

    /// A clone of the record behind `handle`.
    pub fn record(&self, handle: RecordHandle) -> Option<Record> {
        self.state.read().arena.record(handle).cloned()
    }

    /// The child group of the world with this form id.
    pub fn world_group(&self, form_id: u32) -> Result<Option<GroupId>> {
        let Some(top) = self.top_group(tag::WRLD) else { return Ok(None) };
        self.load(top)?;
        Ok(self.state.read().arena.child(top, form_id, GroupKind::World))
    }

    fn primary_world(&self) -> Result<Option<GroupId>> {
        let Some(top) = self.top_group(tag::WRLD) else { return Ok(None) };
        self.load(top)?;
        let state = self.state.read();
        let node = state.arena.node(top)?;
        Ok(node
            .children()
            .iter()
            .copied()
            .find(|&c| state.arena.get(c).is_some_and(|n| n.kind == GroupKind::World)))
    }

    /// Cell at `(x, y)` on `layer` of the first worldspace in the file.
    pub fn ensure_cell(&self, x: i16, y: i16, layer: i8) -> Result<Option<CellHandle>> {
        if self.revision == FormatRevision::Legacy {
            return Ok(self.state.read().spatial.lookup(GroupId::ROOT, x, y, layer));
        }
        match self.primary_world()? {
            Some(world) => self.ensure_cell_in(world, x, y, layer),
            None => Ok(None),
        }
    }

    /// Cell at `(x, y)` on `layer` below a specific world group.
    pub fn ensure_cell_in(&self, world: GroupId, x: i16, y: i16, layer: i8) -> Result<Option<CellHandle>> {
        let mut state = self.state.write();
        let (arena, spatial, mut loader) = state.split(self.revision, &self.registry, self.options.on_corrupt_record);
        if self.revision == FormatRevision::Legacy {
            return Ok(spatial.lookup(world, x, y, layer));
        }
        spatial.ensure_cell(arena, &mut loader, world, x, y, layer)
    }

    /// The terrain record of the cell at `(x, y)`.
    pub fn land_at(&self, x: i16, y: i16, layer: i8) -> Result<Option<RecordHandle>> {
        Ok(self.ensure_cell(x, y, layer)?.and_then(|c| c.land))
    }

    pub fn interior_cell(&self, name: &str) -> Result<Option<CellHandle>> {
        let cell_top = self.top_group(tag::CELL);
        let mut state = self.state.write();
        let (arena, spatial, mut loader) = state.split(self.revision, &self.registry, self.options.on_corrupt_record);
        spatial.interior_cell(arena, &mut loader, cell_top, name)
    }

    /// Build (once) and return the cross-reference tables.
    pub fn cross_references(&self) -> Result<Arc<CrossReferences>> {
        if let Some(x) = self.state.read().xrefs.clone() {
            return Ok(x);
        }
        let mut state = self.state.write();
        if let Some(x) = state.xrefs.clone() {
            return Ok(x);
        }
        let (arena, _, mut loader) = state.split(self.revision, &self.registry, self.options.on_corrupt_record);
        let built = Arc::new(CrossReferences::build(arena, &mut loader)?);
        state.xrefs = Some(Arc::clone(&built));
        Ok(built)
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let state = self.state.read();
        Diagnostics { read_calls: state.cursor.read_calls(), ..state.diagnostics.clone() }
    }

    /// Primitive reads issued so far.
    pub fn read_calls(&self) -> u64 {
        self.state.read().cursor.read_calls()
    }
}

impl<R> std::fmt::Debug for Archive<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("revision", &self.revision)
            .field("root", &self.header.tag())
            .finish_non_exhaustive()
    }
}

// ── View ──────────────────────────────────────────────────────────────────────

/// Shared read access to an archive's loaded state.
pub struct ArchiveView<'a, R> {
    state: RwLockReadGuard<'a, ArchiveState<R>>,
}

impl<'a, R> ArchiveView<'a, R> {
    pub fn arena(&self) -> &GroupArena {
        &self.state.arena
    }

    pub fn node(&self, id: GroupId) -> Option<&GroupNode> {
        self.state.arena.get(id)
    }

    pub fn record(&self, handle: RecordHandle) -> Option<&Record> {
        self.state.arena.record(handle)
    }

    pub fn resolve(&self, id: &RecordId) -> Option<&Record> {
        self.state.arena.resolve(id).and_then(|h| self.state.arena.record(h))
    }

    /// Loaded records of group `id`, empty when not loaded.
    pub fn records(&self, id: GroupId) -> &[Record] {
        self.state.arena.get(id).map(GroupNode::records).unwrap_or(&[])
    }
}

// ── Structure read ───────────────────────────────────────────────────────────

/// Check and decode the root record, then lay out the top-level tree.
fn read_structure<R: Read + Seek>(
    loader:  &mut GroupLoader<'_, R>,
    arena:   &mut GroupArena,
    options: &ReadOptions,
) -> Result<Record> {
    let revision = loader.revision;
    let expected = revision.root_tag();
    let found = loader.cursor.peek_tag()?;
    if found != expected {
        if options.strict_root && !found.is_known() {
            return Err(EsmError::corrupt(0, found, "root tag is not a known record type"));
        }
        return Err(EsmError::UnexpectedRootTag { offset: 0, expected, found });
    }

    let ChunkHeader::Record(root) = ChunkHeader::read(&mut *loader.cursor, revision)? else {
        return Err(EsmError::UnexpectedRootTag { offset: 0, expected, found: tag::GRUP });
    };
    let header = decode_record(&mut *loader.cursor, root, revision, loader.registry)?
        .ok_or_else(|| EsmError::corrupt(0, expected, "no decoder registered for the root record"))?
        .record;

    match revision {
        FormatRevision::Legacy => read_flat(loader, arena, options)?,
        FormatRevision::Standard | FormatRevision::Extended => read_top_groups(loader, arena, options)?,
    }
    Ok(header)
}

/// Legacy: decode every record now and bucket them by type.
fn read_flat<R: Read + Seek>(
    loader:  &mut GroupLoader<'_, R>,
    arena:   &mut GroupArena,
    options: &ReadOptions,
) -> Result<()> {
    let min_chunk = loader.revision.record_header_size();
    while !loader.cursor.at_end() {
        if loader.cursor.remaining() < min_chunk {
            debug!("ignoring {} trailing bytes", loader.cursor.remaining());
            break;
        }
        // Legacy has no group chunks: every header reads as a record.
        let at = loader.cursor.position();
        let ChunkHeader::Record(h) = ChunkHeader::read(&mut *loader.cursor, loader.revision)? else {
            return Err(EsmError::corrupt(at, tag::GRUP, "group chunk in a legacy file"));
        };
        if let Some(record) = loader.decode(h)? {
            let label = options.remap_label(record.tag().as_label());
            let bucket = arena.add_synthetic(GroupId::ROOT, label, GroupKind::ByRecordType)?;
            arena.push_record(bucket, record)?;
        }
    }
    Ok(())
}

/// Standard/Extended: register every top-level group without entering it.
fn read_top_groups<R: Read + Seek>(
    loader:  &mut GroupLoader<'_, R>,
    arena:   &mut GroupArena,
    options: &ReadOptions,
) -> Result<()> {
    let min_chunk = loader.revision.record_header_size();
    while !loader.cursor.at_end() {
        let at = loader.cursor.position();
        if loader.cursor.remaining() < min_chunk {
            debug!("ignoring {} trailing bytes at offset {at}", loader.cursor.remaining());
            break;
        }
        let group = match ChunkHeader::read(&mut *loader.cursor, loader.revision)? {
            ChunkHeader::Group(g) => g,
            ChunkHeader::Record(r) => return Err(EsmError::UnexpectedGroupTag { offset: at, found: r.tag }),
        };
        if group.end() > loader.cursor.len() {
            return Err(EsmError::corrupt(
                at,
                tag::GRUP,
                format!("group ends at {} past the end of the file ({})", group.end(), loader.cursor.len()),
            ));
        }
        let label = options.remap_label(group.label);
        let span = Span { offset: group.data_offset, len: group.data_size };
        arena.add_span(GroupId::ROOT, label, group.kind, span)?;
        loader.cursor.seek(group.end())?;
    }
    Ok(())
}
