//! The group tree: an arena of lazily loaded nodes.
//!
//! # Shape
//! Node 0 is a synthetic root whose children are the archive's top-level
//! groups.  Every other node corresponds to one or more on-disk `GRUP` chunks
//! that share a parent, a label and a kind; their byte spans are merged
//! into one node rather than overwriting each other.
//!
//! # Laziness
//! A node starts with only its spans.  [`GroupLoader::load`] parses those
//! spans once: records are decoded, nested groups are registered as
//! children *but not loaded*.  Loading an already-loaded node performs no
//! reads at all.
//!
//! # Handles
//! Nodes are addressed by [`GroupId`] and records by [`RecordHandle`].  Both
//! are plain indices into the arena; they never own anything and are only
//! meaningful for the archive that issued them.

use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Seek};

use log::{debug, warn};
use serde::Serialize;

use crate::archive::{CorruptRecordPolicy, Diagnostics, SkippedRecord};
use crate::cursor::ByteCursor;
use crate::error::{EsmError, Result};
use crate::header::{ChunkHeader, GroupKind, RecordHeader};
use crate::record::{decode_record, DecoderRegistry, Record, RecordId};
use crate::revision::FormatRevision;
use crate::tag::Tag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GroupId(pub(crate) usize);

impl GroupId {
    /// The synthetic parent of all top-level groups.
    pub const ROOT: GroupId = GroupId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Non-owning reference to a record held by a loaded node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RecordHandle {
    pub group: GroupId,
    pub index: usize,
}

/// A byte range of child chunks, excluding the group header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub offset: u64,
    pub len:    u64,
}

impl Span {
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }
}

#[derive(Debug)]
pub struct GroupNode {
    pub label:  u32,
    pub kind:   GroupKind,
    pub parent: Option<GroupId>,
    spans:      Vec<Span>,
    loaded:     bool,
    records:    Vec<Record>,
    /// Children in first-seen order.
    children:   Vec<GroupId>,
    by_label:   HashMap<u32, Vec<GroupId>>,
}

impl GroupNode {
    fn new(label: u32, kind: GroupKind, parent: Option<GroupId>) -> Self {
        Self {
            label,
            kind,
            parent,
            spans: Vec::new(),
            loaded: false,
            records: Vec::new(),
            children: Vec::new(),
            by_label: HashMap::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Total bytes announced by this node's spans.
    pub fn byte_len(&self) -> u64 {
        self.spans.iter().map(|s| s.len).sum()
    }

    /// Records in file order; empty until loaded.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn children(&self) -> &[GroupId] {
        &self.children
    }

    /// Every child carrying `label`, whatever its kind.  Labels of different
    /// kinds live in different namespaces, so this may return several nodes.
    pub fn children_labelled(&self, label: u32) -> &[GroupId] {
        self.by_label.get(&label).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The label read as a record type tag (meaningful for `ByRecordType`).
    pub fn label_tag(&self) -> Tag {
        Tag::from_label(self.label)
    }
}

// ── Arena ────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct GroupArena {
    nodes: Vec<GroupNode>,
    ids:   HashMap<RecordId, RecordHandle>,
}

impl Default for GroupArena {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupArena {
    pub fn new() -> Self {
        let mut root = GroupNode::new(0, GroupKind::ByRecordType, None);
        root.loaded = true;
        Self { nodes: vec![root], ids: HashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn get(&self, id: GroupId) -> Option<&GroupNode> {
        self.nodes.get(id.0)
    }

    pub fn node(&self, id: GroupId) -> Result<&GroupNode> {
        self.nodes.get(id.0).ok_or(EsmError::UnknownGroup(id))
    }

    fn node_mut(&mut self, id: GroupId) -> Result<&mut GroupNode> {
        self.nodes.get_mut(id.0).ok_or(EsmError::UnknownGroup(id))
    }

    pub fn record(&self, handle: RecordHandle) -> Option<&Record> {
        self.get(handle.group)?.records.get(handle.index)
    }

    /// First record registered under `id`, among loaded nodes.
    pub fn resolve(&self, id: &RecordId) -> Option<RecordHandle> {
        self.ids.get(id).copied()
    }

    /// Child of `parent` with this label and kind, if registered.
    pub fn child(&self, parent: GroupId, label: u32, kind: GroupKind) -> Option<GroupId> {
        let node = self.get(parent)?;
        node.children_labelled(label)
            .iter()
            .copied()
            .find(|c| self.nodes[c.0].kind == kind)
    }

    /// Register a span under `parent`, merging with an existing child of the
    /// same label and kind.
    pub fn add_span(&mut self, parent: GroupId, label: u32, kind: GroupKind, span: Span) -> Result<GroupId> {
        let id = self.ensure_child(parent, label, kind)?;
        let node = self.node_mut(id)?;
        node.spans.push(span);
        Ok(id)
    }

    /// A child that will never be read from disk; it counts as loaded.
    pub fn add_synthetic(&mut self, parent: GroupId, label: u32, kind: GroupKind) -> Result<GroupId> {
        let id = self.ensure_child(parent, label, kind)?;
        self.node_mut(id)?.loaded = true;
        Ok(id)
    }

    fn ensure_child(&mut self, parent: GroupId, label: u32, kind: GroupKind) -> Result<GroupId> {
        self.node(parent)?;
        if let Some(existing) = self.child(parent, label, kind) {
            return Ok(existing);
        }
        let id = GroupId(self.nodes.len());
        self.nodes.push(GroupNode::new(label, kind, Some(parent)));
        let p = &mut self.nodes[parent.0];
        p.children.push(id);
        p.by_label.entry(label).or_default().push(id);
        Ok(id)
    }

    pub fn push_record(&mut self, group: GroupId, record: Record) -> Result<RecordHandle> {
        let node = self.node_mut(group)?;
        let handle = RecordHandle { group, index: node.records.len() };
        let id = record.id.clone();
        node.records.push(record);
        let indexable = match &id {
            RecordId::Numeric(_)  => true,
            RecordId::Named(name) => !name.is_empty(),
        };
        if indexable {
            self.ids.entry(id).or_insert(handle);
        }
        Ok(handle)
    }

    fn mark_loaded(&mut self, id: GroupId) -> Result<()> {
        self.node_mut(id)?.loaded = true;
        Ok(())
    }

    /// Depth-first list of `id` and every registered descendant.
    pub fn descendants(&self, id: GroupId) -> Vec<GroupId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(node) = self.get(next) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }
}

// ── Loading ──────────────────────────────────────────────────────────────────

/// One chunk of a group, parsed but not yet committed to the arena.
enum Parsed {
    Group { label: u32, kind: GroupKind, span: Span },
    Record(Record),
}

/// Diagnostics as they stood before a load, so a failed load can take back
/// what it counted.
struct DiagnosticsMark {
    unknown_record_types: BTreeMap<Tag, u64>,
    unknown_fields:       u64,
    skipped_records:      usize,
}

impl DiagnosticsMark {
    fn of(d: &Diagnostics) -> Self {
        Self {
            unknown_record_types: d.unknown_record_types.clone(),
            unknown_fields:       d.unknown_fields,
            skipped_records:      d.skipped_records.len(),
        }
    }

    fn rewind(self, d: &mut Diagnostics) {
        d.unknown_record_types = self.unknown_record_types;
        d.unknown_fields = self.unknown_fields;
        d.skipped_records.truncate(self.skipped_records);
    }
}

/// Everything a load needs besides the arena itself.
pub struct GroupLoader<'a, R> {
    pub cursor:      &'a mut ByteCursor<R>,
    pub revision:    FormatRevision,
    pub registry:    &'a DecoderRegistry,
    pub policy:      CorruptRecordPolicy,
    pub diagnostics: &'a mut Diagnostics,
}

impl<'a, R: Read + Seek> GroupLoader<'a, R> {
    /// Parse every pending span of `id`.  Returns `false` when the node was
    /// already loaded, in which case nothing is read.
    ///
    /// Nothing reaches the arena until every span has parsed: a failed load
    /// leaves the node untouched and a later call starts over cleanly.
    pub fn load(&mut self, arena: &mut GroupArena, id: GroupId) -> Result<bool> {
        let node = arena.node(id)?;
        if node.loaded {
            return Ok(false);
        }
        let spans = node.spans.clone();
        debug!(
            "loading group {} ({:?}) from {} span(s), {} bytes",
            node.label_tag(),
            node.kind,
            spans.len(),
            node.byte_len()
        );

        let mark = DiagnosticsMark::of(self.diagnostics);
        let mut parsed = Vec::new();
        for span in spans {
            if let Err(e) = self.parse_span(span, &mut parsed) {
                mark.rewind(self.diagnostics);
                return Err(e);
            }
        }

        for chunk in parsed {
            match chunk {
                Parsed::Group { label, kind, span } => {
                    arena.add_span(id, label, kind, span)?;
                }
                Parsed::Record(record) => {
                    arena.push_record(id, record)?;
                }
            }
        }
        arena.mark_loaded(id)?;
        Ok(true)
    }

    /// Load `id` and then every group beneath it.
    pub fn load_recursive(&mut self, arena: &mut GroupArena, id: GroupId) -> Result<usize> {
        let mut loaded = 0;
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if self.load(arena, next)? {
                loaded += 1;
            }
            stack.extend(arena.node(next)?.children.iter().rev().copied());
        }
        Ok(loaded)
    }

    fn parse_span(&mut self, span: Span, out: &mut Vec<Parsed>) -> Result<()> {
        let end = span.end();
        let min_chunk = self.revision.record_header_size();
        self.cursor.seek(span.offset)?;

        while self.cursor.position() < end {
            let at = self.cursor.position();
            if end - at < min_chunk {
                debug!("ignoring {} bytes of trailing padding at offset {at}", end - at);
                break;
            }
            let header = ChunkHeader::read(&mut *self.cursor, self.revision)?;
            if header.end() > end {
                return Err(EsmError::RecordSizeMismatch {
                    offset:   at,
                    tag:      header.tag(),
                    declared: end - at,
                    consumed: header.end() - at,
                });
            }
            match header {
                ChunkHeader::Group(g) => {
                    let span = Span { offset: g.data_offset, len: g.data_size };
                    out.push(Parsed::Group { label: g.label, kind: g.kind, span });
                    self.cursor.seek(g.end())?;
                }
                ChunkHeader::Record(r) => {
                    if let Some(record) = self.decode(r)? {
                        out.push(Parsed::Record(record));
                    }
                }
            }
        }
        Ok(())
    }

    /// Decode one record, applying the corrupt-record policy.  The cursor
    /// always ends at the record's end when this returns `Ok`.
    pub fn decode(&mut self, header: RecordHeader) -> Result<Option<Record>> {
        let (tag, offset, end) = (header.tag, header.offset, header.end());
        match decode_record(&mut *self.cursor, header, self.revision, self.registry) {
            Ok(Some(decoded)) => {
                self.diagnostics.unknown_fields += decoded.unknown_fields as u64;
                Ok(Some(decoded.record))
            }
            Ok(None) => {
                warn!("skipping record of unknown type {tag} at offset {offset}");
                *self.diagnostics.unknown_record_types.entry(tag).or_insert(0) += 1;
                Ok(None)
            }
            Err(e) if e.is_record_level() && self.policy == CorruptRecordPolicy::Skip => {
                warn!("skipping corrupt record {tag} at offset {offset}: {e}");
                self.diagnostics.skipped_records.push(SkippedRecord {
                    offset: e.offset().unwrap_or(offset),
                    tag,
                    reason: e.to_string(),
                });
                self.cursor.seek(end)?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(offset: u64, len: u64) -> Span {
        Span { offset, len }
    }

    #[test]
    fn same_label_and_kind_merge() {
        let mut a = GroupArena::new();
        let x = a.add_span(GroupId::ROOT, 7, GroupKind::ByRecordType, span(0, 10)).unwrap();
        let y = a.add_span(GroupId::ROOT, 7, GroupKind::ByRecordType, span(50, 5)).unwrap();
        assert_eq!(x, y);
        assert_eq!(a.node(x).unwrap().spans(), [span(0, 10), span(50, 5)]);
        assert_eq!(a.node(x).unwrap().byte_len(), 15);
    }

    #[test]
    fn same_label_different_kind_stay_apart() {
        let mut a = GroupArena::new();
        let block = a.add_span(GroupId::ROOT, 9, GroupKind::ExteriorBlock, span(0, 1)).unwrap();
        let cell = a.add_span(GroupId::ROOT, 9, GroupKind::Cell, span(5, 1)).unwrap();
        assert_ne!(block, cell);
        assert_eq!(a.node(GroupId::ROOT).unwrap().children_labelled(9), [block, cell]);
        assert_eq!(a.child(GroupId::ROOT, 9, GroupKind::Cell), Some(cell));
    }

    #[test]
    fn unknown_group_handle() {
        let a = GroupArena::new();
        assert!(matches!(a.node(GroupId(42)), Err(EsmError::UnknownGroup(GroupId(42)))));
    }

    #[test]
    fn descendants_are_depth_first() {
        let mut a = GroupArena::new();
        let top = a.add_synthetic(GroupId::ROOT, 1, GroupKind::ByRecordType).unwrap();
        let c1 = a.add_synthetic(top, 2, GroupKind::World).unwrap();
        let g1 = a.add_synthetic(c1, 3, GroupKind::ExteriorBlock).unwrap();
        let c2 = a.add_synthetic(top, 4, GroupKind::World).unwrap();
        assert_eq!(a.descendants(top), [top, c1, g1, c2]);
    }
}
