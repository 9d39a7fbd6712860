//! Cross-reference tables built in one post-pass over loaded groups.
//!
//! Every value is a [`RecordHandle`] or [`GroupId`] into the archive's arena:
//! the tables own no records and are dropped with the archive.  Decoded
//! fields keep storing [`RecordId`](crate::record::RecordId)s; consumers
//! resolve them here (or through `Archive::resolve`) when they need to.

use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Seek};

use log::debug;
use serde::Serialize;

use crate::error::Result;
use crate::group::{GroupArena, GroupId, GroupLoader, RecordHandle};
use crate::header::GroupKind;
use crate::record::RecordId;
use crate::revision::FormatRevision;
use crate::tag::{self, Tag};

/// A worldspace record and the group holding its blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorldEntry {
    pub record:   RecordHandle,
    pub children: Option<GroupId>,
}

#[derive(Debug, Clone, Default)]
pub struct CrossReferences {
    /// Form id → world (Standard/Extended).
    pub worlds:                 BTreeMap<u32, WorldEntry>,
    pub land_textures_by_name:  HashMap<String, RecordHandle>,

    // Legacy tables.
    pub records_by_name:        HashMap<String, RecordHandle>,
    pub land_textures_by_index: HashMap<i64, RecordHandle>,
    pub lands_by_grid:          HashMap<(i32, i32), RecordHandle>,
    pub cells_by_grid:          HashMap<(i32, i32), RecordHandle>,
    pub interiors_by_name:      HashMap<String, RecordHandle>,
}

impl CrossReferences {
    pub fn world(&self, form_id: u32) -> Option<&WorldEntry> {
        self.worlds.get(&form_id)
    }

    /// Land texture referred to by a `LAND` layer.  Legacy layers carry the
    /// texture's `INTV` index, later revisions its form id.
    pub fn land_texture(&self, arena: &GroupArena, id: &RecordId) -> Option<RecordHandle> {
        match id {
            RecordId::Named(name) => self.land_textures_by_name.get(name).copied(),
            RecordId::Numeric(n) => self
                .land_textures_by_index
                .get(&(*n as i64))
                .copied()
                .or_else(|| arena.resolve(id)),
        }
    }

    /// Build the tables, loading whatever groups they need.
    pub fn build<R: Read + Seek>(
        arena:  &mut GroupArena,
        loader: &mut GroupLoader<'_, R>,
    ) -> Result<Self> {
        let mut out = CrossReferences::default();
        match loader.revision {
            FormatRevision::Legacy => out.index_legacy(arena),
            FormatRevision::Standard | FormatRevision::Extended => out.index_grouped(arena, loader)?,
        }
        debug!(
            "cross references: {} worlds, {} named land textures, {} named records",
            out.worlds.len(),
            out.land_textures_by_name.len() + out.land_textures_by_index.len(),
            out.records_by_name.len()
        );
        Ok(out)
    }

    fn index_grouped<R: Read + Seek>(
        &mut self,
        arena:  &mut GroupArena,
        loader: &mut GroupLoader<'_, R>,
    ) -> Result<()> {
        if let Some(top) = top_group(arena, tag::WRLD) {
            loader.load(arena, top)?;
            let node = arena.node(top)?;
            for (index, r) in node.records().iter().enumerate() {
                if r.tag() != tag::WRLD {
                    continue;
                }
                let form_id = r.header.form_id;
                let children = arena.child(top, form_id, GroupKind::World);
                self.worlds
                    .entry(form_id)
                    .or_insert(WorldEntry { record: RecordHandle { group: top, index }, children });
            }
        }

        if let Some(top) = top_group(arena, tag::LTEX) {
            loader.load_recursive(arena, top)?;
            for id in arena.descendants(top) {
                let node = arena.node(id)?;
                for (index, r) in node.records().iter().enumerate() {
                    if let Some(name) = r.as_land_texture().and_then(|t| t.editor_id.as_ref()) {
                        self.land_textures_by_name
                            .entry(name.clone())
                            .or_insert(RecordHandle { group: id, index });
                    }
                }
            }
        }
        Ok(())
    }

    fn index_legacy(&mut self, arena: &GroupArena) {
        let Some(root) = arena.get(GroupId::ROOT) else { return };
        for &bucket in root.children() {
            let Some(node) = arena.get(bucket) else { continue };
            for (index, r) in node.records().iter().enumerate() {
                let handle = RecordHandle { group: bucket, index };
                if let RecordId::Named(name) = &r.id {
                    if !name.is_empty() {
                        self.records_by_name.entry(name.clone()).or_insert(handle);
                    }
                }
                if let Some(idx) = r.as_land_texture().and_then(|t| t.index) {
                    self.land_textures_by_index.entry(idx).or_insert(handle);
                }
                if let Some(grid) = r.as_land().and_then(|l| l.grid) {
                    self.lands_by_grid.entry(grid).or_insert(handle);
                }
                if let Some(cell) = r.as_cell() {
                    if cell.is_interior() {
                        if let Some(name) = &cell.editor_id {
                            self.interiors_by_name.entry(name.clone()).or_insert(handle);
                        }
                    } else if let Some(grid) = cell.grid {
                        self.cells_by_grid.entry(grid).or_insert(handle);
                    }
                }
            }
        }
    }
}

fn top_group(arena: &GroupArena, t: Tag) -> Option<GroupId> {
    arena.child(GroupId::ROOT, t.as_label(), GroupKind::ByRecordType)
}
