//! Coordinate lookups over the lazily loaded world tree.
//!
//! # Label packing
//! Exterior block and sub-block groups are labelled with two `i16` grid
//! coordinates packed into one `u32`.  On disk the Y half-word comes first,
//! so read as a little-endian `u32` Y occupies the low 16 bits and X the high
//! 16 bits.  Blocks cover 32×32 cells and sub-blocks 8×8, so their labels use
//! the cell grid shifted right (arithmetically) by 5 and 3.
//!
//! # Memoisation
//! [`SpatialIndex::ensure_cell`] remembers, per block node, which sub-block
//! labels it has already indexed.  A repeated lookup of an indexed
//! coordinate touches no bytes at all.
//!
//! # Layers
//! Exterior cells live at [`EXTERIOR_LAYER`].  Interior cells have no grid;
//! they sit at [`INTERIOR_LAYER`] and are looked up by name through
//! [`SpatialIndex::interior_cell`], which indexes every interior cell once.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek};

use log::debug;
use serde::Serialize;

use crate::error::Result;
use crate::group::{GroupArena, GroupId, GroupLoader, RecordHandle};
use crate::header::{ChildTier, GroupKind};
use crate::tag;

pub const EXTERIOR_LAYER: i8 = 0;
pub const INTERIOR_LAYER: i8 = -1;

/// Pack a grid coordinate into a group label.
pub fn pack_label(y: i16, x: i16) -> u32 {
    ((x as u16 as u32) << 16) | (y as u16 as u32)
}

/// Inverse of [`pack_label`], returning `(y, x)`.
pub fn unpack_label(label: u32) -> (i16, i16) {
    ((label & 0xffff) as u16 as i16, (label >> 16) as u16 as i16)
}

/// Label of the exterior block holding cell `(x, y)`.
pub fn block_label(x: i16, y: i16) -> u32 {
    pack_label(y >> 5, x >> 5)
}

/// Label of the exterior sub-block holding cell `(x, y)`.
pub fn sub_block_label(x: i16, y: i16) -> u32 {
    pack_label(y >> 3, x >> 3)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SpatialKey {
    pub x:     i16,
    pub y:     i16,
    pub layer: i8,
}

/// A located cell.  Every member is a handle into the archive's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellHandle {
    pub cell:     RecordHandle,
    /// The cell's own child group, labelled by its form id.
    pub children: Option<GroupId>,
    pub land:     Option<RecordHandle>,
}

/// Lookup tables from coordinates and names to cells.  Keys are scoped by
/// the world group they were found under; Legacy archives have a single
/// implicit world, [`GroupId::ROOT`].
#[derive(Debug, Default)]
pub struct SpatialIndex {
    /// Block node → sub-block labels already indexed beneath it.
    ensured:   HashMap<GroupId, HashSet<u32>>,
    cells:     HashMap<(GroupId, SpatialKey), CellHandle>,
    interiors: Option<HashMap<String, CellHandle>>,
}

impl SpatialIndex {
    /// Cached lookup; never loads anything.
    pub fn lookup(&self, world: GroupId, x: i16, y: i16, layer: i8) -> Option<CellHandle> {
        self.cells.get(&(world, SpatialKey { x, y, layer })).copied()
    }

    pub fn indexed_cells(&self) -> usize {
        self.cells.len()
    }

    /// Load the path from `world` down to the sub-block holding `(x, y)`
    /// and return the cell there, if any.
    pub fn ensure_cell<R: Read + Seek>(
        &mut self,
        arena:  &mut GroupArena,
        loader: &mut GroupLoader<'_, R>,
        world:  GroupId,
        x:      i16,
        y:      i16,
        layer:  i8,
    ) -> Result<Option<CellHandle>> {
        if layer == INTERIOR_LAYER {
            return Ok(None);
        }
        loader.load(arena, world)?;

        let block = block_label(x, y);
        let sub = sub_block_label(x, y);
        let candidates: Vec<GroupId> = arena
            .node(world)?
            .children_labelled(block)
            .iter()
            .copied()
            .filter(|&c| arena.get(c).is_some_and(|n| n.kind == GroupKind::ExteriorBlock))
            .collect();

        for block_id in candidates {
            if self.ensured.get(&block_id).is_some_and(|seen| seen.contains(&sub)) {
                continue;
            }
            loader.load(arena, block_id)?;
            if let Some(sub_id) = arena.child(block_id, sub, GroupKind::ExteriorSubBlock) {
                loader.load(arena, sub_id)?;
                self.index_sub_block(arena, loader, world, sub_id)?;
            }
            self.ensured.entry(block_id).or_default().insert(sub);
        }

        Ok(self.lookup(world, x, y, layer))
    }

    fn index_sub_block<R: Read + Seek>(
        &mut self,
        arena:  &mut GroupArena,
        loader: &mut GroupLoader<'_, R>,
        world:  GroupId,
        sub_id: GroupId,
    ) -> Result<()> {
        let cells: Vec<(usize, u32, (i32, i32))> = arena
            .node(sub_id)?
            .records()
            .iter()
            .enumerate()
            .filter_map(|(index, r)| {
                let cell = r.as_cell()?;
                if cell.is_interior() {
                    return None;
                }
                Some((index, r.header.form_id, cell.grid?))
            })
            .collect();

        for (index, form_id, (gx, gy)) in cells {
            let (Ok(x), Ok(y)) = (i16::try_from(gx), i16::try_from(gy)) else {
                debug!("cell {form_id:08X} has grid ({gx}, {gy}) outside the label range");
                continue;
            };
            let children = arena.child(sub_id, form_id, GroupKind::Cell);
            let land = match children {
                Some(c) => land_in(arena, loader, c)?,
                None => None,
            };
            let handle = CellHandle { cell: RecordHandle { group: sub_id, index }, children, land };
            self.cells
                .entry((world, SpatialKey { x, y, layer: EXTERIOR_LAYER }))
                .or_insert(handle);
        }
        Ok(())
    }

    /// Index an already-parsed Legacy archive, whose `CELL` and `LAND`
    /// records sit in synthetic per-type groups.
    pub fn index_legacy(&mut self, arena: &GroupArena, cells: Option<GroupId>, lands: Option<GroupId>) {
        let mut land_by_grid: HashMap<(i32, i32), RecordHandle> = HashMap::new();
        if let Some((id, node)) = lands.and_then(|id| arena.get(id).map(|n| (id, n))) {
            for (index, r) in node.records().iter().enumerate() {
                if let Some(grid) = r.as_land().and_then(|l| l.grid) {
                    land_by_grid.entry(grid).or_insert(RecordHandle { group: id, index });
                }
            }
        }

        let mut interiors = HashMap::new();
        if let Some((id, node)) = cells.and_then(|id| arena.get(id).map(|n| (id, n))) {
            for (index, r) in node.records().iter().enumerate() {
                let Some(cell) = r.as_cell() else { continue };
                let handle = RecordHandle { group: id, index };
                if cell.is_interior() {
                    if let Some(name) = cell.editor_id.as_ref() {
                        interiors
                            .entry(name.clone())
                            .or_insert(CellHandle { cell: handle, children: None, land: None });
                    }
                    continue;
                }
                let Some((gx, gy)) = cell.grid else { continue };
                let (Ok(x), Ok(y)) = (i16::try_from(gx), i16::try_from(gy)) else { continue };
                let land = land_by_grid.get(&(gx, gy)).copied();
                self.cells
                    .entry((GroupId::ROOT, SpatialKey { x, y, layer: EXTERIOR_LAYER }))
                    .or_insert(CellHandle { cell: handle, children: None, land });
            }
        }
        self.interiors = Some(interiors);
    }

    /// Interior cell by editor id.  The first call walks the whole interior
    /// cell group (`cell_top`) once; later calls only consult the table.
    pub fn interior_cell<R: Read + Seek>(
        &mut self,
        arena:    &mut GroupArena,
        loader:   &mut GroupLoader<'_, R>,
        cell_top: Option<GroupId>,
        name:     &str,
    ) -> Result<Option<CellHandle>> {
        if self.interiors.is_none() {
            let table = match cell_top {
                Some(top) => index_interiors(arena, loader, top)?,
                None => HashMap::new(),
            };
            debug!("indexed {} interior cells", table.len());
            self.interiors = Some(table);
        }
        Ok(self.interiors.as_ref().and_then(|t| t.get(name)).copied())
    }
}

fn index_interiors<R: Read + Seek>(
    arena:  &mut GroupArena,
    loader: &mut GroupLoader<'_, R>,
    top:    GroupId,
) -> Result<HashMap<String, CellHandle>> {
    let mut table = HashMap::new();
    loader.load(arena, top)?;
    let blocks = kids_of_kind(arena, top, GroupKind::InteriorBlock)?;
    for block in blocks {
        loader.load(arena, block)?;
        for sub in kids_of_kind(arena, block, GroupKind::InteriorSubBlock)? {
            loader.load(arena, sub)?;
            let node = arena.node(sub)?;
            for (index, r) in node.records().iter().enumerate() {
                if r.tag() != tag::CELL {
                    continue;
                }
                let Some(name) = r.editor_id() else { continue };
                let children = arena.child(sub, r.header.form_id, GroupKind::Cell);
                table.entry(name.to_owned()).or_insert(CellHandle {
                    cell: RecordHandle { group: sub, index },
                    children,
                    land: None,
                });
            }
        }
    }
    Ok(table)
}

fn kids_of_kind(arena: &GroupArena, id: GroupId, kind: GroupKind) -> Result<Vec<GroupId>> {
    Ok(arena
        .node(id)?
        .children()
        .iter()
        .copied()
        .filter(|&c| arena.get(c).is_some_and(|n| n.kind == kind))
        .collect())
}

/// The first `LAND` among a cell's temporary children.
fn land_in<R: Read + Seek>(
    arena:    &mut GroupArena,
    loader:   &mut GroupLoader<'_, R>,
    children: GroupId,
) -> Result<Option<RecordHandle>> {
    loader.load(arena, children)?;
    for tier in kids_of_kind(arena, children, GroupKind::CellChildren(ChildTier::Temporary))? {
        loader.load(arena, tier)?;
        let found = arena.node(tier)?.records().iter().position(|r| r.tag() == tag::LAND);
        if let Some(index) = found {
            return Ok(Some(RecordHandle { group: tier, index }));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn y_is_the_low_half() {
        assert_eq!(pack_label(1, 0), 0x0000_0001);
        assert_eq!(pack_label(0, 1), 0x0001_0000);
        assert_eq!(pack_label(-1, 3), 0x0003_ffff);
        assert_eq!(&pack_label(-1, 3).to_le_bytes(), &[0xff, 0xff, 0x03, 0x00]);
    }

    #[test]
    fn negative_coordinates_shift_arithmetically() {
        assert_eq!(block_label(100, -5), pack_label(-1, 3));
        assert_eq!(sub_block_label(100, -5), pack_label(-1, 12));
        assert_eq!(block_label(-33, 31), pack_label(0, -2));
        assert_eq!(sub_block_label(-1, -8), pack_label(-1, -1));
    }

    #[test]
    fn interior_layer_never_matches_coordinates() {
        let mut idx = SpatialIndex::default();
        idx.index_legacy(&GroupArena::new(), None, None);
        assert_eq!(idx.lookup(GroupId::ROOT, 0, 0, INTERIOR_LAYER), None);
        assert_eq!(idx.indexed_cells(), 0);
    }

    proptest! {
        #[test]
        fn pack_is_invertible(x in any::<i16>(), y in any::<i16>()) {
            prop_assert_eq!(unpack_label(pack_label(y, x)), (y, x));
        }

        #[test]
        fn cells_of_one_sub_block_share_a_block(x in any::<i16>(), y in any::<i16>()) {
            let (sy, sx) = unpack_label(sub_block_label(x, y));
            let (by, bx) = unpack_label(block_label(x, y));
            prop_assert_eq!((sy >> 2, sx >> 2), (by, bx));
        }
    }
}
