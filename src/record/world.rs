//! Decoders for the record types that make up the world: cells, terrain,
//! terrain textures, worldspaces and placed references.

use serde::Serialize;

use crate::error::Result;
use crate::record::catalog::hex_bytes;
use crate::record::fields::{Field, FieldStep, FieldStream};
use crate::record::{RecordData, RecordId};
use crate::revision::FormatRevision;
use crate::tag;

use FieldStep::{Consumed, Unknown};

/// Cell flag: the cell is an interior.
pub const CELL_INTERIOR: u16 = 0x0001;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Placement {
    pub position: [f32; 3],
    pub rotation: [f32; 3],
}

impl Placement {
    fn read(f: &mut Field<'_>) -> Result<Self> {
        Ok(Placement { position: f.f32x3()?, rotation: f.f32x3()? })
    }
}

// ── CELL ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Lighting {
    pub ambient:     [u8; 4],
    pub directional: [u8; 4],
    pub fog:         [u8; 4],
    pub fog_near:    f32,
}

/// One object placed in a Legacy cell.  Later revisions store these as
/// separate `REFR` records in the cell's child groups instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CellReference {
    /// `FRMR` object index, unique within the cell.
    pub index:            u32,
    pub base:             Option<RecordId>,
    pub scale:            Option<f32>,
    pub deleted:          bool,
    pub placement:        Option<Placement>,
    pub door_destination: Option<Placement>,
    pub door_cell:        Option<String>,
    pub lock_level:       Option<f32>,
    pub key:              Option<String>,
    pub trap:             Option<String>,
    pub owner:            Option<String>,
    pub global:           Option<String>,
    pub uses:             Option<i32>,
    pub soul:             Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Cell {
    pub editor_id:    Option<String>,
    pub name:         Option<String>,
    pub flags:        u16,
    /// Exterior grid coordinate.
    pub grid:         Option<(i32, i32)>,
    pub lighting:     Option<Lighting>,
    pub water_height: Option<f32>,
    pub region:       Option<RecordId>,
    pub regions:      Vec<RecordId>,
    pub climate:      Option<RecordId>,
    pub water:        Option<RecordId>,
    pub map_color:    Option<[u8; 4]>,
    pub object_count: Option<u32>,
    pub references:   Vec<CellReference>,
}

impl Cell {
    pub fn is_interior(&self) -> bool {
        self.flags & CELL_INTERIOR != 0
    }
}

/// Legacy cells list their placed references inline.  `FRMR` opens a
/// reference and every field after it belongs to the most recent one:
///
/// ```text
/// Header ──FRMR──▶ InReference ──FRMR──▶ InReference (new entry)
/// Header ──other──▶ Header            (cell fields)
/// InReference ──NAME|DATA|XSCL|…──▶ InReference (refines the open entry)
/// ```
///
/// There is no transition back to `Header`: once references start, cell-level
/// fields are over.
#[derive(Clone, Copy, PartialEq, Eq)]
enum CellState {
    Header,
    InReference,
}

fn color(f: &mut Field<'_>) -> Result<[u8; 4]> {
    let b = f.bytes(4)?;
    Ok([b[0], b[1], b[2], b[3]])
}

fn refine_reference(r: &mut CellReference, f: &mut Field<'_>) -> Result<FieldStep> {
    match f.tag {
        t if t == tag::NAME => r.base = Some(RecordId::Named(f.string())),
        t if t == tag::XSCL => r.scale = Some(f.f32()?),
        t if t == tag::DELE => {
            f.skip_rest();
            r.deleted = true;
        }
        t if t == tag::DATA => r.placement = Some(Placement::read(f)?),
        t if t == tag::DODT => r.door_destination = Some(Placement::read(f)?),
        t if t == tag::DNAM => r.door_cell = Some(f.string()),
        t if t == tag::FLTV => r.lock_level = Some(f.f32()?),
        t if t == tag::KNAM => r.key = Some(f.string()),
        t if t == tag::TNAM => r.trap = Some(f.string()),
        t if t == tag::ANAM => r.owner = Some(f.string()),
        t if t == tag::BNAM => r.global = Some(f.string()),
        t if t == tag::INTV => r.uses = Some(f.i32()?),
        t if t == tag::XSOL => r.soul = Some(f.string()),
        t if t == tag::UNAM || t == tag::NAM9 || t == tag::NAM0 || t == tag::INDX || t == tag::CNAM => {
            f.skip_rest()
        }
        _ => return Ok(Unknown),
    }
    Ok(Consumed)
}

pub fn decode_cell(stream: &mut FieldStream<'_>) -> Result<RecordData> {
    let mut out = Cell::default();
    let mut state = CellState::Header;
    let legacy = stream.revision() == FormatRevision::Legacy;

    stream.decode(|f| {
        if f.tag == tag::FRMR {
            out.references.push(CellReference { index: f.u32()?, ..Default::default() });
            state = CellState::InReference;
            return Ok(Consumed);
        }
        if state == CellState::InReference {
            return match out.references.last_mut() {
                Some(r) => refine_reference(r, f),
                None => Err(f.corrupt("reference state without a reference")),
            };
        }
        match f.tag {
            t if t == tag::EDID || t == tag::NAME => out.editor_id = Some(f.string()),
            t if t == tag::FULL => out.name = Some(f.string()),
            t if t == tag::RGNN => out.region = Some(RecordId::Named(f.string())),
            t if t == tag::DATA && legacy => {
                out.flags = f.u32()? as u16;
                out.grid = Some((f.i32()?, f.i32()?));
            }
            t if t == tag::DATA => out.flags = f.sized_int()? as u16,
            t if t == tag::XCLC => {
                out.grid = Some((f.i32()?, f.i32()?));
                f.skip_rest();
            }
            t if t == tag::XCLL || t == tag::AMBI => {
                out.lighting = Some(Lighting {
                    ambient:     color(f)?,
                    directional: color(f)?,
                    fog:         color(f)?,
                    fog_near:    f.f32()?,
                });
                f.skip_rest();
            }
            t if t == tag::XCLW || t == tag::WHGT => out.water_height = Some(f.f32()?),
            t if t == tag::INTV && legacy => out.water_height = Some(f.i32()? as f32),
            t if t == tag::NAM0 => out.object_count = Some(f.u32()?),
            t if t == tag::NAM5 => out.map_color = Some(color(f)?),
            t if t == tag::XCLR => out.regions = f.form_ids()?,
            t if t == tag::XCCM => out.climate = Some(f.record_ref()?),
            t if t == tag::XCWT => out.water = Some(f.record_ref()?),
            _ => return Ok(Unknown),
        }
        Ok(Consumed)
    })?;
    Ok(RecordData::Cell(out))
}

// ── LAND ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeightMap {
    /// Height offset applied to the whole cell.
    pub reference_height: f32,
    /// Row-wise deltas; each value is relative to the previous vertex.
    pub deltas:           Vec<i8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BaseLayer {
    pub texture:  u32,
    pub quadrant: u8,
    pub layer:    i16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlphaLayer {
    pub texture:   RecordId,
    pub quadrant:  u8,
    pub layer:     i16,
    /// `(vertex position, opacity)` pairs.
    pub opacities: Vec<(u16, f32)>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Land {
    pub flags:           Option<i32>,
    /// Legacy only; later revisions place LAND in its cell's child group.
    pub grid:            Option<(i32, i32)>,
    #[serde(with = "hex_bytes")]
    pub normals:         Vec<u8>,
    pub heights:         Option<HeightMap>,
    #[serde(with = "hex_bytes")]
    pub colors:          Vec<u8>,
    pub texture_indices: Vec<u32>,
    pub base_layers:     [Option<BaseLayer>; 4],
    pub alpha_layers:    Vec<AlphaLayer>,
}

/// `ATXT` opens an alpha layer which the following `VTXT` fills in.
///
/// ```text
/// Idle ──ATXT──▶ AlphaOpen ──VTXT──▶ Idle
///                AlphaOpen ──ATXT──▶ AlphaOpen (previous layer stays empty)
/// Idle ──VTXT──▶ CorruptHeader
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
enum LayerState {
    Idle,
    AlphaOpen,
}

fn layer_header(f: &mut Field<'_>) -> Result<(u32, u8, i16)> {
    let texture = f.u32()?;
    let quadrant = f.u8()?;
    f.skip(1)?;
    let layer = f.i16()?;
    if quadrant > 3 {
        return Err(f.corrupt(format!("quadrant {quadrant} out of range")));
    }
    Ok((texture, quadrant, layer))
}

pub fn decode_land(stream: &mut FieldStream<'_>) -> Result<RecordData> {
    let mut out = Land::default();
    let mut state = LayerState::Idle;
    let legacy = stream.revision() == FormatRevision::Legacy;

    stream.decode(|f| {
        match f.tag {
            t if t == tag::DATA => out.flags = Some(f.i32()?),
            t if t == tag::VNML => out.normals = f.rest().to_vec(),
            t if t == tag::VCLR => out.colors = f.rest().to_vec(),
            t if t == tag::VHGT => {
                if f.size() < 7 {
                    return Err(f.corrupt(format!("height map of {} bytes", f.size())));
                }
                let reference_height = f.f32()?;
                let count = f.remaining() - 3;
                let deltas = f.bytes(count)?.iter().map(|b| *b as i8).collect();
                f.skip(3)?;
                out.heights = Some(HeightMap { reference_height, deltas });
            }
            t if t == tag::VTEX && legacy => {
                while f.remaining() >= 2 {
                    out.texture_indices.push(f.u16()? as u32);
                }
            }
            t if t == tag::VTEX => {
                while f.remaining() >= 4 {
                    out.texture_indices.push(f.u32()?);
                }
            }
            t if t == tag::INTV && legacy => out.grid = Some((f.i32()?, f.i32()?)),
            t if t == tag::WNAM => f.skip_rest(),
            t if t == tag::BTXT => {
                let (texture, quadrant, layer) = layer_header(f)?;
                out.base_layers[quadrant as usize] = Some(BaseLayer { texture, quadrant, layer });
            }
            t if t == tag::ATXT => {
                let (texture, quadrant, layer) = layer_header(f)?;
                out.alpha_layers.push(AlphaLayer {
                    texture: RecordId::Numeric(texture),
                    quadrant,
                    layer,
                    opacities: Vec::new(),
                });
                state = LayerState::AlphaOpen;
            }
            t if t == tag::VTXT => {
                if state != LayerState::AlphaOpen {
                    return Err(f.corrupt("VTXT without a preceding ATXT"));
                }
                let mut cells = Vec::with_capacity(f.size() / 8);
                while f.remaining() >= 8 {
                    let position = f.u16()?;
                    f.skip(2)?;
                    cells.push((position, f.f32()?));
                }
                if let Some(layer) = out.alpha_layers.last_mut() {
                    layer.opacities = cells;
                }
                state = LayerState::Idle;
            }
            _ => return Ok(Unknown),
        }
        Ok(Consumed)
    })?;
    Ok(RecordData::Land(out))
}

// ── LTEX ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HavokData {
    pub material:    u8,
    pub friction:    u8,
    pub restitution: u8,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LandTexture {
    pub editor_id: Option<String>,
    pub texture:   Option<String>,
    /// Legacy `INTV`: the index LAND `VTEX` entries refer to.
    pub index:     Option<i64>,
    pub havok:     Option<HavokData>,
    pub specular:  Option<u8>,
    pub grass:     Vec<RecordId>,
}

pub fn decode_land_texture(stream: &mut FieldStream<'_>) -> Result<RecordData> {
    let mut out = LandTexture::default();
    stream.decode(|f| {
        match f.tag {
            t if t == tag::EDID || t == tag::NAME => out.editor_id = Some(f.string()),
            t if t == tag::ICON || t == tag::DATA => out.texture = Some(f.string()),
            t if t == tag::INTV => out.index = Some(f.sized_int()?),
            t if t == tag::HNAM => {
                if f.size() != 3 {
                    return Ok(Unknown);
                }
                out.havok = Some(HavokData { material: f.u8()?, friction: f.u8()?, restitution: f.u8()? });
            }
            t if t == tag::SNAM => out.specular = Some(f.u8()?),
            t if t == tag::GNAM => out.grass.push(f.record_ref()?),
            _ => return Ok(Unknown),
        }
        Ok(Consumed)
    })?;
    Ok(RecordData::LandTexture(out))
}

// ── WRLD ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MapData {
    pub usable_size: (i32, i32),
    pub nw_cell:     (i16, i16),
    pub se_cell:     (i16, i16),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct World {
    pub editor_id:  Option<String>,
    pub name:       Option<String>,
    pub parent:     Option<RecordId>,
    pub climate:    Option<RecordId>,
    pub water:      Option<RecordId>,
    pub icon:       Option<String>,
    pub map:        Option<MapData>,
    pub flags:      Option<u8>,
    pub bounds_min: Option<[f32; 2]>,
    pub bounds_max: Option<[f32; 2]>,
    pub music:      Option<u32>,
}

pub fn decode_world(stream: &mut FieldStream<'_>) -> Result<RecordData> {
    let mut out = World::default();
    stream.decode(|f| {
        match f.tag {
            t if t == tag::EDID => out.editor_id = Some(f.string()),
            t if t == tag::FULL => out.name = Some(f.string()),
            t if t == tag::WNAM => out.parent = Some(f.record_ref()?),
            t if t == tag::CNAM => out.climate = Some(f.record_ref()?),
            t if t == tag::NAM2 => out.water = Some(f.record_ref()?),
            t if t == tag::ICON => out.icon = Some(f.string()),
            t if t == tag::MNAM => {
                out.map = Some(MapData {
                    usable_size: (f.i32()?, f.i32()?),
                    nw_cell:     (f.i16()?, f.i16()?),
                    se_cell:     (f.i16()?, f.i16()?),
                });
                f.skip_rest();
            }
            t if t == tag::DATA => out.flags = Some(f.u8()?),
            t if t == tag::NAM0 => out.bounds_min = Some([f.f32()?, f.f32()?]),
            t if t == tag::NAM9 => out.bounds_max = Some([f.f32()?, f.f32()?]),
            t if t == tag::SNAM => out.music = Some(f.u32()?),
            // Offset table into the file; meaningless once records are indexed.
            t if t == tag::OFST => f.skip_rest(),
            _ => return Ok(Unknown),
        }
        Ok(Consumed)
    })?;
    Ok(RecordData::World(out))
}

// ── REFR ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct Reference {
    pub editor_id:     Option<String>,
    pub base:          Option<RecordId>,
    pub scale:         Option<f32>,
    pub placement:     Option<Placement>,
    pub teleport:      Option<(RecordId, Placement)>,
    pub enable_parent: Option<RecordId>,
}

pub fn decode_reference(stream: &mut FieldStream<'_>) -> Result<RecordData> {
    let mut out = Reference::default();
    stream.decode(|f| {
        match f.tag {
            t if t == tag::EDID => out.editor_id = Some(f.string()),
            t if t == tag::NAME => out.base = Some(f.record_ref()?),
            t if t == tag::XSCL => out.scale = Some(f.f32()?),
            t if t == tag::DATA => out.placement = Some(Placement::read(f)?),
            t if t == tag::XTEL => {
                let door = RecordId::Numeric(f.u32()?);
                out.teleport = Some((door, Placement::read(f)?));
                f.skip_rest();
            }
            t if t == tag::XESP => {
                out.enable_parent = Some(RecordId::Numeric(f.u32()?));
                f.skip_rest();
            }
            _ => return Ok(Unknown),
        }
        Ok(Consumed)
    })?;
    Ok(RecordData::Reference(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EsmError;
    use crate::tag::Tag;

    fn field(rev: FormatRevision, tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut v = tag.to_vec();
        match rev {
            FormatRevision::Legacy => v.extend_from_slice(&(payload.len() as u32).to_le_bytes()),
            _ => v.extend_from_slice(&(payload.len() as u16).to_le_bytes()),
        }
        v.extend_from_slice(payload);
        v
    }

    fn run(
        rev:    FormatRevision,
        rec:    Tag,
        fields: &[(&[u8; 4], Vec<u8>)],
        decode: fn(&mut FieldStream<'_>) -> Result<RecordData>,
    ) -> Result<RecordData> {
        let data: Vec<u8> = fields.iter().flat_map(|(t, p)| field(rev, t, p)).collect();
        let mut stream = FieldStream::new(&data, rev, rec, 0, Some(0));
        decode(&mut stream)
    }

    fn ints(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn floats(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn standard_exterior_cell() {
        let data = run(
            FormatRevision::Standard,
            tag::CELL,
            &[
                (b"EDID", b"Wilderness\0".to_vec()),
                (b"DATA", vec![0x02]),
                (b"XCLC", ints(&[100, -5])),
                (b"XCLW", floats(&[-200.0])),
                (b"XCLR", ints(&[0x10, 0x11])),
            ],
            decode_cell,
        )
        .unwrap();
        let RecordData::Cell(c) = data else { panic!() };
        assert!(!c.is_interior());
        assert_eq!(c.grid, Some((100, -5)));
        assert_eq!(c.water_height, Some(-200.0));
        assert_eq!(c.regions, [RecordId::Numeric(0x10), RecordId::Numeric(0x11)]);
    }

    #[test]
    fn legacy_cell_references_state_machine() {
        let data = run(
            FormatRevision::Legacy,
            tag::CELL,
            &[
                (b"NAME", b"Balmora\0".to_vec()),
                (b"DATA", ints(&[0, -3, -2])),
                (b"RGNN", b"West Gash\0".to_vec()),
                (b"FRMR", 1u32.to_le_bytes().to_vec()),
                (b"NAME", b"chest_small\0".to_vec()),
                (b"XSCL", floats(&[1.5])),
                (b"DATA", floats(&[1.0, 2.0, 3.0, 0.0, 0.0, 0.5])),
                (b"FRMR", 2u32.to_le_bytes().to_vec()),
                (b"NAME", b"door_01\0".to_vec()),
                (b"DNAM", b"Balmora, Inn\0".to_vec()),
                (b"DELE", 0u32.to_le_bytes().to_vec()),
            ],
            decode_cell,
        )
        .unwrap();
        let RecordData::Cell(c) = data else { panic!() };
        assert_eq!(c.editor_id.as_deref(), Some("Balmora"));
        assert_eq!(c.grid, Some((-3, -2)));
        assert_eq!(c.region, Some(RecordId::Named("West Gash".into())));
        assert_eq!(c.references.len(), 2);
        let first = &c.references[0];
        assert_eq!(first.index, 1);
        assert_eq!(first.base, Some(RecordId::Named("chest_small".into())));
        assert_eq!(first.scale, Some(1.5));
        assert_eq!(first.placement.unwrap().position, [1.0, 2.0, 3.0]);
        let second = &c.references[1];
        assert_eq!(second.door_cell.as_deref(), Some("Balmora, Inn"));
        assert!(second.deleted);
        assert!(second.placement.is_none());
    }

    #[test]
    fn land_alpha_layers() {
        let mut atxt = 0x99u32.to_le_bytes().to_vec();
        atxt.extend_from_slice(&[2, 0]);
        atxt.extend_from_slice(&1i16.to_le_bytes());
        let mut vtxt = 7u16.to_le_bytes().to_vec();
        vtxt.extend_from_slice(&[0, 0]);
        vtxt.extend_from_slice(&0.25f32.to_le_bytes());
        let mut vhgt = 10f32.to_le_bytes().to_vec();
        vhgt.extend_from_slice(&[1, 0xff, 2]);
        vhgt.extend_from_slice(&[0, 0, 0]);

        let data = run(
            FormatRevision::Standard,
            tag::LAND,
            &[
                (b"DATA", ints(&[9])),
                (b"VHGT", vhgt),
                (b"BTXT", atxt.clone()),
                (b"ATXT", atxt),
                (b"VTXT", vtxt),
            ],
            decode_land,
        )
        .unwrap();
        let RecordData::Land(l) = data else { panic!() };
        assert_eq!(l.heights.unwrap().deltas, [1, -1, 2]);
        assert_eq!(l.base_layers[2].unwrap().texture, 0x99);
        assert_eq!(l.alpha_layers.len(), 1);
        assert_eq!(l.alpha_layers[0].texture, RecordId::Numeric(0x99));
        assert_eq!(l.alpha_layers[0].opacities, [(7, 0.25)]);
    }

    #[test]
    fn vtxt_without_atxt_is_corrupt() {
        let err = run(FormatRevision::Standard, tag::LAND, &[(b"VTXT", vec![0; 8])], decode_land).unwrap_err();
        assert!(matches!(err, EsmError::CorruptHeader { tag: t, .. } if t == tag::VTXT));
    }

    #[test]
    fn legacy_land_grid_and_textures() {
        let data = run(
            FormatRevision::Legacy,
            tag::LAND,
            &[(b"INTV", ints(&[-3, -2])), (b"VTEX", vec![1, 0, 2, 0])],
            decode_land,
        )
        .unwrap();
        let RecordData::Land(l) = data else { panic!() };
        assert_eq!(l.grid, Some((-3, -2)));
        assert_eq!(l.texture_indices, [1, 2]);
    }

    #[test]
    fn land_texture_both_revisions() {
        let data = run(
            FormatRevision::Legacy,
            tag::LTEX,
            &[(b"NAME", b"Sand\0".to_vec()), (b"INTV", ints(&[4])), (b"DATA", b"tx_sand.tga\0".to_vec())],
            decode_land_texture,
        )
        .unwrap();
        let RecordData::LandTexture(t) = data else { panic!() };
        assert_eq!((t.editor_id.as_deref(), t.index), (Some("Sand"), Some(4)));
        assert_eq!(t.texture.as_deref(), Some("tx_sand.tga"));

        let data = run(
            FormatRevision::Standard,
            tag::LTEX,
            &[(b"EDID", b"Grass\0".to_vec()), (b"HNAM", vec![1, 30, 40]), (b"GNAM", ints(&[0x55]))],
            decode_land_texture,
        )
        .unwrap();
        let RecordData::LandTexture(t) = data else { panic!() };
        assert_eq!(t.havok.unwrap().friction, 30);
        assert_eq!(t.grass, [RecordId::Numeric(0x55)]);
    }

    #[test]
    fn world_skips_offset_table() {
        let mut mnam = ints(&[64, 64]);
        mnam.extend([-10i16, 10, 10, -10].iter().flat_map(|v| v.to_le_bytes()));
        let data = run(
            FormatRevision::Standard,
            tag::WRLD,
            &[
                (b"EDID", b"Tamriel\0".to_vec()),
                (b"MNAM", mnam),
                (b"OFST", vec![0xaa; 64]),
                (b"NAM0", floats(&[-1.0, -2.0])),
            ],
            decode_world,
        )
        .unwrap();
        let RecordData::World(w) = data else { panic!() };
        assert_eq!(w.editor_id.as_deref(), Some("Tamriel"));
        assert_eq!(w.map.unwrap().nw_cell, (-10, 10));
        assert_eq!(w.bounds_min, Some([-1.0, -2.0]));
    }

    #[test]
    fn placed_reference() {
        let mut xtel = 0x77u32.to_le_bytes().to_vec();
        xtel.extend(floats(&[1.0, 2.0, 3.0, 0.0, 0.0, 0.0]));
        let data = run(
            FormatRevision::Standard,
            tag::REFR,
            &[(b"NAME", ints(&[0x1234])), (b"XTEL", xtel), (b"DATA", floats(&[0.0; 6]))],
            decode_reference,
        )
        .unwrap();
        let RecordData::Reference(r) = data else { panic!() };
        assert_eq!(r.base, Some(RecordId::Numeric(0x1234)));
        assert_eq!(r.teleport.unwrap().0, RecordId::Numeric(0x77));
    }
}
