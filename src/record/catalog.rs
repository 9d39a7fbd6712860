//! Built-in decoders for non-spatial record types.
//!
//! Where a following field refines an entry opened by an earlier one
//! (masters and their sizes, leveled-list entries and their levels, models
//! and their bounds), the decoder keeps an explicit state value and documents
//! its transitions.  A refining field with nothing to refine is
//! `CorruptHeader`.

use serde::Serialize;

use crate::error::Result;
use crate::record::fields::{Field, FieldStep, FieldStream};
use crate::record::{RecordData, RecordId};
use crate::revision::FormatRevision;
use crate::tag;

use FieldStep::{Consumed, Unknown};

// ── File header (TES3 / TES4) ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct FileHeader {
    pub version:        f32,
    /// Legacy only.
    pub file_type:      Option<u32>,
    pub record_count:   u32,
    /// Standard/Extended only.
    pub next_object_id: Option<u32>,
    pub author:         Option<String>,
    pub description:    Option<String>,
    pub masters:        Vec<Master>,
    /// Form ids of records this plugin overrides (`ONAM`).
    pub overrides:      Vec<RecordId>,
    pub internal_flags: Option<i32>,
    pub increment:      Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Master {
    pub name: String,
    /// File size recorded by the editor, from the `DATA` following `MAST`.
    pub size: Option<i64>,
}

/// `MAST` opens a master; the next `DATA` sets its size.
///
/// ```text
/// Idle ──MAST──▶ MasterOpen ──DATA──▶ Idle
///                MasterOpen ──MAST──▶ MasterOpen   (previous master keeps size None)
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
enum MasterState {
    Idle,
    MasterOpen,
}

pub fn decode_file_header(stream: &mut FieldStream<'_>) -> Result<RecordData> {
    let mut out = FileHeader::default();
    let mut state = MasterState::Idle;

    stream.decode(|f| {
        match f.tag {
            t if t == tag::HEDR => match f.revision() {
                FormatRevision::Legacy => {
                    out.version = f.f32()?;
                    out.file_type = Some(f.u32()?);
                    out.author = Some(f.fixed_string(32)?);
                    out.description = Some(f.fixed_string(256)?);
                    out.record_count = f.u32()?;
                }
                _ => {
                    out.version = f.f32()?;
                    out.record_count = f.u32()?;
                    out.next_object_id = Some(f.u32()?);
                }
            },
            t if t == tag::CNAM => out.author = Some(f.string()),
            t if t == tag::SNAM => out.description = Some(f.string()),
            t if t == tag::MAST => {
                out.masters.push(Master { name: f.string(), size: None });
                state = MasterState::MasterOpen;
            }
            t if t == tag::DATA => {
                if state != MasterState::MasterOpen {
                    return Err(f.corrupt("DATA without a preceding MAST"));
                }
                let size = f.sized_int()?;
                if let Some(m) = out.masters.last_mut() {
                    m.size = Some(size);
                }
                state = MasterState::Idle;
            }
            t if t == tag::ONAM => out.overrides = f.form_ids()?,
            t if t == tag::INTV => out.internal_flags = Some(f.i32()?),
            t if t == tag::INCC => out.increment = Some(f.i32()?),
            t if t == tag::OFST || t == tag::DELE || t == tag::TNAM => f.skip_rest(),
            _ => return Ok(Unknown),
        }
        Ok(Consumed)
    })?;
    Ok(RecordData::FileHeader(out))
}

// ── STAT ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct Static {
    pub editor_id: Option<String>,
    pub model:     Option<Model>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Model {
    pub path:           String,
    pub bound:          Option<f32>,
    #[serde(with = "hex_bytes")]
    pub texture_hashes: Vec<u8>,
}

impl Model {
    /// `MODB`/`MODT` refine the model opened by the last `MODL`.
    pub(crate) fn refine(model: &mut Option<Model>, f: &mut Field<'_>) -> Result<()> {
        let Some(m) = model.as_mut() else {
            return Err(f.corrupt(format!("{} before MODL", f.tag)));
        };
        if f.tag == tag::MODB {
            m.bound = Some(f.f32()?);
        } else {
            m.texture_hashes = f.rest().to_vec();
        }
        Ok(())
    }
}

pub fn decode_static(stream: &mut FieldStream<'_>) -> Result<RecordData> {
    let mut out = Static::default();
    stream.decode(|f| {
        match f.tag {
            t if t == tag::EDID || t == tag::NAME => out.editor_id = Some(f.string()),
            t if t == tag::MODL => out.model = Some(Model { path: f.string(), ..Model::default() }),
            t if t == tag::MODB || t == tag::MODT => Model::refine(&mut out.model, f)?,
            _ => return Ok(Unknown),
        }
        Ok(Consumed)
    })?;
    Ok(RecordData::Static(out))
}

// ── GLOB / GMST ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct Global {
    pub editor_id: Option<String>,
    /// `s`hort, `l`ong or `f`loat.
    pub kind:      Option<char>,
    /// Stored as a float whatever the kind.
    pub value:     Option<f32>,
}

pub fn decode_global(stream: &mut FieldStream<'_>) -> Result<RecordData> {
    let mut out = Global::default();
    stream.decode(|f| {
        match f.tag {
            t if t == tag::EDID || t == tag::NAME => out.editor_id = Some(f.string()),
            t if t == tag::FNAM => out.kind = Some(f.u8()? as char),
            t if t == tag::FLTV => out.value = Some(f.f32()?),
            _ => return Ok(Unknown),
        }
        Ok(Consumed)
    })?;
    Ok(RecordData::Global(out))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Str(String),
    /// Editor-id prefix not recognised; payload kept verbatim.
    Raw(#[serde(with = "hex_bytes")] Vec<u8>),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GameSetting {
    pub editor_id: Option<String>,
    pub value:     Option<SettingValue>,
}

/// Legacy settings carry their type in the field tag (`STRV`, `INTV`,
/// `FLTV`); later revisions in the first character of the editor id.
pub fn decode_game_setting(stream: &mut FieldStream<'_>) -> Result<RecordData> {
    let mut out = GameSetting::default();
    let legacy = stream.revision() == FormatRevision::Legacy;
    stream.decode(|f| {
        match f.tag {
            t if t == tag::NAME && legacy => out.editor_id = Some(f.string()),
            t if t == tag::EDID && !legacy => out.editor_id = Some(f.string()),
            t if t == tag::STRV && legacy => out.value = Some(SettingValue::Str(f.string())),
            t if t == tag::INTV && legacy => out.value = Some(SettingValue::Int(f.i32()?)),
            t if t == tag::FLTV && legacy => out.value = Some(SettingValue::Float(f.f32()?)),
            t if t == tag::DATA && !legacy => {
                let prefix = out.editor_id.as_deref().and_then(|id| id.chars().next());
                out.value = Some(match prefix {
                    Some('b') => SettingValue::Bool(f.i32()? != 0),
                    Some('i') => SettingValue::Int(f.i32()?),
                    Some('f') => SettingValue::Float(f.f32()?),
                    Some('s') => SettingValue::Str(f.string()),
                    _         => SettingValue::Raw(f.rest().to_vec()),
                });
            }
            _ => return Ok(Unknown),
        }
        Ok(Consumed)
    })?;
    Ok(RecordData::GameSetting(out))
}

// ── Leveled lists (LEVI / LEVC / LVLI / LVLC) ───────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeveledEntry {
    pub level:  i16,
    pub target: RecordId,
    pub count:  Option<i16>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LeveledList {
    pub editor_id:   Option<String>,
    pub chance_none: Option<u8>,
    pub flags:       u32,
    /// Legacy `INDX`: entry count announced by the editor.
    pub announced:   Option<i32>,
    pub script:      Option<RecordId>,
    pub template:    Option<RecordId>,
    pub entries:     Vec<LeveledEntry>,
}

/// Legacy lists pair an entry field with the level that follows it.
///
/// ```text
/// Idle ──INAM|CNAM──▶ AwaitingLevel ──INTV──▶ Idle
///                     AwaitingLevel ──INAM|CNAM──▶ AwaitingLevel (previous entry keeps level 0)
/// Idle ──INTV──▶ CorruptHeader
/// ```
/// `LVLO` (later revisions) is a complete entry and never changes state.
#[derive(Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Idle,
    AwaitingLevel,
}

pub fn decode_leveled_list(stream: &mut FieldStream<'_>) -> Result<RecordData> {
    let mut out = LeveledList::default();
    let mut state = EntryState::Idle;
    let legacy = stream.revision() == FormatRevision::Legacy;

    stream.decode(|f| {
        match f.tag {
            t if t == tag::EDID || (t == tag::NAME && legacy) => out.editor_id = Some(f.string()),
            // Legacy header fields.
            t if t == tag::DATA && legacy => out.flags = f.u32()?,
            t if t == tag::NNAM && legacy => out.chance_none = Some(f.u8()?),
            t if t == tag::INDX && legacy => out.announced = Some(f.i32()?),
            t if (t == tag::INAM || t == tag::CNAM) && legacy => {
                out.entries.push(LeveledEntry {
                    level:  0,
                    target: RecordId::Named(f.string()),
                    count:  None,
                });
                state = EntryState::AwaitingLevel;
            }
            t if t == tag::INTV && legacy => {
                if state != EntryState::AwaitingLevel {
                    return Err(f.corrupt("INTV without a pending list entry"));
                }
                let level = f.i16()?;
                if let Some(e) = out.entries.last_mut() {
                    e.level = level;
                }
                state = EntryState::Idle;
            }
            // Later revisions.
            t if t == tag::LVLD => out.chance_none = Some(f.u8()?),
            t if t == tag::LVLF => out.flags = f.u8()? as u32,
            t if t == tag::DATA => out.flags |= f.u8()? as u32,
            t if t == tag::SCRI => out.script = Some(f.record_ref()?),
            t if t == tag::TNAM => out.template = Some(f.record_ref()?),
            t if t == tag::LVLO => {
                let level = f.i16()?;
                f.skip(2)?;
                let target = RecordId::Numeric(f.u32()?);
                let count = if f.remaining() >= 4 {
                    let c = f.i16()?;
                    f.skip(2)?;
                    Some(c)
                } else {
                    None
                };
                out.entries.push(LeveledEntry { level, target, count });
            }
            _ => return Ok(Unknown),
        }
        Ok(Consumed)
    })?;
    Ok(RecordData::LeveledList(out))
}

// ── CSTY ─────────────────────────────────────────────────────────────────────

/// `CSTD` layouts, one per payload size seen in shipped data.  Each layout
/// extends the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CstdSchema {
    V84,
    V92,
    V104,
    V112,
    V120,
    V124,
}

impl CstdSchema {
    pub fn from_size(size: usize) -> Option<Self> {
        Some(match size {
            84  => CstdSchema::V84,
            92  => CstdSchema::V92,
            104 => CstdSchema::V104,
            112 => CstdSchema::V112,
            120 => CstdSchema::V120,
            124 => CstdSchema::V124,
            _   => return None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CombatStyleData {
    pub dodge_chance:            u8,
    pub left_right_chance:       u8,
    pub dodge_left_right_timer:  [f32; 2],
    pub dodge_forward_timer:     [f32; 2],
    pub dodge_back_timer:        [f32; 2],
    pub idle_timer:              [f32; 2],
    pub block_chance:            u8,
    pub attack_chance:           u8,
    pub recoil_stagger_bonus:    f32,
    pub unconscious_bonus:       f32,
    pub hand_to_hand_bonus:      f32,
    pub power_attack_chance:     u8,
    pub recoil_stagger_power:    f32,
    pub unconscious_power:       f32,
    /// Normal, forward, back, left, right.
    pub power_attack_weights:    [u8; 5],
    pub hold_timer:              [f32; 2],
    pub flags:                   u8,
    pub acrobatic_dodge_chance:  u8,
    // V92+
    pub range_mult:              Option<[f32; 2]>,
    // V104+: melee, ranged, buff standoff
    pub switch_distance:         Option<[f32; 3]>,
    // V112+: ranged, group
    pub standoff:                Option<[f32; 2]>,
    // V120+
    pub rushing_attack:          Option<(u8, f32)>,
    // V124
    pub extra_flags:             Option<u32>,
}

/// `CSAD`: 21 attack/dodge/block modifiers in on-disk order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombatAdvanced(pub [f32; 21]);

#[derive(Debug, Clone, Default, Serialize)]
pub struct CombatStyle {
    pub editor_id: Option<String>,
    pub schema:    Option<CstdSchema>,
    pub standard:  Option<CombatStyleData>,
    pub advanced:  Option<CombatAdvanced>,
}

fn pair(f: &mut Field<'_>) -> Result<[f32; 2]> {
    Ok([f.f32()?, f.f32()?])
}

fn read_cstd(f: &mut Field<'_>, schema: CstdSchema) -> Result<CombatStyleData> {
    let mut d = CombatStyleData {
        dodge_chance:      f.u8()?,
        left_right_chance: f.u8()?,
        ..Default::default()
    };
    f.skip(2)?;
    d.dodge_left_right_timer = pair(f)?;
    d.dodge_forward_timer = pair(f)?;
    d.dodge_back_timer = pair(f)?;
    d.idle_timer = pair(f)?;
    d.block_chance = f.u8()?;
    d.attack_chance = f.u8()?;
    f.skip(2)?;
    d.recoil_stagger_bonus = f.f32()?;
    d.unconscious_bonus = f.f32()?;
    d.hand_to_hand_bonus = f.f32()?;
    d.power_attack_chance = f.u8()?;
    f.skip(3)?;
    d.recoil_stagger_power = f.f32()?;
    d.unconscious_power = f.f32()?;
    for w in d.power_attack_weights.iter_mut() {
        *w = f.u8()?;
    }
    f.skip(3)?;
    d.hold_timer = pair(f)?;
    d.flags = f.u8()?;
    d.acrobatic_dodge_chance = f.u8()?;
    f.skip(2)?;
    if schema == CstdSchema::V84 {
        return Ok(d);
    }
    d.range_mult = Some(pair(f)?);
    if schema == CstdSchema::V92 {
        return Ok(d);
    }
    d.switch_distance = Some([f.f32()?, f.f32()?, f.f32()?]);
    if schema == CstdSchema::V104 {
        return Ok(d);
    }
    d.standoff = Some(pair(f)?);
    if schema == CstdSchema::V112 {
        return Ok(d);
    }
    let chance = f.u8()?;
    f.skip(3)?;
    d.rushing_attack = Some((chance, f.f32()?));
    if schema == CstdSchema::V120 {
        return Ok(d);
    }
    d.extra_flags = Some(f.u32()?);
    Ok(d)
}

pub fn decode_combat_style(stream: &mut FieldStream<'_>) -> Result<RecordData> {
    let mut out = CombatStyle::default();
    stream.decode(|f| {
        match f.tag {
            t if t == tag::EDID => out.editor_id = Some(f.string()),
            t if t == tag::CSTD => {
                let schema = CstdSchema::from_size(f.size()).ok_or_else(|| {
                    f.corrupt(format!("CSTD of {} bytes matches no known layout", f.size()))
                })?;
                out.standard = Some(read_cstd(f, schema)?);
                out.schema = Some(schema);
            }
            t if t == tag::CSAD => {
                let mut v = [0f32; 21];
                for x in v.iter_mut() {
                    *x = f.f32()?;
                }
                out.advanced = Some(CombatAdvanced(v));
            }
            _ => return Ok(Unknown),
        }
        Ok(Consumed)
    })?;
    Ok(RecordData::CombatStyle(out))
}

// ── Serde helpers ────────────────────────────────────────────────────────────

pub(crate) mod hex_bytes {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }
}
