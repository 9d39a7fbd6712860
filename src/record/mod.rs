//! Decoded records and the machinery that produces them.
//!
//! A record is decoded by looking its type tag up in a
//! [`DecoderRegistry`]; the registered function walks the record's fields
//! through a [`FieldStream`] and returns a [`RecordData`] variant.  Types the
//! registry does not know are skipped by the caller, never guessed at.

pub mod catalog;
pub mod decoder;
pub mod fields;
pub mod registry;
pub mod world;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::header::RecordHeader;
use crate::tag::Tag;

pub use catalog::{
    CombatAdvanced, CombatStyle, CombatStyleData, CstdSchema, FileHeader, Global, GameSetting,
    LeveledEntry, LeveledList, Master, Model, SettingValue, Static,
};
pub use decoder::{decode_record, DecodedRecord};
pub use fields::{Field, FieldStep, FieldStream};
pub use registry::{DecodeFn, DecoderRegistry};
pub use world::{
    AlphaLayer, BaseLayer, Cell, CellReference, HeightMap, Land, LandTexture, Lighting, MapData,
    Placement, Reference, World,
};

// ── Identity ─────────────────────────────────────────────────────────────────

/// How records name each other.  Ids of different variants never compare
/// equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum RecordId {
    Numeric(u32),
    Named(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Numeric(id) => write!(f, "{id:08X}"),
            RecordId::Named(name) => f.write_str(name),
        }
    }
}

impl From<u32> for RecordId {
    fn from(id: u32) -> Self {
        RecordId::Numeric(id)
    }
}

impl From<&str> for RecordId {
    fn from(name: &str) -> Self {
        RecordId::Named(name.to_owned())
    }
}

// ── Records ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub header: RecordHeader,
    pub id:     RecordId,
    pub data:   RecordData,
}

impl Record {
    pub fn tag(&self) -> Tag {
        self.header.tag
    }

    pub fn editor_id(&self) -> Option<&str> {
        self.data.editor_id()
    }

    pub fn as_cell(&self) -> Option<&Cell> {
        match &self.data {
            RecordData::Cell(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_land(&self) -> Option<&Land> {
        match &self.data {
            RecordData::Land(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_world(&self) -> Option<&World> {
        match &self.data {
            RecordData::World(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_land_texture(&self) -> Option<&LandTexture> {
        match &self.data {
            RecordData::LandTexture(t) => Some(t),
            _ => None,
        }
    }

    /// Payload of a caller-registered decoder, if it has type `T`.
    pub fn custom<T: Any + Send + Sync>(&self) -> Option<&T> {
        match &self.data {
            RecordData::Custom(p) => p.value.downcast_ref(),
            _ => None,
        }
    }
}

/// Typed payload of one record.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "fields")]
pub enum RecordData {
    FileHeader(FileHeader),
    Cell(Cell),
    Land(Land),
    LandTexture(LandTexture),
    World(World),
    Reference(Reference),
    Static(Static),
    Global(Global),
    GameSetting(GameSetting),
    LeveledList(LeveledList),
    CombatStyle(CombatStyle),
    Custom(CustomPayload),
}

impl RecordData {
    /// Wrap the output of a caller-registered decoder.
    pub fn custom<T: Any + Send + Sync + fmt::Debug>(value: T) -> Self {
        RecordData::Custom(CustomPayload {
            type_name: std::any::type_name::<T>(),
            value:     Arc::new(value),
        })
    }

    pub fn editor_id(&self) -> Option<&str> {
        let id = match self {
            RecordData::Cell(c)        => &c.editor_id,
            RecordData::LandTexture(t) => &t.editor_id,
            RecordData::World(w)       => &w.editor_id,
            RecordData::Reference(r)   => &r.editor_id,
            RecordData::Static(s)      => &s.editor_id,
            RecordData::Global(g)      => &g.editor_id,
            RecordData::GameSetting(g) => &g.editor_id,
            RecordData::LeveledList(l) => &l.editor_id,
            RecordData::CombatStyle(c) => &c.editor_id,
            RecordData::FileHeader(_) | RecordData::Land(_) | RecordData::Custom(_) => return None,
        };
        id.as_deref()
    }
}

#[derive(Clone)]
pub struct CustomPayload {
    pub type_name: &'static str,
    pub value:     Arc<dyn Any + Send + Sync>,
}

impl fmt::Debug for CustomPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CustomPayload({})", self.type_name)
    }
}

impl Serialize for CustomPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.type_name)
    }
}
