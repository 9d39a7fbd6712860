//! Four-byte type codes used for records, groups and fields.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A 4-byte ASCII type tag, stored exactly as it appears on disk.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Tag(pub [u8; 4]);

impl Tag {
    pub const fn new(bytes: &[u8; 4]) -> Self {
        Tag(*bytes)
    }

    /// The tag read as a little-endian u32, which is how top-level group
    /// labels carry the record type they hold.
    pub const fn as_label(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    pub const fn from_label(label: u32) -> Self {
        Tag(label.to_le_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Member of the known-tag table: a framing tag or a record type this
    /// crate knows about.  Field tags are deliberately not listed.
    pub fn is_known(self) -> bool {
        ENGINE_RECORD_TAGS.contains(&self) || OTHER_RECORD_TAGS.contains(&self)
    }

    fn is_printable(self) -> bool {
        self.0.iter().all(|b| b.is_ascii_graphic() || *b == b' ')
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_printable() {
            for b in self.0 {
                write!(f, "{}", b as char)?;
            }
            Ok(())
        } else {
            write!(f, "0x{}", hex::encode(self.0))
        }
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({self})")
    }
}

impl FromStr for Tag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; 4] = s
            .as_bytes()
            .try_into()
            .map_err(|_| format!("tag must be exactly 4 bytes, got {s:?}"))?;
        Ok(Tag(bytes))
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

const fn tag_of(s: &str) -> Tag {
    let b = s.as_bytes();
    Tag([b[0], b[1], b[2], b[3]])
}

macro_rules! tags {
    ($($name:ident),* $(,)?) => {
        $(pub const $name: Tag = tag_of(stringify!($name));)*
    };
}

// ── Framing ─────────────────────────────────────────────────────────────────

pub const GRUP: Tag = Tag(*b"GRUP");
pub const TES3: Tag = Tag(*b"TES3");
pub const TES4: Tag = Tag(*b"TES4");
/// Field-size extender: its 4-byte payload is the size of the next field.
pub const XXXX: Tag = Tag(*b"XXXX");

// ── Record types ────────────────────────────────────────────────────────────

pub const CELL: Tag = Tag(*b"CELL");
pub const LAND: Tag = Tag(*b"LAND");
pub const LTEX: Tag = Tag(*b"LTEX");
pub const WRLD: Tag = Tag(*b"WRLD");
pub const REFR: Tag = Tag(*b"REFR");
pub const STAT: Tag = Tag(*b"STAT");
pub const GLOB: Tag = Tag(*b"GLOB");
pub const GMST: Tag = Tag(*b"GMST");
pub const LEVI: Tag = Tag(*b"LEVI");
pub const LEVC: Tag = Tag(*b"LEVC");
pub const LVLI: Tag = Tag(*b"LVLI");
pub const LVLC: Tag = Tag(*b"LVLC");
pub const CSTY: Tag = Tag(*b"CSTY");

/// Record types that appear in shipped master files but have no decoder in
/// the default registry.  They still count as known for strict validation.
const OTHER_RECORD_TAGS: [Tag; 24] = [
    Tag(*b"ACTI"), Tag(*b"ALCH"), Tag(*b"AMMO"), Tag(*b"APPA"), Tag(*b"ARMO"),
    Tag(*b"BOOK"), Tag(*b"CLAS"), Tag(*b"CLOT"), Tag(*b"CONT"), Tag(*b"CREA"),
    Tag(*b"DIAL"), Tag(*b"DOOR"), Tag(*b"ENCH"), Tag(*b"FACT"), Tag(*b"INFO"),
    Tag(*b"INGR"), Tag(*b"LIGH"), Tag(*b"MISC"), Tag(*b"NPC_"), Tag(*b"RACE"),
    Tag(*b"REGN"), Tag(*b"SCPT"), Tag(*b"SPEL"), Tag(*b"WEAP"),
];

const ENGINE_RECORD_TAGS: [Tag; 16] = [
    GRUP, TES3, TES4, CELL, LAND, LTEX, WRLD, REFR, STAT, GLOB, GMST, LEVI, LEVC, LVLI, LVLC,
    CSTY,
];

// ── Field tags ──────────────────────────────────────────────────────────────

tags!(
    OFST, EDID, NAME, FULL, DATA, HEDR, CNAM, SNAM, MAST, INTV, INCC, ONAM, TNAM, XCLC, XCLL,
    XCLW, XCLR, XCCM, XCWT, RGNN, WHGT, AMBI, FRMR, XSCL, DODT, DNAM, FLTV, KNAM, UNAM, ANAM,
    BNAM, NAM0, NAM5, NAM9, XSOL, INDX, DELE, VNML, VHGT, VCLR, VTEX, WNAM, BTXT, ATXT, VTXT,
    ICON, HNAM, GNAM, MODL, MODB, MODT, FNAM, STRV, NNAM, INAM, LVLD, LVLF, LVLO, CSTD, CSAD,
    NAM2, MNAM, SCRI, XTEL, XESP,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_round_trip() {
        assert_eq!(Tag::from_label(CELL.as_label()), CELL);
        assert_eq!(CELL.as_label(), u32::from_le_bytes(*b"CELL"));
    }

    #[test]
    fn display_escapes_binary() {
        assert_eq!(WRLD.to_string(), "WRLD");
        assert_eq!(Tag([0, 1, 2, 0xff]).to_string(), "0x000102ff");
    }

    #[test]
    fn parse_requires_four_bytes() {
        assert_eq!("LTEX".parse::<Tag>().unwrap(), LTEX);
        assert!("LTE".parse::<Tag>().is_err());
    }

    #[test]
    fn field_constants_match_their_names() {
        assert_eq!(EDID, Tag(*b"EDID"));
        assert_eq!(XCLC, Tag(*b"XCLC"));
    }

    #[test]
    fn known_table() {
        assert!(TES4.is_known());
        assert!(Tag(*b"NPC_").is_known());
        assert!(!EDID.is_known());
        assert!(!Tag([0; 4]).is_known());
    }
}
