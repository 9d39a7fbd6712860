//! Fixed binary headers: records, groups and fields.
//!
//! ```text
//! Legacy record    tag[4] size:u32 reserved:u32 flags:u32                        16 B
//! Standard record  tag[4] size:u32 flags:u32 form_id:u32 vc:u32                  20 B
//! Extended record  … as Standard … version:u16 unknown:u16                       24 B
//! Group            "GRUP" total:u32 label:u32 type:i32 stamp:u32 [extra:u32]  20/24 B
//! Field            tag[4] size:u32 (Legacy) | size:u16 (Standard, Extended)    8/6 B
//! ```
//!
//! A group's `total` includes its own header; a record's `size` does not.

use std::io::{Read, Seek};

use serde::Serialize;

use crate::cursor::ByteCursor;
use crate::error::{EsmError, Result};
use crate::revision::FormatRevision;
use crate::tag::{self, Tag};

/// Payload is `u32 inflated length` followed by a zlib stream.
pub const FLAG_COMPRESSED: u32 = 0x0004_0000;
/// Record was deleted by a plugin.
pub const FLAG_DELETED: u32 = 0x0000_0020;

// ── Group kinds ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChildTier {
    Persistent,
    Temporary,
    VisibleDistant,
}

/// What a group's label means is decided by its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GroupKind {
    /// Top-level group; label is the record type tag.
    ByRecordType,
    /// Children of one worldspace; label is the world's form id.
    World,
    /// Label is the block number.
    InteriorBlock,
    /// Label is the sub-block number.
    InteriorSubBlock,
    /// Label is a packed 32×32 grid coordinate.
    ExteriorBlock,
    /// Label is a packed 8×8 grid coordinate.
    ExteriorSubBlock,
    /// Everything placed in one cell; label is the cell's form id.
    Cell,
    /// Label is the dialogue topic's form id.
    TopicChildren,
    /// One tier of a cell's children; label is the cell's form id.
    CellChildren(ChildTier),
}

impl GroupKind {
    pub fn from_disk(value: i32) -> Option<Self> {
        Some(match value {
            0  => GroupKind::ByRecordType,
            1  => GroupKind::World,
            2  => GroupKind::InteriorBlock,
            3  => GroupKind::InteriorSubBlock,
            4  => GroupKind::ExteriorBlock,
            5  => GroupKind::ExteriorSubBlock,
            6  => GroupKind::Cell,
            7  => GroupKind::TopicChildren,
            8  => GroupKind::CellChildren(ChildTier::Persistent),
            9  => GroupKind::CellChildren(ChildTier::Temporary),
            10 => GroupKind::CellChildren(ChildTier::VisibleDistant),
            _  => return None,
        })
    }

    pub fn to_disk(self) -> i32 {
        match self {
            GroupKind::ByRecordType     => 0,
            GroupKind::World            => 1,
            GroupKind::InteriorBlock    => 2,
            GroupKind::InteriorSubBlock => 3,
            GroupKind::ExteriorBlock    => 4,
            GroupKind::ExteriorSubBlock => 5,
            GroupKind::Cell             => 6,
            GroupKind::TopicChildren    => 7,
            GroupKind::CellChildren(ChildTier::Persistent)     => 8,
            GroupKind::CellChildren(ChildTier::Temporary)      => 9,
            GroupKind::CellChildren(ChildTier::VisibleDistant) => 10,
        }
    }
}

// ── Headers ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordHeader {
    pub tag:             Tag,
    /// Payload bytes following the header (compressed size when compressed).
    pub data_size:       u32,
    pub flags:           u32,
    /// Zero in Legacy archives.
    pub form_id:         u32,
    pub version_control: u32,
    /// Extended only.
    pub form_version:    Option<u16>,
    /// Absolute offset of the header's first byte.
    pub offset:          u64,
    /// Absolute offset of the first payload byte.
    pub data_offset:     u64,
}

impl RecordHeader {
    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    pub fn is_deleted(&self) -> bool {
        self.flags & FLAG_DELETED != 0
    }

    pub fn end(&self) -> u64 {
        self.data_offset + self.data_size as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupHeader {
    pub label:       u32,
    pub kind:        GroupKind,
    pub stamp:       u32,
    pub offset:      u64,
    pub data_offset: u64,
    /// Bytes of child chunks, i.e. the on-disk total minus the header.
    pub data_size:   u64,
}

impl GroupHeader {
    pub fn end(&self) -> u64 {
        self.data_offset + self.data_size
    }
}

/// One framing unit: either a record or a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkHeader {
    Record(RecordHeader),
    Group(GroupHeader),
}

impl ChunkHeader {
    /// Read the header at the cursor; the cursor ends on the first payload byte.
    pub fn read<R: Read + Seek>(cursor: &mut ByteCursor<R>, revision: FormatRevision) -> Result<Self> {
        let offset = cursor.position();
        let tag = cursor.read_tag()?;
        let size = cursor.read_u32()?;

        if tag == tag::GRUP {
            if let Some(header_size) = revision.group_header_size() {
                return Self::read_group_tail(cursor, revision, offset, size, header_size);
            }
        }

        let header = match revision {
            FormatRevision::Legacy => {
                let _reserved = cursor.read_u32()?;
                let flags = cursor.read_u32()?;
                RecordHeader {
                    tag,
                    data_size: size,
                    flags,
                    form_id: 0,
                    version_control: 0,
                    form_version: None,
                    offset,
                    data_offset: cursor.position(),
                }
            }
            FormatRevision::Standard | FormatRevision::Extended => {
                let flags = cursor.read_u32()?;
                let form_id = cursor.read_u32()?;
                let version_control = cursor.read_u32()?;
                let form_version = if revision == FormatRevision::Extended {
                    let version = cursor.read_u16()?;
                    let _unknown = cursor.read_u16()?;
                    Some(version)
                } else {
                    None
                };
                RecordHeader {
                    tag,
                    data_size: size,
                    flags,
                    form_id,
                    version_control,
                    form_version,
                    offset,
                    data_offset: cursor.position(),
                }
            }
        };
        Ok(ChunkHeader::Record(header))
    }

    fn read_group_tail<R: Read + Seek>(
        cursor:      &mut ByteCursor<R>,
        revision:    FormatRevision,
        offset:      u64,
        total:       u32,
        header_size: u64,
    ) -> Result<Self> {
        let label = cursor.read_u32()?;
        let raw_kind = cursor.read_i32()?;
        let stamp = cursor.read_u32()?;
        if revision == FormatRevision::Extended {
            let _extra = cursor.read_u32()?;
        }
        if (total as u64) < header_size {
            return Err(EsmError::corrupt(
                offset,
                tag::GRUP,
                format!("group size {total} smaller than its {header_size}-byte header"),
            ));
        }
        let kind = GroupKind::from_disk(raw_kind).ok_or_else(|| {
            EsmError::corrupt(offset, tag::GRUP, format!("unknown group type {raw_kind}"))
        })?;
        Ok(ChunkHeader::Group(GroupHeader {
            label,
            kind,
            stamp,
            offset,
            data_offset: cursor.position(),
            data_size: total as u64 - header_size,
        }))
    }

    pub fn tag(&self) -> Tag {
        match self {
            ChunkHeader::Record(r) => r.tag,
            ChunkHeader::Group(_)  => tag::GRUP,
        }
    }

    pub fn offset(&self) -> u64 {
        match self {
            ChunkHeader::Record(r) => r.offset,
            ChunkHeader::Group(g)  => g.offset,
        }
    }

    /// First byte after this chunk.
    pub fn end(&self) -> u64 {
        match self {
            ChunkHeader::Record(r) => r.end(),
            ChunkHeader::Group(g)  => g.end(),
        }
    }
}

// ── Field header ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldHeader {
    pub tag:       Tag,
    pub data_size: u32,
    /// Absolute offset of the header (of the extender, when one preceded it).
    pub offset:    u64,
}

impl FieldHeader {
    fn read_raw<R: Read + Seek>(cursor: &mut ByteCursor<R>, revision: FormatRevision) -> Result<(Tag, u32)> {
        let tag = cursor.read_tag()?;
        let size = match revision {
            FormatRevision::Legacy => cursor.read_u32()?,
            FormatRevision::Standard | FormatRevision::Extended => cursor.read_u16()? as u32,
        };
        Ok((tag, size))
    }

    /// Read one field header, folding an `XXXX` extender into the header that
    /// follows it: the extender's u32 payload replaces that header's size.
    pub fn read<R: Read + Seek>(cursor: &mut ByteCursor<R>, revision: FormatRevision) -> Result<Self> {
        let offset = cursor.position();
        let (tag, data_size) = Self::read_raw(cursor, revision)?;
        if tag != tag::XXXX {
            return Ok(FieldHeader { tag, data_size, offset });
        }
        if data_size != 4 {
            return Err(EsmError::corrupt(
                offset,
                tag::XXXX,
                format!("extender payload must be 4 bytes, got {data_size}"),
            ));
        }
        let extended = cursor.read_u32()?;
        let (tag, _) = Self::read_raw(cursor, revision)?;
        if tag == tag::XXXX {
            return Err(EsmError::corrupt(offset, tag::XXXX, "extender followed by another extender"));
        }
        Ok(FieldHeader { tag, data_size: extended, offset })
    }
}
