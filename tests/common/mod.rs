//! In-test fixture writer: builds master files byte by byte for any revision.

#![allow(dead_code)]

use masterfile::FormatRevision;

pub const INTERIOR: u32 = 0x01;

pub struct Fx {
    pub rev: FormatRevision,
}

impl Fx {
    pub fn new(rev: FormatRevision) -> Self {
        Self { rev }
    }

    /// A field; payloads over 64 KiB get an `XXXX` extender outside Legacy.
    pub fn field(&self, tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut v = Vec::new();
        match self.rev {
            FormatRevision::Legacy => {
                v.extend_from_slice(tag);
                v.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            }
            _ if payload.len() > u16::MAX as usize => {
                v.extend_from_slice(b"XXXX");
                v.extend_from_slice(&4u16.to_le_bytes());
                v.extend_from_slice(&(payload.len() as u32).to_le_bytes());
                v.extend_from_slice(tag);
                v.extend_from_slice(&0u16.to_le_bytes());
            }
            _ => {
                v.extend_from_slice(tag);
                v.extend_from_slice(&(payload.len() as u16).to_le_bytes());
            }
        }
        v.extend_from_slice(payload);
        v
    }

    /// A zero-terminated string field.
    pub fn zstr(&self, tag: &[u8; 4], s: &str) -> Vec<u8> {
        let mut p = s.as_bytes().to_vec();
        p.push(0);
        self.field(tag, &p)
    }

    pub fn record_raw(&self, tag: &[u8; 4], form_id: u32, flags: u32, payload: &[u8]) -> Vec<u8> {
        let mut v = tag.to_vec();
        v.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        match self.rev {
            FormatRevision::Legacy => {
                v.extend_from_slice(&0u32.to_le_bytes());
                v.extend_from_slice(&flags.to_le_bytes());
            }
            FormatRevision::Standard | FormatRevision::Extended => {
                v.extend_from_slice(&flags.to_le_bytes());
                v.extend_from_slice(&form_id.to_le_bytes());
                v.extend_from_slice(&0u32.to_le_bytes());
                if self.rev == FormatRevision::Extended {
                    v.extend_from_slice(&44u16.to_le_bytes());
                    v.extend_from_slice(&0u16.to_le_bytes());
                }
            }
        }
        v.extend_from_slice(payload);
        v
    }

    pub fn record(&self, tag: &[u8; 4], form_id: u32, fields: &[Vec<u8>]) -> Vec<u8> {
        self.record_raw(tag, form_id, 0, &fields.concat())
    }

    pub fn group(&self, label: u32, kind: i32, children: &[Vec<u8>]) -> Vec<u8> {
        let body = children.concat();
        let header = if self.rev == FormatRevision::Extended { 24 } else { 20 };
        let mut v = b"GRUP".to_vec();
        v.extend_from_slice(&((body.len() + header) as u32).to_le_bytes());
        v.extend_from_slice(&label.to_le_bytes());
        v.extend_from_slice(&kind.to_le_bytes());
        v.extend_from_slice(&0u32.to_le_bytes());
        if self.rev == FormatRevision::Extended {
            v.extend_from_slice(&0u32.to_le_bytes());
        }
        v.extend_from_slice(&body);
        v
    }

    /// Top-level group holding records of one type.
    pub fn top(&self, tag: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
        self.group(u32::from_le_bytes(*tag), 0, children)
    }

    pub fn root(&self) -> Vec<u8> {
        match self.rev {
            FormatRevision::Legacy => {
                let mut hedr = Vec::new();
                hedr.extend_from_slice(&1.3f32.to_le_bytes());
                hedr.extend_from_slice(&1u32.to_le_bytes());
                let mut author = b"fixture".to_vec();
                author.resize(32, 0);
                hedr.extend(author);
                hedr.extend(vec![0u8; 256]);
                hedr.extend_from_slice(&0u32.to_le_bytes());
                self.record(b"TES3", 0, &[self.field(b"HEDR", &hedr)])
            }
            _ => {
                let mut hedr = Vec::new();
                hedr.extend_from_slice(&1.0f32.to_le_bytes());
                hedr.extend_from_slice(&0u32.to_le_bytes());
                hedr.extend_from_slice(&0x800u32.to_le_bytes());
                self.record(b"TES4", 0, &[self.field(b"HEDR", &hedr), self.zstr(b"CNAM", "fixture")])
            }
        }
    }

    pub fn file(&self, chunks: &[Vec<u8>]) -> Vec<u8> {
        let mut v = self.root();
        v.extend(chunks.concat());
        v
    }

    pub fn glob(&self, form_id: u32, name: &str, value: f32) -> Vec<u8> {
        let edid = if self.rev == FormatRevision::Legacy { b"NAME" } else { b"EDID" };
        self.record(
            b"GLOB",
            form_id,
            &[self.zstr(edid, name), self.field(b"FNAM", b"f"), self.field(b"FLTV", &value.to_le_bytes())],
        )
    }

    pub fn cell(&self, form_id: u32, name: &str, grid: Option<(i32, i32)>, flags: u32) -> Vec<u8> {
        let mut fields = Vec::new();
        match self.rev {
            FormatRevision::Legacy => {
                fields.push(self.zstr(b"NAME", name));
                let (x, y) = grid.unwrap_or((0, 0));
                let mut data = flags.to_le_bytes().to_vec();
                data.extend_from_slice(&x.to_le_bytes());
                data.extend_from_slice(&y.to_le_bytes());
                fields.push(self.field(b"DATA", &data));
            }
            _ => {
                fields.push(self.zstr(b"EDID", name));
                fields.push(self.field(b"DATA", &(flags as u16).to_le_bytes()));
                if let Some((x, y)) = grid {
                    let mut xclc = x.to_le_bytes().to_vec();
                    xclc.extend_from_slice(&y.to_le_bytes());
                    fields.push(self.field(b"XCLC", &xclc));
                }
            }
        }
        self.record(b"CELL", form_id, &fields)
    }

    pub fn land(&self, form_id: u32, grid: Option<(i32, i32)>) -> Vec<u8> {
        let mut fields = vec![self.field(b"DATA", &1i32.to_le_bytes())];
        if let Some((x, y)) = grid {
            let mut intv = x.to_le_bytes().to_vec();
            intv.extend_from_slice(&y.to_le_bytes());
            fields.push(self.field(b"INTV", &intv));
        }
        self.record(b"LAND", form_id, &fields)
    }

    pub fn land_texture(&self, form_id: u32, name: &str, index: Option<u32>) -> Vec<u8> {
        let edid = if self.rev == FormatRevision::Legacy { b"NAME" } else { b"EDID" };
        let mut fields = vec![self.zstr(edid, name)];
        if let Some(i) = index {
            fields.push(self.field(b"INTV", &i.to_le_bytes()));
        }
        fields.push(self.zstr(b"ICON", "landscape\\grass.dds"));
        self.record(b"LTEX", form_id, &fields)
    }

    pub fn world(&self, form_id: u32, name: &str) -> Vec<u8> {
        self.record(b"WRLD", form_id, &[self.zstr(b"EDID", name), self.zstr(b"FULL", name)])
    }
}

// Group kinds as stored on disk.
pub const BY_TYPE: i32 = 0;
pub const WORLD: i32 = 1;
pub const INTERIOR_BLOCK: i32 = 2;
pub const INTERIOR_SUB_BLOCK: i32 = 3;
pub const EXTERIOR_BLOCK: i32 = 4;
pub const EXTERIOR_SUB_BLOCK: i32 = 5;
pub const CELL_GROUP: i32 = 6;
pub const TEMPORARY: i32 = 9;

/// One worldspace with exterior cells, each with a LAND in its temporary
/// children.  `cells` are `(form id, x, y)`.
pub fn world_file(fx: &Fx, world_id: u32, cells: &[(u32, i16, i16)]) -> Vec<u8> {
    use masterfile::spatial::{block_label, sub_block_label};
    use std::collections::BTreeMap;

    let mut blocks: BTreeMap<u32, BTreeMap<u32, Vec<Vec<u8>>>> = BTreeMap::new();
    for &(id, x, y) in cells {
        let temp = fx.group(id, TEMPORARY, &[fx.land(id + 1, None)]);
        let children = fx.group(id, CELL_GROUP, &[temp]);
        let entry = blocks
            .entry(block_label(x, y))
            .or_default()
            .entry(sub_block_label(x, y))
            .or_default();
        entry.push(fx.cell(id, &format!("Cell{id:X}"), Some((x as i32, y as i32)), 0));
        entry.push(children);
    }

    let block_groups: Vec<Vec<u8>> = blocks
        .into_iter()
        .map(|(b, subs)| {
            let subs: Vec<Vec<u8>> = subs
                .into_iter()
                .map(|(s, content)| fx.group(s, EXTERIOR_SUB_BLOCK, &content))
                .collect();
            fx.group(b, EXTERIOR_BLOCK, &subs)
        })
        .collect();

    fx.file(&[fx.top(
        b"WRLD",
        &[fx.world(world_id, "Tamriel"), fx.group(world_id, WORLD, &block_groups)],
    )])
}
