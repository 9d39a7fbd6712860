//! Field-level decoding inside one record payload.
//!
//! [`FieldStream`] walks the field headers of an already-buffered record
//! payload and hands each field to a per-type callback as a bounded
//! [`Field`].  The callback either consumes the field completely
//! ([`FieldStep::Consumed`]) or declines it ([`FieldStep::Unknown`]), in which
//! case the stream logs it and skips its declared size.
//!
//! Two invariants are enforced here rather than in each decoder:
//! - a consumed field must have been read to exactly its declared end;
//! - the last field must end exactly at the record's declared end.
//!
//! Both failures are `RecordSizeMismatch`.

use std::io;

use byteorder::{ByteOrder, LittleEndian};
use log::debug;

use crate::cursor::{latin1, ByteCursor};
use crate::error::{EsmError, Result};
use crate::header::FieldHeader;
use crate::record::RecordId;
use crate::revision::FormatRevision;
use crate::tag::Tag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStep {
    Consumed,
    Unknown,
}

pub struct FieldStream<'a> {
    data:           &'a [u8],
    revision:       FormatRevision,
    record:         Tag,
    /// Offset of the record header, used when payload offsets are not
    /// file offsets (inflated payloads).
    record_offset:  u64,
    /// File offset of `data[0]`; `None` for inflated payloads.
    base:           Option<u64>,
    unknown_fields: u32,
}

impl<'a> FieldStream<'a> {
    pub fn new(
        data:          &'a [u8],
        revision:      FormatRevision,
        record:        Tag,
        record_offset: u64,
        base:          Option<u64>,
    ) -> Self {
        Self { data, revision, record, record_offset, base, unknown_fields: 0 }
    }

    pub fn revision(&self) -> FormatRevision {
        self.revision
    }

    pub fn record_tag(&self) -> Tag {
        self.record
    }

    /// Fields declined by the callback so far.
    pub fn unknown_fields(&self) -> u32 {
        self.unknown_fields
    }

    fn absolute(&self, local: u64) -> u64 {
        match self.base {
            Some(base) => base + local,
            None       => self.record_offset,
        }
    }

    fn record_mismatch(&self, at: u64, consumed: u64) -> EsmError {
        EsmError::RecordSizeMismatch {
            offset:   self.absolute(at),
            tag:      self.record,
            declared: self.data.len() as u64,
            consumed,
        }
    }

    /// Run `on_field` over every field of the payload, in order.
    pub fn decode<F>(&mut self, mut on_field: F) -> Result<()>
    where
        F: FnMut(&mut Field<'a>) -> Result<FieldStep>,
    {
        let data = self.data;
        let declared = data.len() as u64;
        let mut cursor = ByteCursor::from_slice(data);

        while !cursor.at_end() {
            let at = cursor.position();
            if cursor.remaining() < self.revision.field_header_size() {
                return Err(self.record_mismatch(at, at + self.revision.field_header_size()));
            }
            let header = match FieldHeader::read(&mut cursor, self.revision) {
                Ok(h) => h,
                Err(EsmError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(self.record_mismatch(at, declared + 1));
                }
                Err(EsmError::CorruptHeader { reason, tag, .. }) => {
                    return Err(EsmError::corrupt(self.absolute(at), tag, reason));
                }
                Err(e) => return Err(e),
            };

            let start = cursor.position();
            let end = start + header.data_size as u64;
            if end > declared {
                return Err(self.record_mismatch(at, end));
            }

            let mut field = Field {
                tag:      header.tag,
                data:     &data[start as usize..end as usize],
                pos:      0,
                offset:   self.absolute(start),
                revision: self.revision,
                record:   self.record,
            };
            match on_field(&mut field)? {
                FieldStep::Consumed => {
                    if field.pos != field.data.len() {
                        return Err(EsmError::RecordSizeMismatch {
                            offset:   field.offset,
                            tag:      self.record,
                            declared: field.data.len() as u64,
                            consumed: field.pos as u64,
                        });
                    }
                }
                FieldStep::Unknown => {
                    debug!(
                        "skipping unknown field {}:{} ({} bytes) at offset {}",
                        self.record, header.tag, header.data_size, field.offset
                    );
                    self.unknown_fields += 1;
                }
            }
            cursor.seek(end)?;
        }
        Ok(())
    }
}

/// One field's payload, bounded to its declared size.
///
/// Every read fails with `RecordSizeMismatch` rather than running into the
/// next field.
pub struct Field<'a> {
    pub tag:  Tag,
    data:     &'a [u8],
    pos:      usize,
    offset:   u64,
    revision: FormatRevision,
    record:   Tag,
}

impl<'a> Field<'a> {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn revision(&self) -> FormatRevision {
        self.revision
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Error for a payload whose shape is invalid for this field.
    pub fn corrupt(&self, reason: impl Into<String>) -> EsmError {
        EsmError::corrupt(self.offset, self.tag, reason)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(EsmError::RecordSizeMismatch {
                offset:   self.offset,
                tag:      self.record,
                declared: self.data.len() as u64,
                consumed: (self.pos + n) as u64,
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    pub fn skip_rest(&mut self) {
        self.pos = self.data.len();
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn i16(&mut self) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.take(2)?))
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn i64(&mut self) -> Result<i64> {
        Ok(LittleEndian::read_i64(self.take(8)?))
    }

    pub fn f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    pub fn f32x3(&mut self) -> Result<[f32; 3]> {
        Ok([self.f32()?, self.f32()?, self.f32()?])
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    pub fn rest(&mut self) -> &'a [u8] {
        let out = &self.data[self.pos..];
        self.pos = self.data.len();
        out
    }

    /// The rest of the field as a string ending at the first NUL.
    pub fn string(&mut self) -> String {
        let bytes = self.rest();
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
        latin1(&bytes[..end])
    }

    /// Exactly `n` bytes holding a NUL-padded string.
    pub fn fixed_string(&mut self, n: usize) -> Result<String> {
        let bytes = self.take(n)?;
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(n);
        Ok(latin1(&bytes[..end]))
    }

    /// Integer whose width is the field size (1, 2, 4 or 8 bytes).
    pub fn sized_int(&mut self) -> Result<i64> {
        match self.remaining() {
            1 => Ok(self.u8()? as i64),
            2 => Ok(self.i16()? as i64),
            4 => Ok(self.i32()? as i64),
            8 => self.i64(),
            n => Err(self.corrupt(format!("integer field of unsupported width {n}"))),
        }
    }

    /// A reference to another record: four bytes are a form id, anything
    /// else is a record name.
    pub fn record_ref(&mut self) -> Result<RecordId> {
        if self.remaining() == 4 {
            Ok(RecordId::Numeric(self.u32()?))
        } else {
            Ok(RecordId::Named(self.string()))
        }
    }

    /// A run of packed form ids filling the field.
    pub fn form_ids(&mut self) -> Result<Vec<RecordId>> {
        if self.remaining() % 4 != 0 {
            return Err(self.corrupt(format!("{} bytes is not a whole number of form ids", self.remaining())));
        }
        let mut out = Vec::with_capacity(self.remaining() / 4);
        while self.remaining() > 0 {
            out.push(RecordId::Numeric(self.u32()?));
        }
        Ok(out)
    }
}
