//! Positioned reader over an archive's bytes.
//!
//! [`ByteCursor`] wraps any `Read + Seek` and tracks its own position so that
//! hot paths never ask the OS where they are.  Every primitive read bumps a
//! read-call counter; the memoisation guarantees of the group tree are tested
//! against that counter rather than against decoded results.
//!
//! # Endianness
//! All multi-byte values are little-endian.  No runtime negotiation is ever
//! performed.

use std::io::{self, Cursor, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::tag::Tag;

pub struct ByteCursor<R> {
    inner:      R,
    pos:        u64,
    len:        u64,
    read_calls: u64,
}

impl<'a> ByteCursor<Cursor<&'a [u8]>> {
    /// Cursor over an in-memory slice; cannot fail.
    pub fn from_slice(data: &'a [u8]) -> Self {
        Self {
            inner:      Cursor::new(data),
            pos:        0,
            len:        data.len() as u64,
            read_calls: 0,
        }
    }
}

impl<R: Read + Seek> ByteCursor<R> {
    /// Wrap `inner`, measuring its length and rewinding it to offset 0.
    pub fn new(mut inner: R) -> io::Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self { inner, pos: 0, len, read_calls: 0 })
    }

    // ── Position ─────────────────────────────────────────────────────────────

    #[inline]
    pub fn position(&self) -> u64 { self.pos }

    #[inline]
    pub fn len(&self) -> u64 { self.len }

    #[inline]
    pub fn is_empty(&self) -> bool { self.len == 0 }

    #[inline]
    pub fn remaining(&self) -> u64 { self.len.saturating_sub(self.pos) }

    #[inline]
    pub fn at_end(&self) -> bool { self.pos >= self.len }

    /// Number of primitive reads issued so far (peeks included).
    pub fn read_calls(&self) -> u64 { self.read_calls }

    pub fn seek(&mut self, pos: u64) -> io::Result<()> {
        if pos != self.pos {
            self.inner.seek(SeekFrom::Start(pos))?;
            self.pos = pos;
        }
        Ok(())
    }

    pub fn skip(&mut self, n: u64) -> io::Result<()> {
        self.seek(self.pos + n)
    }

    fn ensure(&self, n: u64) -> io::Result<()> {
        if self.remaining() < n {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("need {n} bytes at offset {}, {} available", self.pos, self.remaining()),
            ));
        }
        Ok(())
    }

    #[inline]
    fn advance(&mut self, n: u64) {
        self.pos += n;
        self.read_calls += 1;
    }

    // ── Primitive reads ──────────────────────────────────────────────────────

    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.ensure(1)?;
        let v = self.inner.read_u8()?;
        self.advance(1);
        Ok(v)
    }

    pub fn read_i8(&mut self) -> io::Result<i8> {
        self.ensure(1)?;
        let v = self.inner.read_i8()?;
        self.advance(1);
        Ok(v)
    }

    pub fn read_u16(&mut self) -> io::Result<u16> {
        self.ensure(2)?;
        let v = self.inner.read_u16::<LittleEndian>()?;
        self.advance(2);
        Ok(v)
    }

    pub fn read_i16(&mut self) -> io::Result<i16> {
        self.ensure(2)?;
        let v = self.inner.read_i16::<LittleEndian>()?;
        self.advance(2);
        Ok(v)
    }

    pub fn read_u32(&mut self) -> io::Result<u32> {
        self.ensure(4)?;
        let v = self.inner.read_u32::<LittleEndian>()?;
        self.advance(4);
        Ok(v)
    }

    pub fn read_i32(&mut self) -> io::Result<i32> {
        self.ensure(4)?;
        let v = self.inner.read_i32::<LittleEndian>()?;
        self.advance(4);
        Ok(v)
    }

    pub fn read_u64(&mut self) -> io::Result<u64> {
        self.ensure(8)?;
        let v = self.inner.read_u64::<LittleEndian>()?;
        self.advance(8);
        Ok(v)
    }

    pub fn read_i64(&mut self) -> io::Result<i64> {
        self.ensure(8)?;
        let v = self.inner.read_i64::<LittleEndian>()?;
        self.advance(8);
        Ok(v)
    }

    pub fn read_f32(&mut self) -> io::Result<f32> {
        self.ensure(4)?;
        let v = self.inner.read_f32::<LittleEndian>()?;
        self.advance(4);
        Ok(v)
    }

    pub fn read_tag(&mut self) -> io::Result<Tag> {
        let mut b = [0u8; 4];
        self.read_into(&mut b)?;
        Ok(Tag(b))
    }

    /// Read a tag without advancing.
    pub fn peek_tag(&mut self) -> io::Result<Tag> {
        let start = self.pos;
        let tag = self.read_tag()?;
        self.inner.seek(SeekFrom::Start(start))?;
        self.pos = start;
        Ok(tag)
    }

    pub fn read_into(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.ensure(buf.len() as u64)?;
        self.inner.read_exact(buf)?;
        self.advance(buf.len() as u64);
        Ok(())
    }

    pub fn read_bytes(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.read_into(&mut buf)?;
        Ok(buf)
    }

    // ── Strings ──────────────────────────────────────────────────────────────

    /// Fixed-width string: exactly `n` bytes are consumed, the value ends at
    /// the first NUL.  Bytes are decoded as Windows-1252-compatible Latin-1.
    pub fn read_zstring(&mut self, n: usize) -> io::Result<String> {
        let bytes = self.read_bytes(n)?;
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
        Ok(latin1(&bytes[..end]))
    }

    /// String prefixed by a u8 length, optionally NUL terminated inside it.
    pub fn read_bstring(&mut self) -> io::Result<String> {
        let n = self.read_u8()? as usize;
        self.read_zstring(n)
    }
}

/// Archive strings are single-byte code pages, never UTF-8.
pub fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
