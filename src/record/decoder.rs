//! Record chunk → [`Record`].

use std::io::{Read, Seek};

use flate2::read::ZlibDecoder;

use crate::cursor::ByteCursor;
use crate::error::{EsmError, Result};
use crate::header::RecordHeader;
use crate::record::fields::FieldStream;
use crate::record::registry::DecoderRegistry;
use crate::record::{Record, RecordId};
use crate::revision::FormatRevision;

/// A record plus what decoding it revealed about unsupported fields.
#[derive(Debug, Clone)]
pub struct DecodedRecord {
    pub record:         Record,
    pub unknown_fields: u32,
}

/// Decode the record whose header was just read.  The cursor must sit on the
/// first payload byte.
///
/// Returns `Ok(None)` when the registry has no decoder for the type; the
/// payload is skipped.  On success or `None` the cursor ends at
/// `header.end()`; on error its position is unspecified and the caller must
/// seek.
pub fn decode_record<R: Read + Seek>(
    cursor:   &mut ByteCursor<R>,
    header:   RecordHeader,
    revision: FormatRevision,
    registry: &DecoderRegistry,
) -> Result<Option<DecodedRecord>> {
    let Some(decode) = registry.get(header.tag) else {
        cursor.seek(header.end())?;
        return Ok(None);
    };

    if cursor.remaining() < header.data_size as u64 {
        return Err(EsmError::RecordSizeMismatch {
            offset:   header.offset,
            tag:      header.tag,
            declared: header.data_size as u64,
            consumed: cursor.remaining(),
        });
    }
    let raw = cursor.read_bytes(header.data_size as usize)?;

    let (payload, base) = if header.is_compressed() && revision.supports_compression() {
        (inflate(&header, &raw)?, None)
    } else {
        (raw, Some(header.data_offset))
    };

    let mut stream = FieldStream::new(&payload, revision, header.tag, header.offset, base);
    let data = decode(&mut stream)?;
    let unknown_fields = stream.unknown_fields();

    let id = if revision.uses_named_ids() {
        RecordId::Named(data.editor_id().unwrap_or_default().to_owned())
    } else {
        RecordId::Numeric(header.form_id)
    };

    Ok(Some(DecodedRecord {
        record: Record { header, id, data },
        unknown_fields,
    }))
}

/// Upper bound on the initial buffer, as a multiple of the compressed size.
const MAX_INFLATE_RATIO: usize = 16;

/// `u32` inflated length, then a zlib stream.
fn inflate(header: &RecordHeader, raw: &[u8]) -> Result<Vec<u8>> {
    if raw.len() < 4 {
        return Err(EsmError::corrupt(
            header.offset,
            header.tag,
            format!("compressed payload of {} bytes has no length prefix", raw.len()),
        ));
    }
    let expected = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
    // The prefix is untrusted: size the buffer from what we hold and stop one
    // byte past the announced length, which is enough to detect a lie.
    let mut out = Vec::with_capacity(expected.min(raw.len().saturating_mul(MAX_INFLATE_RATIO)));
    ZlibDecoder::new(&raw[4..])
        .take(expected as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|source| EsmError::Decompression { offset: header.offset, tag: header.tag, source })?;
    if out.len() != expected {
        return Err(EsmError::corrupt(
            header.offset,
            header.tag,
            format!("inflated to {} bytes, header announced {expected}", out.len()),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    use super::*;
    use crate::header::{ChunkHeader, FLAG_COMPRESSED};
    use crate::record::RecordData;

    fn field(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut v = tag.to_vec();
        v.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        v.extend_from_slice(payload);
        v
    }

    fn record(tag: &[u8; 4], flags: u32, form_id: u32, payload: &[u8]) -> Vec<u8> {
        let mut v = tag.to_vec();
        v.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        v.extend_from_slice(&flags.to_le_bytes());
        v.extend_from_slice(&form_id.to_le_bytes());
        v.extend_from_slice(&0u32.to_le_bytes());
        v.extend_from_slice(payload);
        v
    }

    fn decode_bytes(bytes: &[u8]) -> Result<Option<DecodedRecord>> {
        let mut c = ByteCursor::from_slice(bytes);
        let ChunkHeader::Record(h) = ChunkHeader::read(&mut c, FormatRevision::Standard)? else {
            panic!("expected record");
        };
        decode_record(&mut c, h, FormatRevision::Standard, &DecoderRegistry::standard())
    }

    #[test]
    fn plain_record() {
        let mut payload = field(b"EDID", b"fVal\0");
        payload.extend(field(b"FNAM", b"f"));
        payload.extend(field(b"FLTV", &2.5f32.to_le_bytes()));
        let d = decode_bytes(&record(b"GLOB", 0, 0x42, &payload)).unwrap().unwrap();
        assert_eq!(d.record.id, RecordId::Numeric(0x42));
        assert_eq!(d.record.editor_id(), Some("fVal"));
        let RecordData::Global(g) = &d.record.data else { panic!() };
        assert_eq!(g.value, Some(2.5));
    }

    #[test]
    fn compressed_record_is_inflated() {
        let mut payload = field(b"EDID", b"Rock01\0");
        payload.extend(field(b"MODL", b"rocks\\rock01.nif\0"));
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&payload).unwrap();
        let mut body = (payload.len() as u32).to_le_bytes().to_vec();
        body.extend(enc.finish().unwrap());

        let d = decode_bytes(&record(b"STAT", FLAG_COMPRESSED, 7, &body)).unwrap().unwrap();
        let RecordData::Static(s) = &d.record.data else { panic!() };
        assert_eq!(s.model.as_ref().unwrap().path, "rocks\\rock01.nif");
    }

    #[test]
    fn wrong_inflated_length_is_corrupt() {
        let payload = field(b"EDID", b"x\0");
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&payload).unwrap();
        let mut body = 99u32.to_le_bytes().to_vec();
        body.extend(enc.finish().unwrap());
        let err = decode_bytes(&record(b"STAT", FLAG_COMPRESSED, 7, &body)).unwrap_err();
        assert!(matches!(err, EsmError::CorruptHeader { .. }));
    }

    #[test]
    fn inflation_stops_near_the_announced_length() {
        let payload = vec![0u8; 64 * 1024];
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::best());
        enc.write_all(&payload).unwrap();
        let stream = enc.finish().unwrap();

        let mut short = 16u32.to_le_bytes().to_vec();
        short.extend_from_slice(&stream);
        let err = decode_bytes(&record(b"STAT", FLAG_COMPRESSED, 7, &short)).unwrap_err();
        assert!(matches!(&err, EsmError::CorruptHeader { reason, .. } if reason.contains("inflated to 17 bytes")), "{err}");

        let mut huge = u32::MAX.to_le_bytes().to_vec();
        huge.extend_from_slice(&stream);
        let err = decode_bytes(&record(b"STAT", FLAG_COMPRESSED, 7, &huge)).unwrap_err();
        assert!(matches!(&err, EsmError::CorruptHeader { reason, .. } if reason.contains("inflated to 65536 bytes")), "{err}");
    }

    #[test]
    fn garbage_stream_is_a_decompression_error() {
        let mut body = 10u32.to_le_bytes().to_vec();
        body.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        let err = decode_bytes(&record(b"STAT", FLAG_COMPRESSED, 7, &body)).unwrap_err();
        assert!(matches!(err, EsmError::Decompression { .. }));
    }

    #[test]
    fn unknown_type_is_skipped_to_its_end() {
        let bytes = record(b"NPC_", 0, 1, &field(b"EDID", b"Bob\0"));
        let mut c = ByteCursor::from_slice(&bytes);
        let ChunkHeader::Record(h) = ChunkHeader::read(&mut c, FormatRevision::Standard).unwrap() else {
            panic!();
        };
        let end = h.end();
        assert!(decode_record(&mut c, h, FormatRevision::Standard, &DecoderRegistry::standard())
            .unwrap()
            .is_none());
        assert_eq!(c.position(), end);
    }
}
