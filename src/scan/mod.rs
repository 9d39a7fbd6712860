//! Structure scan: walk every chunk header of a file without decoding records.
//!
//! # How it works
//!
//! The scanner reads forward from offset 0 and descends into every group,
//! keeping a stack of open group ends.  Record payloads are skipped using
//! their declared size; nothing is decompressed or decoded.  It needs no
//! record registry and builds no group tree.
//!
//! ## Problems
//!
//! | Problem | Meaning |
//! |---------|---------|
//! | `UnexpectedRoot` | First chunk is not the revision's root record |
//! | `Overrun` | A chunk claims bytes past its parent group (or the file) |
//! | `CorruptHeader` | A header could not be interpreted (e.g. unknown group type) |
//! | `Truncated` | The file ends inside a chunk header |
//!
//! Framing cannot be trusted past the first problem, so the scan stops there
//! and reports what it saw up to that point.  Only genuine I/O errors
//! propagate as `io::Error`.

use std::collections::BTreeMap;
use std::io::{self, Read, Seek};

use serde::Serialize;

use crate::cursor::ByteCursor;
use crate::error::EsmError;
use crate::header::ChunkHeader;
use crate::revision::FormatRevision;
use crate::tag::Tag;

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum ProblemKind {
    UnexpectedRoot { expected: Tag },
    /// The chunk ends at `declared_end` but its container ends at `limit`.
    Overrun { declared_end: u64, limit: u64 },
    CorruptHeader { reason: String },
    Truncated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanProblem {
    pub offset:  u64,
    pub tag:     Tag,
    pub problem: ProblemKind,
}

/// Complete report produced by [`scan`].
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub revision:           FormatRevision,
    pub file_len:           u64,
    /// Offset the scan reached (the file length when nothing went wrong).
    pub bytes_scanned:      u64,
    pub records_by_tag:     BTreeMap<Tag, u64>,
    /// Group counts keyed by the kind's name.
    pub groups_by_kind:     BTreeMap<String, u64>,
    pub max_depth:          usize,
    /// Sum of declared record payload sizes.
    pub record_bytes:       u64,
    pub compressed_records: u64,
    /// Bytes too short to hold a chunk header at the end of a group.
    pub padding_bytes:      u64,
    pub problems:           Vec<ScanProblem>,
}

impl ScanReport {
    fn new(revision: FormatRevision, file_len: u64) -> Self {
        Self {
            revision,
            file_len,
            bytes_scanned: 0,
            records_by_tag: BTreeMap::new(),
            groups_by_kind: BTreeMap::new(),
            max_depth: 0,
            record_bytes: 0,
            compressed_records: 0,
            padding_bytes: 0,
            problems: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn total_records(&self) -> u64 {
        self.records_by_tag.values().sum()
    }

    pub fn total_groups(&self) -> u64 {
        self.groups_by_kind.values().sum()
    }

    /// Summary line for display.
    pub fn summary(&self) -> String {
        format!(
            "{} scan: {} record(s) of {} type(s), {} group(s), depth {}, \
             {}/{} bytes walked, {} problem(s)",
            self.revision,
            self.total_records(),
            self.records_by_tag.len(),
            self.total_groups(),
            self.max_depth,
            self.bytes_scanned,
            self.file_len,
            self.problems.len(),
        )
    }
}

// ── Scanner ───────────────────────────────────────────────────────────────────

/// Walk the chunk structure of `reader` under `revision`.
///
/// Returns a [`ScanReport`] however damaged the framing is; see the module
/// docs for when the walk stops.
pub fn scan<R: Read + Seek>(reader: R, revision: FormatRevision) -> io::Result<ScanReport> {
    let mut cursor = ByteCursor::new(reader)?;
    let mut report = ScanReport::new(revision, cursor.len());
    let min_chunk = revision.record_header_size();
    let mut open: Vec<u64> = Vec::new();
    let mut first = true;

    loop {
        let pos = cursor.position();
        while open.last().is_some_and(|&end| end <= pos) {
            open.pop();
        }
        if cursor.at_end() {
            break;
        }
        let limit = open.last().copied().unwrap_or(cursor.len());
        if limit - pos < min_chunk {
            report.padding_bytes += limit - pos;
            cursor.seek(limit)?;
            continue;
        }

        let header = match ChunkHeader::read(&mut cursor, revision) {
            Ok(h) => h,
            Err(EsmError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                report.problems.push(ScanProblem { offset: pos, tag: Tag::default(), problem: ProblemKind::Truncated });
                break;
            }
            Err(EsmError::Io(e)) => return Err(e),
            Err(e) => {
                let tag = match &e {
                    EsmError::CorruptHeader { tag, .. } => *tag,
                    _ => Tag::default(),
                };
                report.problems.push(ScanProblem {
                    offset: e.offset().unwrap_or(pos),
                    tag,
                    problem: ProblemKind::CorruptHeader { reason: e.to_string() },
                });
                break;
            }
        };

        if first {
            first = false;
            if header.tag() != revision.root_tag() {
                report.problems.push(ScanProblem {
                    offset:  pos,
                    tag:     header.tag(),
                    problem: ProblemKind::UnexpectedRoot { expected: revision.root_tag() },
                });
                break;
            }
        }

        if header.end() > limit {
            report.problems.push(ScanProblem {
                offset:  pos,
                tag:     header.tag(),
                problem: ProblemKind::Overrun { declared_end: header.end(), limit },
            });
            break;
        }

        match header {
            ChunkHeader::Group(g) => {
                *report.groups_by_kind.entry(format!("{:?}", g.kind)).or_insert(0) += 1;
                open.push(g.end());
                report.max_depth = report.max_depth.max(open.len());
            }
            ChunkHeader::Record(r) => {
                *report.records_by_tag.entry(r.tag).or_insert(0) += 1;
                report.record_bytes += r.data_size as u64;
                if r.is_compressed() && revision.supports_compression() {
                    report.compressed_records += 1;
                }
                cursor.seek(r.end())?;
            }
        }
    }

    report.bytes_scanned = cursor.position().min(cursor.len());
    Ok(report)
}

/// Convenience: scan a file at `path`.
pub fn scan_file(path: &std::path::Path, revision: FormatRevision) -> io::Result<ScanReport> {
    let f = std::fs::File::open(path)?;
    scan(io::BufReader::new(f), revision)
}
