//! Lazy, revision-aware reader for chunked game master files (ESM/ESP).
//!
//! Opening an [`Archive`] reads only the root record and the framing of the
//! top-level groups.  Groups are parsed on first use, one level at a time,
//! and [`Archive::ensure_cell`] walks just the path to one grid cell.

pub mod archive;
pub mod batch;
pub mod cursor;
pub mod error;
pub mod group;
pub mod header;
pub mod index;
pub mod record;
pub mod revision;
pub mod scan;
pub mod spatial;
pub mod tag;

pub use archive::{Archive, ArchiveView, CorruptRecordPolicy, Diagnostics, ReadOptions};
pub use error::{EsmError, Result};
pub use group::{GroupId, RecordHandle};
pub use header::GroupKind;
pub use index::CrossReferences;
pub use record::{DecoderRegistry, Record, RecordData, RecordId};
pub use revision::FormatRevision;
pub use spatial::{CellHandle, SpatialKey, EXTERIOR_LAYER, INTERIOR_LAYER};
pub use tag::Tag;
