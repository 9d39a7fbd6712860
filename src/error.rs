//! Error taxonomy for master-file decoding.
//!
//! Framing errors (`UnexpectedRootTag`, `UnexpectedGroupTag`) abort the whole
//! archive.  Record-level errors (`CorruptHeader`, `RecordSizeMismatch`,
//! `Decompression`) abort only the record that raised them when the caller's
//! [`CorruptRecordPolicy`](crate::archive::CorruptRecordPolicy) is `Skip`.
//!
//! Unknown record types and unknown field tags are not errors at all; they are
//! logged and counted in [`Diagnostics`](crate::archive::Diagnostics).

use std::io;
use thiserror::Error;

use crate::group::GroupId;
use crate::tag::Tag;

#[derive(Error, Debug)]
pub enum EsmError {
    #[error("unexpected root record {found} at offset {offset} (expected {expected})")]
    UnexpectedRootTag { offset: u64, expected: Tag, found: Tag },

    #[error("expected GRUP at offset {offset}, found {found}")]
    UnexpectedGroupTag { offset: u64, found: Tag },

    #[error("corrupt header {tag} at offset {offset}: {reason}")]
    CorruptHeader { offset: u64, tag: Tag, reason: String },

    #[error("record {tag} at offset {offset} declares {declared} bytes but {consumed} were consumed")]
    RecordSizeMismatch { offset: u64, tag: Tag, declared: u64, consumed: u64 },

    #[error("failed to inflate compressed record {tag} at offset {offset}: {source}")]
    Decompression {
        offset: u64,
        tag:    Tag,
        #[source]
        source: io::Error,
    },

    #[error("unknown game identifier: {0}")]
    UnknownGame(String),

    #[error("unknown format revision: {0}")]
    UnknownRevision(String),

    #[error("group handle {0:?} does not belong to this archive")]
    UnknownGroup(GroupId),

    #[error("invalid read options: {0}")]
    Options(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl EsmError {
    pub(crate) fn corrupt(offset: u64, tag: Tag, reason: impl Into<String>) -> Self {
        EsmError::CorruptHeader { offset, tag, reason: reason.into() }
    }

    /// True for failures confined to a single record, which the skip policy
    /// may swallow without losing the rest of the group.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            EsmError::CorruptHeader { .. }
                | EsmError::RecordSizeMismatch { .. }
                | EsmError::Decompression { .. }
        )
    }

    /// Byte offset the error refers to, when it has one.
    pub fn offset(&self) -> Option<u64> {
        match self {
            EsmError::UnexpectedRootTag { offset, .. }
            | EsmError::UnexpectedGroupTag { offset, .. }
            | EsmError::CorruptHeader { offset, .. }
            | EsmError::RecordSizeMismatch { offset, .. }
            | EsmError::Decompression { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

pub type Result<T, E = EsmError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag;

    #[test]
    fn record_level_classification() {
        assert!(EsmError::corrupt(10, tag::XXXX, "bad extender").is_record_level());
        assert!(EsmError::RecordSizeMismatch { offset: 0, tag: tag::CELL, declared: 4, consumed: 5 }
            .is_record_level());
        assert!(!EsmError::UnexpectedGroupTag { offset: 0, found: tag::CELL }.is_record_level());
        assert!(!EsmError::Io(io::Error::from(io::ErrorKind::UnexpectedEof)).is_record_level());
    }

    #[test]
    fn messages_carry_offset_and_tag() {
        let e = EsmError::UnexpectedRootTag { offset: 0, expected: tag::TES4, found: tag::TES3 };
        let msg = e.to_string();
        assert!(msg.contains("TES3") && msg.contains("TES4") && msg.contains("offset 0"));
        assert_eq!(e.offset(), Some(0));
    }
}
