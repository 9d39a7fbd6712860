//! Per-archive read configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::revision::FormatRevision;
use crate::tag::Tag;

/// What to do with a record whose fields are structurally broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptRecordPolicy {
    /// Propagate the error and abandon the load.
    Fail,
    /// Log it, note it in the diagnostics, and carry on with the next chunk.
    #[default]
    Skip,
}

/// Configuration for [`Archive::open`](super::Archive::open).
///
/// ```
/// use masterfile::archive::{CorruptRecordPolicy, ReadOptions};
/// use masterfile::FormatRevision;
///
/// let opts = ReadOptions::for_game("Skyrim").unwrap();
/// assert_eq!(opts.revision().unwrap(), FormatRevision::Extended);
/// assert_eq!(opts.on_corrupt_record, CorruptRecordPolicy::Skip);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    pub revision:          FormatRevision,
    /// Game identifier; when set it overrides `revision`.
    pub game:              Option<String>,
    /// Top-level group labels to rewrite as they are read, `(on disk, wanted)`.
    /// Some game builds store two record types under each other's label.
    pub label_remap:       Vec<(Tag, Tag)>,
    pub on_corrupt_record: CorruptRecordPolicy,
    /// Reject root tags that are not in the known-tag table with
    /// `CorruptHeader` rather than `UnexpectedRootTag`.
    pub strict_root:       bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            revision:          FormatRevision::Standard,
            game:              None,
            label_remap:       Vec::new(),
            on_corrupt_record: CorruptRecordPolicy::Skip,
            strict_root:       true,
        }
    }
}

impl ReadOptions {
    pub fn new(revision: FormatRevision) -> Self {
        Self { revision, ..Self::default() }
    }

    pub fn for_game(game: &str) -> Result<Self> {
        let revision = FormatRevision::for_game(game)?;
        Ok(Self { revision, game: Some(game.to_owned()), ..Self::default() })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn with_policy(mut self, policy: CorruptRecordPolicy) -> Self {
        self.on_corrupt_record = policy;
        self
    }

    pub fn with_remap(mut self, on_disk: Tag, wanted: Tag) -> Self {
        self.label_remap.push((on_disk, wanted));
        self
    }

    /// The effective revision: the game's, if one is named.
    pub fn revision(&self) -> Result<FormatRevision> {
        match &self.game {
            Some(game) => FormatRevision::for_game(game),
            None => Ok(self.revision),
        }
    }

    /// Apply the remap table to a top-level label.
    pub fn remap_label(&self, label: u32) -> u32 {
        let tag = Tag::from_label(label);
        self.label_remap
            .iter()
            .find(|(from, _)| *from == tag)
            .map_or(label, |(_, to)| to.as_label())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::error::EsmError;
    use crate::tag;

    #[test]
    fn defaults() {
        let o = ReadOptions::default();
        assert_eq!(o.revision().unwrap(), FormatRevision::Standard);
        assert_eq!(o.on_corrupt_record, CorruptRecordPolicy::Skip);
        assert!(o.strict_root);
    }

    #[test]
    fn unknown_game_is_rejected() {
        assert!(matches!(ReadOptions::for_game("Daggerfall"), Err(EsmError::UnknownGame(_))));
    }

    #[test]
    fn remap_swaps_only_listed_labels() {
        let o = ReadOptions::default()
            .with_remap(tag::LEVI, tag::LEVC)
            .with_remap(tag::LEVC, tag::LEVI);
        assert_eq!(o.remap_label(tag::LEVI.as_label()), tag::LEVC.as_label());
        assert_eq!(o.remap_label(tag::LEVC.as_label()), tag::LEVI.as_label());
        assert_eq!(o.remap_label(tag::CELL.as_label()), tag::CELL.as_label());
    }

    #[test]
    fn json_file_with_partial_fields() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{ "game": "Morrowind", "on_corrupt_record": "fail", "label_remap": [["LEVI", "LEVC"]] }}"#)
            .unwrap();
        let o = ReadOptions::from_json_file(f.path()).unwrap();
        assert_eq!(o.revision().unwrap(), FormatRevision::Legacy);
        assert_eq!(o.on_corrupt_record, CorruptRecordPolicy::Fail);
        assert_eq!(o.label_remap, vec![(tag::LEVI, tag::LEVC)]);
        assert!(o.strict_root);
    }

    #[test]
    fn malformed_json_is_an_options_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{{ not json").unwrap();
        assert!(matches!(ReadOptions::from_json_file(f.path()), Err(EsmError::Options(_))));
    }
}
