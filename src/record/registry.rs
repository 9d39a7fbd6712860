//! Record-type registry: type tag → decode function.
//!
//! The registry is archive-scoped.  Each [`Archive`](crate::archive::Archive)
//! holds its own (shared by `Arc`), so two archives opened with different
//! registries never see each other's decoders.  There is no process-wide
//! table.

use std::collections::HashMap;

use crate::error::Result;
use crate::record::fields::FieldStream;
use crate::record::{catalog, world, RecordData};
use crate::tag::{self, Tag};

/// Decodes the fields of one record.  The stream has already been bounded to
/// the record's payload.
pub type DecodeFn = fn(&mut FieldStream<'_>) -> Result<RecordData>;

#[derive(Clone)]
pub struct DecoderRegistry {
    decoders: HashMap<Tag, DecodeFn>,
}

impl DecoderRegistry {
    /// A registry that knows no record types at all.
    pub fn empty() -> Self {
        Self { decoders: HashMap::new() }
    }

    /// The built-in catalogue.
    pub fn standard() -> Self {
        let mut r = Self::empty();
        r.register(tag::TES3, catalog::decode_file_header);
        r.register(tag::TES4, catalog::decode_file_header);
        r.register(tag::CELL, world::decode_cell);
        r.register(tag::LAND, world::decode_land);
        r.register(tag::LTEX, world::decode_land_texture);
        r.register(tag::WRLD, world::decode_world);
        r.register(tag::REFR, world::decode_reference);
        r.register(tag::STAT, catalog::decode_static);
        r.register(tag::GLOB, catalog::decode_global);
        r.register(tag::GMST, catalog::decode_game_setting);
        r.register(tag::LEVI, catalog::decode_leveled_list);
        r.register(tag::LEVC, catalog::decode_leveled_list);
        r.register(tag::LVLI, catalog::decode_leveled_list);
        r.register(tag::LVLC, catalog::decode_leveled_list);
        r.register(tag::CSTY, catalog::decode_combat_style);
        r
    }

    /// Install `decode` for `tag`, returning the decoder it replaced.
    pub fn register(&mut self, tag: Tag, decode: DecodeFn) -> Option<DecodeFn> {
        self.decoders.insert(tag, decode)
    }

    pub fn unregister(&mut self, tag: Tag) -> Option<DecodeFn> {
        self.decoders.remove(&tag)
    }

    pub fn get(&self, tag: Tag) -> Option<DecodeFn> {
        self.decoders.get(&tag).copied()
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.decoders.contains_key(&tag)
    }

    /// Registered tags in sorted order.
    pub fn tags(&self) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self.decoders.keys().copied().collect();
        tags.sort();
        tags
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.tags()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldStep;

    fn decode_nothing(stream: &mut FieldStream<'_>) -> Result<RecordData> {
        stream.decode(|_| Ok(FieldStep::Unknown))?;
        Ok(RecordData::custom(()))
    }

    #[test]
    fn standard_catalogue() {
        let r = DecoderRegistry::standard();
        for t in [tag::TES4, tag::CELL, tag::LAND, tag::WRLD, tag::CSTY, tag::LVLI] {
            assert!(r.contains(t), "{t} missing");
        }
        assert!(!r.contains(Tag(*b"NPC_")));
    }

    #[test]
    fn register_replaces_and_reports() {
        let mut r = DecoderRegistry::empty();
        assert!(r.register(tag::STAT, decode_nothing).is_none());
        assert!(r.register(tag::STAT, decode_nothing).is_some());
        assert_eq!(r.tags(), vec![tag::STAT]);
        assert!(r.unregister(tag::STAT).is_some());
        assert!(r.get(tag::STAT).is_none());
    }
}
