//! Format revisions and the pure rules derived from them.
//!
//! The revision is never sniffed from the file: it is chosen by whoever knows
//! which game produced the archive, usually via [`FormatRevision::for_game`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EsmError;
use crate::tag::{self, Tag};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FormatRevision {
    /// Flat record stream, string-keyed records, 32-bit field sizes.
    Legacy,
    /// Grouped records, numeric form ids, 16-bit field sizes.
    #[default]
    Standard,
    /// As `Standard` with 4 extra bytes in every record and group header.
    Extended,
}

impl FormatRevision {
    /// Map a game identifier (as used by the game catalogue) to a revision.
    pub fn for_game(game: &str) -> Result<Self, EsmError> {
        match game {
            "Morrowind" => Ok(FormatRevision::Legacy),
            "Oblivion" | "Fallout3" | "FalloutNV" => Ok(FormatRevision::Standard),
            "Skyrim" | "SkyrimSE" | "SkyrimVR" | "Fallout4" | "Fallout4VR" => {
                Ok(FormatRevision::Extended)
            }
            other => Err(EsmError::UnknownGame(other.to_owned())),
        }
    }

    /// Size of a field header: tag plus a u32 (Legacy) or u16 size.
    pub const fn field_header_size(self) -> u64 {
        match self {
            FormatRevision::Legacy => 8,
            FormatRevision::Standard | FormatRevision::Extended => 6,
        }
    }

    /// Size of a record header including its tag and size.
    pub const fn record_header_size(self) -> u64 {
        match self {
            FormatRevision::Legacy   => 16,
            FormatRevision::Standard => 20,
            FormatRevision::Extended => 24,
        }
    }

    /// Size of a group header.  Legacy archives have no groups.
    pub const fn group_header_size(self) -> Option<u64> {
        match self {
            FormatRevision::Legacy   => None,
            FormatRevision::Standard => Some(20),
            FormatRevision::Extended => Some(24),
        }
    }

    /// Legacy records are identified by name, later revisions by form id.
    pub const fn uses_named_ids(self) -> bool {
        matches!(self, FormatRevision::Legacy)
    }

    /// Whether record payloads may be zlib-compressed.
    pub const fn supports_compression(self) -> bool {
        !matches!(self, FormatRevision::Legacy)
    }

    /// Tag the first record of the archive must carry.
    pub const fn root_tag(self) -> Tag {
        match self {
            FormatRevision::Legacy => tag::TES3,
            FormatRevision::Standard | FormatRevision::Extended => tag::TES4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FormatRevision::Legacy   => "legacy",
            FormatRevision::Standard => "standard",
            FormatRevision::Extended => "extended",
        }
    }
}

impl fmt::Display for FormatRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FormatRevision {
    type Err = EsmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "legacy" | "tes3"   => Ok(FormatRevision::Legacy),
            "standard" | "tes4" => Ok(FormatRevision::Standard),
            "extended" | "tes5" => Ok(FormatRevision::Extended),
            _ => Err(EsmError::UnknownRevision(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn games_map_to_revisions() {
        assert_eq!(FormatRevision::for_game("Morrowind").unwrap(), FormatRevision::Legacy);
        assert_eq!(FormatRevision::for_game("FalloutNV").unwrap(), FormatRevision::Standard);
        assert_eq!(FormatRevision::for_game("SkyrimSE").unwrap(), FormatRevision::Extended);
        assert!(matches!(FormatRevision::for_game("Daggerfall"), Err(EsmError::UnknownGame(_))));
    }

    #[test]
    fn header_widths() {
        assert_eq!(FormatRevision::Legacy.field_header_size(), 8);
        assert_eq!(FormatRevision::Standard.field_header_size(), 6);
        assert_eq!(FormatRevision::Extended.field_header_size(), 6);
        assert_eq!(FormatRevision::Legacy.group_header_size(), None);
        assert_eq!(FormatRevision::Extended.group_header_size(), Some(24));
    }

    #[test]
    fn parse_and_display() {
        for rev in [FormatRevision::Legacy, FormatRevision::Standard, FormatRevision::Extended] {
            assert_eq!(rev.to_string().parse::<FormatRevision>().unwrap(), rev);
        }
        assert_eq!("TES4".parse::<FormatRevision>().unwrap(), FormatRevision::Standard);
        assert!("tes9".parse::<FormatRevision>().is_err());
    }
}
