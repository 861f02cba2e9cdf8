//! [`MediaType`] tags every block, buffer, clock and renderer in the core.

use std::fmt;

/// Tagged variant identifying which component a piece of data belongs to.
///
/// `None` is the sentinel used throughout the core to mean "the reference
/// component" or "apply to all applicable components", per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MediaType {
    Audio,
    Video,
    Subtitle,
    /// Sentinel: "reference/all".
    None,
}

impl MediaType {
    /// The three concrete media types, in the order the worker set visits
    /// them for per-type operations.
    pub const ALL: [MediaType; 3] = [MediaType::Audio, MediaType::Video, MediaType::Subtitle];

    #[must_use]
    pub fn is_concrete(self) -> bool {
        !matches!(self, MediaType::None)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MediaType::Audio => "audio",
            MediaType::Video => "video",
            MediaType::Subtitle => "subtitle",
            MediaType::None => "none",
        };
        f.write_str(s)
    }
}
