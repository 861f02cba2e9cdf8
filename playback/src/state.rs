//! The direct-command state machine (spec §4.1, "State machine (direct
//! command slot)").

use std::fmt;

/// The media state observed by `on_media_state_changed`.
///
/// ```text
/// Idle ──open──▶ Opening ──success──▶ Open(Stop)
///                    │
///                    └──failure──▶ Idle
/// Open ──close──▶ Closing ──▶ Idle
/// Open ──change──▶ Changing ──▶ Open(Play|Pause)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaState {
    Idle,
    Opening,
    Closing,
    Changing,
    Open(PlaybackState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stop,
    Play,
    Pause,
}

impl MediaState {
    #[must_use]
    pub fn is_open(self) -> bool {
        matches!(self, MediaState::Open(_))
    }

    #[must_use]
    pub fn playback(self) -> Option<PlaybackState> {
        match self {
            MediaState::Open(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Display for MediaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaState::Idle => write!(f, "Idle"),
            MediaState::Opening => write!(f, "Opening"),
            MediaState::Closing => write!(f, "Closing"),
            MediaState::Changing => write!(f, "Changing"),
            MediaState::Open(p) => write!(f, "Open({p:?})"),
        }
    }
}
