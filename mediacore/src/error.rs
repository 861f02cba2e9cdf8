//! The closed error set from spec §7.

use thiserror::Error;

use crate::media_type::MediaType;

/// All internal error kinds the playback core can raise. Priority and seek
/// commands never propagate these to the caller (spec §7); they are logged
/// and turned into failure flags instead. Direct commands surface them
/// through the awaited result and `on_media_failed`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A demuxer/codec-level failure surfaced by the container.
    #[error("media container error: {0}")]
    MediaContainerError(String),

    /// `open` completed without producing at least one of an audio or video
    /// component.
    #[error("open failed: no audio or video component present")]
    OpenFailed,

    /// The request reached the command manager in a state that forbids it.
    /// Returned as a refusal result, never raised as a panic or a thrown
    /// exception.
    #[error("command not permitted in the current state: {0}")]
    InvalidCommand(&'static str),

    /// The requested seek target landed outside every component's block
    /// range after best-effort decoding. The result is clamped and this is
    /// logged as a warning, not surfaced to the caller.
    #[error("seek target out of range")]
    SeekOutOfRange,

    /// Side-loaded subtitles were requested but could not be fetched or
    /// parsed. Logged as a warning; playback continues without them.
    #[error("subtitle preload failed for {media_type}: {reason}")]
    SubtitlePreloadFailed {
        media_type: MediaType,
        reason: String,
    },
}
