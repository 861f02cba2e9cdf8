//! A decoded, presentable unit of one media type (spec §3, "MediaBlock").

use std::sync::Arc;
use std::time::Duration;

use crate::media_type::MediaType;

/// Media-specific payload carried by a [`MediaBlock`].
///
/// Pixel-format conversion and audio resampling are explicitly out of
/// scope (spec §1 Non-goals); the payload is whatever shape the decoder
/// collaborator already produced.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Decoded pixel data for one video frame, plus the geometry the
    /// rendering worker is allowed to update dynamically (spec §4.5 step 5).
    Video {
        pixels: Arc<[u8]>,
        width: u32,
        height: u32,
        /// A still image packaged as a single video frame; requires
        /// repeated rendering (spec glossary, "Attached picture").
        is_attached_picture: bool,
        timecode: Option<String>,
        is_closed_caption: bool,
    },
    /// Decoded PCM samples for one audio block.
    Audio { samples: Arc<[f32]>, channels: u16 },
    /// Subtitle text ready for the renderer, already delay-adjusted.
    Subtitle { text: Arc<str> },
}

impl Payload {
    #[must_use]
    pub fn media_type(&self) -> MediaType {
        match self {
            Payload::Video { .. } => MediaType::Video,
            Payload::Audio { .. } => MediaType::Audio,
            Payload::Subtitle { .. } => MediaType::Subtitle,
        }
    }
}

/// A decoded presentation unit, owned by its [`MediaBlockBuffer`](crate::block_buffer::MediaBlockBuffer).
///
/// Handing a block to a renderer passes a shared, read-only [`Arc`] clone
/// for the duration of rendering; the buffer that owns it may evict it
/// concurrently without invalidating a renderer still holding a clone.
#[derive(Debug, Clone)]
pub struct MediaBlock {
    pub start_time: Duration,
    pub end_time: Duration,
    /// Monotonic insertion index, assigned by the buffer that owns this
    /// block. Used to detect "the same block rendered twice in a row"
    /// during de-duplication (spec §4.5 step 5).
    pub index: u64,
    pub payload: Payload,
}

impl MediaBlock {
    #[must_use]
    pub fn new(start_time: Duration, end_time: Duration, index: u64, payload: Payload) -> Self {
        Self {
            start_time,
            end_time,
            index,
            payload,
        }
    }

    #[must_use]
    pub fn media_type(&self) -> MediaType {
        self.payload.media_type()
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end_time.saturating_sub(self.start_time)
    }

    /// Whether `position` falls in this block's half-open `[start, end)` range.
    #[must_use]
    pub fn contains(&self, position: Duration) -> bool {
        position >= self.start_time && position < self.end_time
    }

    /// Attached pictures and gapless audio must be re-presented every cycle
    /// even when `position` has not advanced past them; everything else is
    /// de-duplicated by the rendering worker (spec §4.5 step 5).
    #[must_use]
    pub fn requires_repetition(&self) -> bool {
        matches!(
            self.payload,
            Payload::Audio { .. }
                | Payload::Video {
                    is_attached_picture: true,
                    ..
                }
        )
    }
}
