//! Side-loaded subtitles (spec §3 "MediaOptions", §4.5 step 5 "the
//! preloaded subtitles store", §7 `SubtitlePreloadFailed`). Fetching and
//! parsing a subtitle file is a platform/format concern explicitly out of
//! scope (spec §1 Non-goals: "subtitle rendering geometry"); this module
//! only declares the seam a host plugs a loader into and the store the
//! rendering worker reads from.

use std::time::Duration;

use mediacore::{block::MediaBlock, error::EngineError};

/// Fetches and decodes a side-loaded subtitle track named by
/// [`ContainerConfiguration::subtitles_url`](mediacore::config::ContainerConfiguration::subtitles_url)
/// into a flat, time-ordered list of subtitle [`MediaBlock`]s. The default
/// host supplies `None`, in which case `subtitles_url` is ignored.
pub trait SubtitleLoader: Send + Sync {
    /// # Errors
    ///
    /// Returns [`EngineError::SubtitlePreloadFailed`] if the URL cannot be
    /// fetched or parsed; the caller logs this as a warning and continues
    /// without side-loaded subtitles (spec §7).
    fn load(&self, url: &str) -> Result<Vec<MediaBlock>, EngineError>;
}

/// Blocks preloaded ahead of time rather than streamed through the
/// decoder, ordered by `start_time`. Looked up the same way a
/// [`MediaBlockBuffer`](mediacore::block_buffer::MediaBlockBuffer) is, but
/// never evicts: the whole track is already resident.
#[derive(Debug, Default, Clone)]
pub struct PreloadedSubtitles {
    blocks: Vec<MediaBlock>,
}

impl PreloadedSubtitles {
    #[must_use]
    pub fn new(mut blocks: Vec<MediaBlock>, delay: Duration) -> Self {
        for block in &mut blocks {
            block.start_time += delay;
            block.end_time += delay;
        }
        blocks.sort_by_key(|b| b.start_time);
        for (i, block) in blocks.iter_mut().enumerate() {
            block.index = i as u64;
        }
        Self { blocks }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The block whose `[start_time, end_time)` contains `position`, if any
    /// (mirrors `MediaBlockBuffer::block_at`).
    #[must_use]
    pub fn block_at(&self, position: Duration) -> Option<&MediaBlock> {
        self.blocks.iter().find(|b| b.contains(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediacore::block::Payload;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn subtitle_block(start_ms: u64, end_ms: u64, text: &str) -> MediaBlock {
        MediaBlock::new(
            Duration::from_millis(start_ms),
            Duration::from_millis(end_ms),
            0,
            Payload::Subtitle { text: Arc::from(text) },
        )
    }

    #[test]
    fn delay_shifts_every_block() {
        let store = PreloadedSubtitles::new(
            vec![subtitle_block(0, 1_000, "hi")],
            Duration::from_millis(500),
        );
        let block = store.block_at(Duration::from_millis(600)).unwrap();
        assert_eq!(block.start_time, Duration::from_millis(500));
    }

    #[test]
    fn block_at_finds_containing_range() {
        let store = PreloadedSubtitles::new(
            vec![subtitle_block(0, 1_000, "a"), subtitle_block(1_000, 2_000, "b")],
            Duration::ZERO,
        );
        assert!(matches!(
            &store.block_at(Duration::from_millis(1_500)).unwrap().payload,
            Payload::Subtitle { text } if &**text == "b"
        ));
        assert!(store.block_at(Duration::from_millis(2_500)).is_none());
    }
}
