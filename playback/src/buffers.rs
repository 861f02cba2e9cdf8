//! Per-media-type block buffers owned by the engine (spec §3 Lifecycle:
//! "Block buffers are created at open/change time, cleared on seek,
//! disposed at close.").

use std::collections::HashMap;

use mediacore::{block::MediaBlock, block_buffer::MediaBlockBuffer, media_type::MediaType};
use parking_lot::{Mutex, RwLock};

/// One [`MediaBlockBuffer`] per concrete [`MediaType`], each guarded by its
/// own lock so a decoder append and a renderer range-query never block each
/// other's sibling buffer (spec §5: "A lock per buffer is acceptable;
/// critical sections are short."). The outer map itself is behind a
/// `RwLock` so [`BlockBuffers::setup`]/[`BlockBuffers::dispose`] can run
/// through a shared `&self` held by every worker thread.
#[derive(Default)]
pub struct BlockBuffers {
    buffers: RwLock<HashMap<MediaType, Mutex<MediaBlockBuffer>>>,
}

impl BlockBuffers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever buffers existed with freshly created, empty ones
    /// sized per `capacity`. Called at open and change (spec §3 Lifecycle).
    pub fn setup(&self, capacity: impl Fn(MediaType) -> usize) {
        let mut buffers = self.buffers.write();
        buffers.clear();
        for t in MediaType::ALL {
            buffers.insert(t, Mutex::new(MediaBlockBuffer::new(t, capacity(t).max(1))));
        }
    }

    /// Drops every buffer. Called at close (spec §3 Lifecycle).
    pub fn dispose(&self) {
        self.buffers.write().clear();
    }

    #[must_use]
    pub fn has(&self, media_type: MediaType) -> bool {
        self.buffers.read().contains_key(&media_type)
    }

    pub fn add(&self, block: MediaBlock) {
        let t = block.media_type();
        if let Some(buf) = self.buffers.read().get(&t) {
            buf.lock().add(block);
        }
    }

    /// Clears every buffer, e.g. at the start of a seek (spec §4.6 step 6).
    pub fn clear_all(&self) {
        for buf in self.buffers.read().values() {
            buf.lock().clear();
        }
    }

    #[must_use]
    pub fn is_full(&self, media_type: MediaType) -> bool {
        self.buffers
            .read()
            .get(&media_type)
            .is_some_and(|b| b.lock().is_full())
    }

    #[must_use]
    pub fn is_empty(&self, media_type: MediaType) -> bool {
        self.buffers
            .read()
            .get(&media_type)
            .map_or(true, |b| b.lock().is_empty())
    }

    /// Runs `f` against the buffer for `media_type` under its lock, or
    /// returns `default` if no such buffer exists (e.g. the component was
    /// never opened).
    pub fn with<R>(
        &self,
        media_type: MediaType,
        default: R,
        f: impl FnOnce(&MediaBlockBuffer) -> R,
    ) -> R {
        match self.buffers.read().get(&media_type) {
            Some(buf) => f(&buf.lock()),
            None => default,
        }
    }

    #[must_use]
    pub fn media_types(&self) -> Vec<MediaType> {
        self.buffers.read().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediacore::block::Payload;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    fn block(start_ms: u64) -> MediaBlock {
        MediaBlock::new(
            Duration::from_millis(start_ms),
            Duration::from_millis(start_ms + 10),
            0,
            Payload::Audio {
                samples: Arc::from(vec![0.0_f32; 2]),
                channels: 1,
            },
        )
    }

    #[test]
    fn setup_creates_one_buffer_per_concrete_type() {
        let buffers = BlockBuffers::new();
        buffers.setup(|_| 4);
        for t in MediaType::ALL {
            assert!(buffers.has(t));
        }
        assert!(!buffers.has(MediaType::None));
    }

    #[test]
    fn add_routes_by_payload_media_type() {
        let buffers = BlockBuffers::new();
        buffers.setup(|_| 4);
        buffers.add(block(0));
        assert!(!buffers.is_empty(MediaType::Audio));
        assert!(buffers.is_empty(MediaType::Video));
    }

    #[test]
    fn clear_all_empties_every_buffer() {
        let buffers = BlockBuffers::new();
        buffers.setup(|_| 4);
        buffers.add(block(0));
        buffers.clear_all();
        assert!(buffers.is_empty(MediaType::Audio));
    }

    #[test]
    fn dispose_drops_every_buffer() {
        let buffers = BlockBuffers::new();
        buffers.setup(|_| 4);
        buffers.dispose();
        assert_eq!(buffers.media_types().len(), 0);
    }
}
