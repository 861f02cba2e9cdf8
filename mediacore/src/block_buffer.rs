//! Bounded per-media-type ring of decoded blocks (spec §3, "MediaBlockBuffer").

use std::collections::VecDeque;
use std::time::Duration;

use crate::block::MediaBlock;
use crate::media_type::MediaType;

/// Ordered, bounded collection of [`MediaBlock`]s for one [`MediaType`].
///
/// Invariants maintained by every mutating method:
/// - holds at most `capacity` blocks; [`MediaBlockBuffer::add`] on a full
///   buffer evicts the oldest;
/// - blocks are ordered by `start_time` (non-decreasing).
pub struct MediaBlockBuffer {
    media_type: MediaType,
    capacity: usize,
    blocks: VecDeque<MediaBlock>,
    next_index: u64,
}

impl MediaBlockBuffer {
    #[must_use]
    pub fn new(media_type: MediaType, capacity: usize) -> Self {
        Self {
            media_type,
            capacity: capacity.max(1),
            blocks: VecDeque::with_capacity(capacity),
            next_index: 0,
        }
    }

    #[must_use]
    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.blocks.len() >= self.capacity
    }

    /// Assigns the block the buffer's next monotonic index and appends it.
    /// Evicts the oldest block first if the buffer is already full.
    ///
    /// Blocks are expected to arrive in non-decreasing `start_time` order
    /// (the decoder and the seek engine both produce them that way); this
    /// is debug-asserted rather than enforced, since enforcing it here
    /// would hide a bug in the producer instead of surfacing it.
    pub fn add(&mut self, mut block: MediaBlock) {
        debug_assert_eq!(block.media_type(), self.media_type);
        if let Some(last) = self.blocks.back() {
            debug_assert!(
                block.start_time >= last.start_time,
                "blocks must be appended in non-decreasing start_time order"
            );
        }
        block.index = self.next_index;
        self.next_index += 1;
        if self.blocks.len() >= self.capacity {
            self.blocks.pop_front();
        }
        self.blocks.push_back(block);
    }

    /// Drops every block. Called on seek and at close (spec §3 Lifecycle).
    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    #[must_use]
    pub fn range_start_time(&self) -> Option<Duration> {
        self.blocks.front().map(|b| b.start_time)
    }

    #[must_use]
    pub fn range_end_time(&self) -> Option<Duration> {
        self.blocks.back().map(|b| b.end_time)
    }

    #[must_use]
    pub fn range_mid_time(&self) -> Option<Duration> {
        match (self.range_start_time(), self.range_end_time()) {
            (Some(s), Some(e)) => Some(s + (e.saturating_sub(s)) / 2),
            _ => None,
        }
    }

    #[must_use]
    pub fn average_block_duration(&self) -> Option<Duration> {
        if self.blocks.is_empty() {
            return None;
        }
        let total: Duration = self.blocks.iter().map(MediaBlock::duration).sum();
        Some(total / u32::try_from(self.blocks.len()).unwrap_or(u32::MAX))
    }

    /// True when every block has the same duration, in which case
    /// [`MediaBlockBuffer::monotonic_duration`] is meaningful as a
    /// per-block step size.
    #[must_use]
    pub fn is_monotonic(&self) -> bool {
        let mut iter = self.blocks.iter();
        let Some(first) = iter.next() else {
            return true;
        };
        let d = first.duration();
        iter.all(|b| b.duration() == d)
    }

    /// The common block duration, if [`MediaBlockBuffer::is_monotonic`].
    #[must_use]
    pub fn monotonic_duration(&self) -> Option<Duration> {
        if !self.is_monotonic() {
            return None;
        }
        self.blocks.front().map(MediaBlock::duration)
    }

    #[must_use]
    pub fn is_in_range(&self, t: Duration) -> bool {
        match (self.range_start_time(), self.range_end_time()) {
            (Some(s), Some(e)) => t >= s && t <= e,
            _ => false,
        }
    }

    /// The block whose `[start_time, end_time)` contains `t`, if any.
    #[must_use]
    pub fn block_at(&self, t: Duration) -> Option<&MediaBlock> {
        self.blocks.iter().find(|b| b.contains(t))
    }

    /// `(previous, next, current)` relative to `t`: the last block strictly
    /// before `t`, the first block strictly after `t`'s containing block,
    /// and the block containing `t` itself.
    #[must_use]
    pub fn neighbors(
        &self,
        t: Duration,
    ) -> (Option<&MediaBlock>, Option<&MediaBlock>, Option<&MediaBlock>) {
        let current = self.block_at(t);
        let current_index = current.map(|b| b.index);

        let previous = self
            .blocks
            .iter()
            .filter(|b| Some(b.index) != current_index && b.start_time < t)
            .next_back();
        let next = self
            .blocks
            .iter()
            .find(|b| Some(b.index) != current_index && b.start_time >= t);

        (previous, next, current)
    }

    /// The nearest block's `start_time`, used to snap a seek target onto a
    /// block boundary (spec §3).
    #[must_use]
    pub fn get_snap_position(&self, t: Duration) -> Option<Duration> {
        self.blocks
            .iter()
            .min_by_key(|b| {
                if b.start_time >= t {
                    b.start_time - t
                } else {
                    t - b.start_time
                }
            })
            .map(|b| b.start_time)
    }

    #[must_use]
    pub fn first(&self) -> Option<&MediaBlock> {
        self.blocks.front()
    }

    #[must_use]
    pub fn last(&self) -> Option<&MediaBlock> {
        self.blocks.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaBlock> {
        self.blocks.iter()
    }
}
