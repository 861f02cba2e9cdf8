//! The demuxer/decoder collaborator's contract (spec §6, "Container
//! interface"). Opening containers, producing frames, codec details and
//! container formats are explicitly out of scope (spec §1); this module
//! only declares the shape the core depends on.

use std::time::Duration;

use mediacore::{block::MediaBlock, error::EngineError, media_type::MediaType};

/// Statistics reported through [`Container`]'s packet-queue-changed
/// callback, used to drive buffering percentage (spec §6).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PacketQueueStats {
    pub length: usize,
    pub count: usize,
    pub count_threshold: usize,
    pub duration: Duration,
}

/// The decoded-component view of an open container: per-type packet
/// queues and the frame source the frame decoding worker pulls from.
pub trait Components: Send {
    /// The type whose clock and block range drive global playback
    /// position (spec glossary, "Main component").
    fn main_media_type(&self) -> MediaType;

    /// Whether this container produced a component of `media_type` at all.
    fn has_component(&self, media_type: MediaType) -> bool;

    /// Decodes and returns the next queued frame for `media_type`, if one
    /// is available without blocking. Returns `Ok(None)` when the queue is
    /// momentarily empty, not yet an end-of-component signal.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MediaContainerError`] on a decode failure;
    /// per spec §4.4 the frame decoding worker discards and continues.
    fn receive_next_frame(&mut self, media_type: MediaType) -> Result<Option<MediaBlock>, EngineError>;

    /// Number of packets currently queued for `media_type`.
    fn buffer_length(&self, media_type: MediaType) -> usize;

    /// True once every live component's packet queue is considered
    /// sufficiently full; drives `should_read_more_packets` (spec §4.3).
    fn has_enough_packets(&self) -> bool;

    /// The most recent packet-queue-changed statistics, if the container
    /// has reported any since open.
    fn packet_queue_stats(&self, media_type: MediaType) -> Option<PacketQueueStats>;

    /// The component's reported `(start_time, end_time)`, if known. Feeds
    /// the timing controller's setup step (spec §4.7, "Setup rules").
    fn time_range(&self, media_type: MediaType) -> Option<(Duration, Duration)>;
}

/// The demuxer handle owned exclusively by the packet reading worker,
/// except during a seek, when the seek engine swaps in (spec §5).
pub trait Container: Send {
    /// Opens the underlying source. Must produce at least one audio or
    /// video component or the command manager surfaces
    /// [`EngineError::OpenFailed`].
    fn open(&mut self) -> Result<(), EngineError>;

    fn dispose(&mut self);

    /// Drops any queued packets and decoder-internal state without closing
    /// the underlying source. Called at the start of a seek (spec §4.6
    /// step 4, "clear queued packets and flush decoder buffers").
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MediaContainerError`] if the flush itself
    /// fails at the demuxer level.
    fn flush(&mut self) -> Result<(), EngineError>;

    /// Reads and enqueues exactly one packet into its component's queue.
    ///
    /// # Errors
    ///
    /// Media-container-kind errors are expected to be swallowed by the
    /// caller (spec §4.3 step 1) to allow continued reading; this method
    /// still returns them so the caller can log and decide.
    fn read(&mut self) -> Result<MediaType, EngineError>;

    /// Seeks the container to (at or after) `target` and returns the first
    /// decoded frame at the new position.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MediaContainerError`] if the seek itself
    /// fails at the demuxer level.
    fn seek(&mut self, target: Duration) -> Result<MediaBlock, EngineError>;

    fn components(&mut self) -> &mut dyn Components;

    /// Aborts in-flight and future reads. `immediate` requests the
    /// container interrupt a blocking read already underway rather than
    /// waiting for its natural return.
    fn signal_abort_reads(&mut self, immediate: bool);

    fn is_read_aborted(&self) -> bool;
    fn is_at_end_of_stream(&self) -> bool;
    fn is_live_stream(&self) -> bool;
    fn is_network_stream(&self) -> bool;
    fn is_stream_seekable(&self) -> bool;
}
