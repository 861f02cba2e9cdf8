//! The per-media-type renderer contract supplied by the host platform
//! (spec §6, "Renderer interface").

use std::time::Duration;

use mediacore::block::MediaBlock;

/// A capability interface dispatched dynamically per media type (spec §9,
/// "Dynamic dispatch over renderers"). Three concrete implementations
/// (audio, video, subtitle) are expected at the boundary; hardware
/// acceleration and presentation geometry are the implementor's concern,
/// not this core's (spec §1 Non-goals).
pub trait Renderer: Send {
    /// Called once per renderer when the block rendering worker begins its
    /// cycle loop (spec §4.5 step 1).
    fn on_starting(&mut self) {}

    fn on_play(&mut self) {}
    fn on_pause(&mut self) {}
    fn on_stop(&mut self) {}
    fn on_close(&mut self) {}

    /// Called when a seek invalidates whatever this renderer was showing,
    /// before the seek engine inserts the first re-decoded block (spec
    /// §4.6 step 6, "invalidate renderers").
    fn on_seek(&mut self) {}

    /// Presents `block` at the given playback `position`. Called from the
    /// block rendering worker thread only.
    fn render(&mut self, block: &MediaBlock, position: Duration);

    /// Advances any internal presentation state (e.g. subtitle fade) for a
    /// `position` update that did not require choosing a new block.
    fn update(&mut self, position: Duration) {
        let _ = position;
    }

    /// Blocks the calling thread briefly until the renderer reports it is
    /// ready to accept `render` calls (e.g. an audio device has opened).
    /// Default implementation reports immediate readiness.
    fn wait_for_ready_state(&self) -> bool {
        true
    }
}
