//! The frame decoding worker (spec §4.4): pulls queued packets into
//! decoded blocks and appends them to the per-type block buffers. Single
//! threaded by design to avoid cross-stream lock contention; never
//! touches the wall clock.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use mediacore::media_type::MediaType;

use super::WorkerControl;
use crate::engine::EngineShared;

const IDLE_WAIT: Duration = Duration::from_millis(5);

pub(super) fn run(shared: &Arc<EngineShared>, control: &WorkerControl) {
    while control.tick() {
        if control.should_run_body() {
            let decoded_any = decode_cycle(shared);
            if decoded_any {
                shared.decoding_ended.store(false, Ordering::SeqCst);
                shared.buffer_changed.set();
            } else if is_exhausted(shared) {
                shared.decoding_ended.store(true, Ordering::SeqCst);
            }
        }
        std::thread::sleep(IDLE_WAIT);
    }
}

/// Pulls one frame per non-full, present component. Returns whether any
/// frame was actually decoded this cycle.
fn decode_cycle(shared: &Arc<EngineShared>) -> bool {
    let mut container = shared.container.lock();
    let Some(container) = container.as_mut() else {
        return false;
    };
    let mut decoded_any = false;
    for t in MediaType::ALL {
        if shared.buffers.is_full(t) || !container.components().has_component(t) {
            continue;
        }
        match container.components().receive_next_frame(t) {
            Ok(Some(block)) => {
                shared.buffers.add(block);
                decoded_any = true;
            }
            Ok(None) => {}
            Err(err) => warn!("frame decode failed: {err}"),
        }
    }
    decoded_any
}

fn is_exhausted(shared: &Arc<EngineShared>) -> bool {
    shared
        .container
        .lock()
        .as_ref()
        .is_some_and(|c| c.is_at_end_of_stream())
}
