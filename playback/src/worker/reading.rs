//! The packet reading worker (spec §4.3): drives the demuxer, respecting
//! buffer bounds, until downstream components want more.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use mediacore::error::EngineError;
use mediacore::media_type::MediaType;

use super::WorkerControl;
use crate::engine::EngineShared;

/// Network streams are allowed to grow their combined packet-queue length
/// up to this many bytes before reading backs off (spec §4.3).
const MAX_NETWORK_BUFFER_BYTES: usize = 16 * 1024 * 1024;

/// Upper bound on how long one cycle waits on `buffer_changed` before
/// re-checking on its own (spec §4.3 step 2).
const IDLE_WAIT: Duration = Duration::from_millis(5);

pub(super) fn run(shared: &Arc<EngineShared>, control: &WorkerControl) {
    while control.tick() {
        if control.should_run_body() {
            while control.should_run_body() && should_read_more_packets(shared) {
                read_one_packet(shared);
                shared.buffer_changed.set();
            }
        }
        // Nothing to read right now: reset the signal and wait for a
        // decoded frame, an abort, end-of-stream, or the timeout to
        // re-check should_read_more_packets on its own, rather than
        // spinning on a fixed sleep (spec §4.3 step 2).
        shared.buffer_changed.reset();
        shared.buffer_changed.wait_timeout(IDLE_WAIT);
    }
}

fn read_one_packet(shared: &Arc<EngineShared>) {
    let mut container = shared.container.lock();
    let Some(container) = container.as_mut() else {
        return;
    };
    match container.read() {
        Ok(media_type) => {
            drop(container);
            shared.connector.on_packet_read(media_type);
        }
        // Demuxer/codec-level failures are expected to be swallowed here
        // to allow continued reading (spec §4.3 step 1).
        Err(EngineError::MediaContainerError(msg)) => debug!("packet read: {msg}"),
        Err(err) => warn!("packet read failed: {err}"),
    }
}

fn should_read_more_packets(shared: &Arc<EngineShared>) -> bool {
    if shared.disposed.load(Ordering::SeqCst) || shared.reads_aborted.load(Ordering::SeqCst) {
        return false;
    }
    let mut container = shared.container.lock();
    let Some(container) = container.as_mut() else {
        return false;
    };
    if container.is_read_aborted() || container.is_at_end_of_stream() {
        return false;
    }
    if container.is_live_stream() {
        return true;
    }
    if container.is_network_stream() {
        let total: usize = MediaType::ALL
            .iter()
            .filter_map(|t| container.components().packet_queue_stats(*t))
            .map(|stats| stats.length)
            .sum();
        if total < MAX_NETWORK_BUFFER_BYTES {
            return true;
        }
    }
    !container.components().has_enough_packets()
}
