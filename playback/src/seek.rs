//! The seek engine (spec §4.6). Invoked exclusively by the command
//! processor thread (never by the decoding/rendering workers): computes
//! an effective target, takes a fast path when already buffered,
//! otherwise re-seeks the container with a backward-skew adjustment and
//! re-decodes until the target lands (or a bounded number of attempts is
//! exhausted).

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use mediacore::block_buffer::MediaBlockBuffer;
use mediacore::error::EngineError;
use mediacore::media_type::MediaType;

use crate::command::{SeekMode, SeekOperation};
use crate::engine::EngineShared;

/// Upper bound on decode-and-read attempts while landing a seek, so a
/// stalled container cannot wedge the command processor thread forever.
const MAX_REDECODE_ATTEMPTS: u32 = 256;

/// Runs one seek to completion. Always leaves `seek_blocks_available` set
/// on return, including on failure (spec §8 invariant 5), so the
/// rendering worker's [`wait_for_seek_blocks`](crate::worker) step can
/// never deadlock on a seek that errored out.
pub(crate) fn perform(shared: &Arc<EngineShared>, op: SeekOperation) -> bool {
    let main = shared.main_media_type();
    let target = effective_target(shared, main, op);

    if shared.buffers.with(main, false, |b| b.is_in_range(target)) {
        shared.timing.update(target, MediaType::None);
        shared.seek_blocks_available.set();
        return true;
    }

    shared.seek_blocks_available.reset();
    if let Some(workers) = shared.worker_set.lock().as_ref() {
        workers.pause_read_decode(true);
    }

    let result = land_seek(shared, main, target, op.mode);

    if let Some(workers) = shared.worker_set.lock().as_ref() {
        workers.resume_paused();
    }
    shared.seek_blocks_available.set();
    result
}

/// `StepForward`/`StepBackward` land on the start of the neighboring
/// block when one is buffered, else fall back to `1.5 *
/// average_block_duration` (0.5s when unknown) from the current position
/// (spec §4.6 step 1).
fn effective_target(shared: &Arc<EngineShared>, main: MediaType, op: SeekOperation) -> Duration {
    match op.mode {
        SeekMode::Normal => op.target,
        SeekMode::Stop => shared.timing.start_time(main),
        SeekMode::StepForward | SeekMode::StepBackward => {
            let position = shared.timing.position(main);
            let forward = op.mode == SeekMode::StepForward;
            let (neighbor, current_start, at_edge) = shared.buffers.with(main, (None, None, false), |b| {
                let (previous, next, current) = b.neighbors(position);
                let neighbor = if forward { next } else { previous }.map(|block| block.start_time);
                let current_start = current.map(|block| block.start_time);
                let at_edge = current.is_some_and(|c| {
                    let edge = if forward { b.last() } else { b.first() };
                    edge.is_some_and(|e| e.index == c.index)
                });
                (neighbor, current_start, at_edge)
            });

            if let Some(start) = neighbor {
                start
            } else if at_edge && shared.decoding_ended.load(Ordering::SeqCst) {
                // Nothing more will ever arrive past this edge block, so
                // stay put rather than walking off the end of the stream.
                current_start.unwrap_or(position)
            } else {
                let delta = shared
                    .buffers
                    .with(main, None, MediaBlockBuffer::average_block_duration)
                    .map(|d| d.mul_f64(1.5))
                    .unwrap_or(Duration::from_millis(500));
                if forward {
                    position + delta
                } else {
                    position.saturating_sub(delta)
                }
            }
        }
    }
}

fn land_seek(shared: &Arc<EngineShared>, main: MediaType, target: Duration, mode: SeekMode) -> bool {
    // Backward-skew adjustment (spec §4.6 step 4): land the container seek
    // earlier than the target by half a buffer's worth of blocks so the
    // re-decode loop leaves scrubbing room on both sides of `target`.
    let (monotonic_duration, capacity) = shared
        .buffers
        .with(main, (None, 0), |b| (b.monotonic_duration(), b.capacity()));
    let adjusted = if target > Duration::ZERO {
        monotonic_duration.map_or(target, |step| {
            target.saturating_sub(step * u32::try_from(capacity / 2).unwrap_or(u32::MAX))
        })
    } else {
        target
    };

    let mut container_guard = shared.container.lock();
    let Some(container) = container_guard.as_mut() else {
        return false;
    };

    if let Err(err) = container.flush() {
        warn!("seek: flush failed: {err}");
    }

    let first_block = match container.seek(adjusted) {
        Ok(block) => block,
        Err(err) => {
            warn!("seek: container seek to {adjusted:?} failed: {err}");
            shared.connector.on_media_failed(&err);
            return false;
        }
    };

    shared.buffers.clear_all();
    shared.for_each_renderer(|_, r| r.on_seek());
    shared.buffers.add(first_block);
    shared.buffer_changed.set();

    let mut landed = shared.buffers.with(main, false, |b| b.is_in_range(target));
    let mut attempts = 0;
    while !landed && attempts < MAX_REDECODE_ATTEMPTS {
        attempts += 1;
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
                Err(err) => warn!("seek: re-decode failed: {err}"),
            }
        }
        if !decoded_any {
            if container.is_at_end_of_stream() {
                break;
            }
            if let Err(err) = container.read() {
                warn!("seek: read failed: {err}");
            }
        }
        landed = shared.buffers.with(main, false, |b| b.is_in_range(target));
    }
    drop(container_guard);

    // Result clamps to whatever range the main buffer actually landed in;
    // a buffer that never reached `target` reports its nearest edge
    // instead of leaving the clock stuck at the pre-seek position.
    let result_position = shared
        .buffers
        .with(main, None, |b| match (b.range_start_time(), b.range_end_time()) {
            (Some(start), Some(end)) => {
                if target < start || target > end {
                    warn!(
                        "{}: seek target {target:?} landed outside buffered range [{start:?}, {end:?}]",
                        EngineError::SeekOutOfRange
                    );
                }
                Some(target.clamp(start, end))
            }
            _ => None,
        })
        .unwrap_or(target);

    let landing = match mode {
        SeekMode::StepForward | SeekMode::StepBackward => shared
            .buffers
            .with(main, None, |b| b.block_at(result_position).map(|block| block.start_time))
            .unwrap_or(result_position),
        SeekMode::Normal | SeekMode::Stop => result_position,
    };

    shared.timing.update(landing, MediaType::None);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::bare_shared;
    use mediacore::block::{MediaBlock, Payload};
    use pretty_assertions::assert_eq;
    use std::sync::Arc as StdArc;

    fn audio_block(start_ms: u64, dur_ms: u64) -> MediaBlock {
        MediaBlock::new(
            Duration::from_millis(start_ms),
            Duration::from_millis(start_ms + dur_ms),
            0,
            Payload::Audio {
                samples: StdArc::from(vec![0.0_f32; 4]),
                channels: 2,
            },
        )
    }

    #[test]
    fn fast_path_when_target_already_buffered() {
        let shared = bare_shared();
        shared.buffers.setup(|_| 64);
        shared.buffers.add(audio_block(0, 1_000));
        shared.buffers.add(audio_block(1_000, 1_000));

        let ok = perform(
            &shared,
            SeekOperation::new(Duration::from_millis(500), SeekMode::Normal),
        );

        assert!(ok);
        assert_eq!(shared.timing.position(MediaType::Audio), Duration::from_millis(500));
        assert!(shared.seek_blocks_available.is_set());
    }

    #[test]
    fn out_of_range_without_container_leaves_latch_set() {
        let shared = bare_shared();
        shared.buffers.setup(|_| 64);
        shared.buffers.add(audio_block(0, 1_000));

        let ok = perform(
            &shared,
            SeekOperation::new(Duration::from_secs(5), SeekMode::Normal),
        );

        // No container is wired up in this fixture, so landing fails...
        assert!(!ok);
        // ...but the latch must never be left reset (spec §8 invariant 5).
        assert!(shared.seek_blocks_available.is_set());
    }

    #[test]
    fn step_forward_uses_buffered_neighbor_start() {
        let shared = bare_shared();
        shared.buffers.setup(|_| 64);
        shared.buffers.add(audio_block(0, 100));
        shared.buffers.add(audio_block(100, 100));
        shared.timing.update(Duration::from_millis(50), MediaType::None);

        let target = effective_target(
            &shared,
            MediaType::Audio,
            SeekOperation::new(Duration::ZERO, SeekMode::StepForward),
        );

        assert_eq!(target, Duration::from_millis(100));
    }

    #[test]
    fn step_forward_without_neighbor_falls_back_to_half_second() {
        let shared = bare_shared();
        shared.buffers.setup(|_| 64);
        shared.timing.update(Duration::from_secs(2), MediaType::None);

        let target = effective_target(
            &shared,
            MediaType::Audio,
            SeekOperation::new(Duration::ZERO, SeekMode::StepForward),
        );

        assert_eq!(target, Duration::from_millis(2_500));
    }

    #[test]
    fn step_backward_without_neighbor_falls_back_and_saturates_at_zero() {
        let shared = bare_shared();
        shared.buffers.setup(|_| 64);
        shared.timing.update(Duration::from_millis(100), MediaType::None);

        let target = effective_target(
            &shared,
            MediaType::Audio,
            SeekOperation::new(Duration::ZERO, SeekMode::StepBackward),
        );

        assert_eq!(target, Duration::ZERO);
    }

    #[test]
    fn step_forward_at_last_block_of_ended_stream_is_idempotent() {
        let shared = bare_shared();
        shared.buffers.setup(|_| 64);
        shared.buffers.add(audio_block(0, 100));
        shared.buffers.add(audio_block(100, 100));
        shared.timing.update(Duration::from_millis(150), MediaType::None);
        shared.decoding_ended.store(true, Ordering::SeqCst);

        let target = effective_target(
            &shared,
            MediaType::Audio,
            SeekOperation::new(Duration::ZERO, SeekMode::StepForward),
        );

        assert_eq!(target, Duration::from_millis(100));
    }

    #[test]
    fn step_backward_at_first_block_of_ended_stream_is_idempotent() {
        let shared = bare_shared();
        shared.buffers.setup(|_| 64);
        shared.buffers.add(audio_block(0, 100));
        shared.buffers.add(audio_block(100, 100));
        shared.timing.update(Duration::from_millis(50), MediaType::None);
        shared.decoding_ended.store(true, Ordering::SeqCst);

        let target = effective_target(
            &shared,
            MediaType::Audio,
            SeekOperation::new(Duration::ZERO, SeekMode::StepBackward),
        );

        assert_eq!(target, Duration::ZERO);
    }

    #[test]
    fn step_forward_at_last_block_still_advances_while_decoding_continues() {
        let shared = bare_shared();
        shared.buffers.setup(|_| 64);
        shared.buffers.add(audio_block(0, 100));
        shared.buffers.add(audio_block(100, 100));
        shared.timing.update(Duration::from_millis(150), MediaType::None);
        // decoding_ended left false: more content may still arrive, so the
        // delta fallback should still push past the current edge to drive
        // a re-seek rather than staying put.
        let target = effective_target(
            &shared,
            MediaType::Audio,
            SeekOperation::new(Duration::ZERO, SeekMode::StepForward),
        );

        assert_eq!(target, Duration::from_millis(300));
    }

    #[test]
    fn stop_mode_targets_component_start_time() {
        let shared = bare_shared();
        let target = effective_target(
            &shared,
            MediaType::Audio,
            SeekOperation::new(Duration::from_secs(9), SeekMode::Stop),
        );
        assert_eq!(target, shared.timing.start_time(MediaType::Audio));
    }
}
