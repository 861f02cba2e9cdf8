//! The block rendering worker (spec §4.5): the most intricate of the
//! three. Per cycle: waits out an in-progress seek, aligns the clock to
//! available blocks, enters/exits sync-buffering, dispatches due blocks
//! to renderers, detects end-of-media, then reports position and decides
//! whether to resume the clock.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mediacore::block::MediaBlock;
use mediacore::media_type::MediaType;

use super::WorkerControl;
use crate::command::SeekMode;
use crate::engine::EngineShared;
use crate::state::{MediaState, PlaybackState};

const CYCLE_PERIOD: Duration = Duration::from_millis(10);
const SEEK_WAIT_STEP: Duration = Duration::from_millis(5);

pub(super) fn run(shared: &Arc<EngineShared>, control: &WorkerControl) {
    let mut started = false;

    while control.tick() {
        if !control.should_run_body() {
            continue;
        }
        if !started {
            shared.for_each_renderer(|_, r| r.on_starting());
            started = true;
        }

        wait_for_seek_blocks(shared);
        align_clock(shared);
        enter_sync_buffering_if_needed(shared);
        render_due_blocks(shared);
        exit_sync_buffering_if_ready(shared);
        detect_end_of_media(shared);
        report_and_resume(shared);

        std::thread::sleep(CYCLE_PERIOD);
    }
}

/// "Fluid seeking" (spec glossary): a normal seek with fluid seeking
/// enabled returns immediately so the renderer shows whatever is already
/// available instead of blocking. Every other seek mode is "precision
/// seeking" and keeps waiting for the target's exact block.
fn wait_for_seek_blocks(shared: &Arc<EngineShared>) {
    if !shared.is_seeking.load(Ordering::SeqCst) {
        return;
    }
    let fluid = shared
        .current_seek_mode
        .lock()
        .is_some_and(|mode| mode == SeekMode::Normal)
        && !shared.config.read().is_fluid_seeking_disabled;
    if fluid {
        return;
    }

    let main = shared.main_media_type();
    loop {
        let position = shared.timing.position(main);
        if !shared.is_seeking.load(Ordering::SeqCst)
            || shared.buffers.with(main, false, |b| b.is_in_range(position))
        {
            return;
        }
        shared.seek_blocks_available.wait_timeout(SEEK_WAIT_STEP);
    }
}

fn align_clock(shared: &Arc<EngineShared>) {
    if shared.timing.is_disconnected() {
        align_component_clock(shared, MediaType::Audio, true);
        align_component_clock(shared, MediaType::Video, false);
    } else {
        align_component_clock(shared, shared.timing.reference(), false);
    }
}

fn align_component_clock(shared: &Arc<EngineShared>, t: MediaType, is_disconnected_audio: bool) {
    let (start, end, has_blocks) = shared
        .buffers
        .with(t, (None, None, false), |b| (b.range_start_time(), b.range_end_time(), !b.is_empty()));
    if !has_blocks {
        shared.timing.pause(t);
        return;
    }
    if let Some(start) = start {
        if shared.timing.position(t) < start {
            shared.timing.update(start, t);
        }
    }
    if let Some(end) = end {
        if shared.timing.position(t) > end {
            // Disconnected audio is allowed to lead silently; everything
            // else (including video in disconnected mode) pauses so the
            // clock does not run ahead of what is actually buffered.
            if !is_disconnected_audio {
                shared.timing.pause(t);
            }
            shared.timing.update(end, t);
        }
    }
}

fn enter_sync_buffering_if_needed(shared: &Arc<EngineShared>) {
    if shared.sync_buffering.load(Ordering::SeqCst) || !should_enter_sync_buffering(shared) {
        return;
    }
    shared.sync_buffering.store(true, Ordering::SeqCst);
    shared.timing.pause(MediaType::None);
    shared.connector.on_buffering_started();
}

fn should_enter_sync_buffering(shared: &Arc<EngineShared>) -> bool {
    if shared.state().playback() != Some(PlaybackState::Play) {
        return false;
    }
    if shared.commands_pending() || shared.media_ended.load(Ordering::SeqCst) {
        return false;
    }
    let main = shared.main_media_type();
    let Some(main_start) = shared.buffers.with(main, None, |b| b.range_start_time()) else {
        return false;
    };
    shared.buffers.media_types().into_iter().any(|t| {
        if t == main || t == MediaType::Subtitle {
            return false;
        }
        !shared.buffers.with(t, false, |b| b.is_in_range(main_start))
    })
}

fn exit_sync_buffering_if_ready(shared: &Arc<EngineShared>) {
    if !shared.sync_buffering.load(Ordering::SeqCst) || !should_exit_sync_buffering(shared) {
        return;
    }
    shared.sync_buffering.store(false, Ordering::SeqCst);
    shared.connector.on_buffering_ended();
}

fn should_exit_sync_buffering(shared: &Arc<EngineShared>) -> bool {
    if shared.disposed.load(Ordering::SeqCst)
        || shared.decoding_ended.load(Ordering::SeqCst)
        || shared.reads_aborted.load(Ordering::SeqCst)
        || shared.media_ended.load(Ordering::SeqCst)
        || shared.commands_pending()
        || shared.timing.is_disconnected()
    {
        return true;
    }
    let main = shared.main_media_type();
    let Some(main_mid) = shared.buffers.with(main, None, |b| b.range_mid_time()) else {
        return true;
    };
    shared
        .buffers
        .media_types()
        .into_iter()
        .all(|t| t == main || t == MediaType::Subtitle || shared.buffers.with(t, false, |b| b.is_in_range(main_mid)))
}

fn render_due_blocks(shared: &Arc<EngineShared>) {
    let main = shared.main_media_type();
    let position = shared.timing.position(main);
    let parallel = shared.config.read().use_parallel_rendering;
    let types = shared.buffers.media_types();

    if parallel {
        std::thread::scope(|scope| {
            for t in &types {
                let t = *t;
                scope.spawn(move || render_one(shared, t, position));
            }
        });
    } else {
        for t in types {
            render_one(shared, t, position);
        }
    }
}

/// De-duplicates by block index: a block already presented is skipped
/// unless it requires repetition (audio and attached-picture video, spec
/// §4.5 step 5).
fn render_one(shared: &Arc<EngineShared>, t: MediaType, position: Duration) {
    let block = if t == MediaType::Subtitle {
        shared.subtitle_block_at(position)
    } else {
        shared
            .buffers
            .with(t, None::<MediaBlock>, |b| b.block_at(position).cloned())
    };
    let Some(block) = block else {
        return;
    };

    {
        let mut last_index = shared.last_rendered_index.lock();
        let already_rendered = last_index.get(&t) == Some(&block.index);
        if already_rendered && !block.requires_repetition() {
            return;
        }
        last_index.insert(t, block.index);
    }

    let renderers = shared.renderers.read();
    if let Some(renderer) = renderers.get(&t) {
        renderer.lock().render(&block, position);
        shared.last_render_time.lock().insert(t, Instant::now());
    }
}

fn detect_end_of_media(shared: &Arc<EngineShared>) {
    if shared.media_ended.load(Ordering::SeqCst)
        || shared.commands_pending()
        || !shared.decoding_ended.load(Ordering::SeqCst)
    {
        return;
    }
    let main = shared.main_media_type();
    let end = shared.timing.end_time(main);
    if shared.timing.position(main) < end {
        return;
    }
    shared.media_ended.store(true, Ordering::SeqCst);
    shared.timing.pause(MediaType::None);
    shared.timing.update(end, MediaType::None);
    shared.set_state(MediaState::Open(PlaybackState::Stop));
    shared.connector.on_media_ended();
}

fn report_and_resume(shared: &Arc<EngineShared>) {
    let sync_buffering = shared.sync_buffering.load(Ordering::SeqCst);
    let commands_pending = shared.commands_pending();
    let main = shared.main_media_type();
    let position = shared.timing.position(main);

    if !sync_buffering && !commands_pending {
        let mut last = shared.last_reported_position.lock();
        if *last != position {
            let old = *last;
            *last = position;
            drop(last);
            shared.connector.on_position_changed(old, position);
        }
    }

    let should_resume = shared.state().playback() == Some(PlaybackState::Play)
        && !commands_pending
        && !sync_buffering
        && !shared.buffers.is_empty(main)
        && buffer_progress(shared, main) >= shared.config.read().minimum_playback_buffer_percent();
    if should_resume {
        shared.timing.play(MediaType::None);
    }
}

fn buffer_progress(shared: &Arc<EngineShared>, media_type: MediaType) -> f64 {
    shared.buffers.with(media_type, 1.0, |b| {
        if b.capacity() == 0 {
            1.0
        } else {
            b.len() as f64 / b.capacity() as f64
        }
    })
}
