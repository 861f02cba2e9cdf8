//! The command processor thread (spec §4.1, §5: "a command-processor
//! thread"): serializes direct commands, priority commands and deferred
//! seeks against the shared engine state.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use mediacore::config::ContainerConfiguration;
use mediacore::error::EngineError;
use mediacore::media_type::MediaType;
use mediacore::uri;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::container::Container;
use crate::engine::{EngineShared, OpenSource};
use crate::seek;
use crate::state::{MediaState, PlaybackState};
use crate::subtitle::SubtitleLoader;
use crate::timing::ComponentTimes;
use crate::worker::WorkerSet;

use super::{DirectCommand, PriorityCommand, SeekMode, SeekOperation};

type Reply = oneshot::Sender<bool>;

enum Envelope {
    Direct(DirectCommand, Reply),
    Priority(PriorityCommand, Reply),
    Seek(SeekOperation, Reply),
    Shutdown,
}

/// Coalescing state for deferred seeks (spec §4.1, "Deferred seek
/// commands"): only the most recently requested seek is ever queued.
/// Owned here rather than on [`EngineShared`] because only this thread
/// (and the enqueue calls below) ever touch it.
struct CommandQueue {
    queued_seek: Mutex<Option<(SeekOperation, Reply)>>,
    play_after_seek: std::sync::atomic::AtomicBool,
}

impl CommandQueue {
    fn new() -> Self {
        Self {
            queued_seek: Mutex::new(None),
            play_after_seek: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

/// Drives the single dedicated OS thread that owns command execution
/// order (spec §5, "Ordering guarantees").
pub struct CommandManager {
    shared: Arc<EngineShared>,
    // `mpsc::Sender` is `Send` but not `Sync`; the mutex is what lets every
    // `&self` method below be called concurrently from multiple async
    // callers sharing one `MediaEngine`.
    tx: Mutex<mpsc::Sender<Envelope>>,
    join: Option<JoinHandle<()>>,
}

impl CommandManager {
    pub(crate) fn start(shared: Arc<EngineShared>) -> Self {
        let (tx, rx) = mpsc::channel();
        let queue = Arc::new(CommandQueue::new());
        let join = {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("command-processor".into())
                .spawn(move || processor_loop(&shared, &rx, &queue))
                .expect("failed to spawn command processor thread")
        };
        Self {
            shared,
            tx: Mutex::new(tx),
            join: Some(join),
        }
    }

    async fn send_direct(&self, cmd: DirectCommand) -> bool {
        let (tx, rx) = oneshot::channel();
        if self.tx.lock().send(Envelope::Direct(cmd, tx)).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    async fn send_priority(&self, cmd: PriorityCommand) -> bool {
        let (tx, rx) = oneshot::channel();
        if self.tx.lock().send(Envelope::Priority(cmd, tx)).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    async fn send_seek(&self, op: SeekOperation) -> bool {
        if self.shared.disposed.load(Ordering::SeqCst) || !self.shared.state().is_open() {
            return false;
        }
        let (tx, rx) = oneshot::channel();
        if self.tx.lock().send(Envelope::Seek(op, tx)).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    pub async fn open(&self, source: OpenSource) -> bool {
        if self.shared.disposed.load(Ordering::SeqCst) || self.shared.state().is_open() {
            return false;
        }
        if self
            .shared
            .is_opening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.send_direct(DirectCommand::Open(source)).await
    }

    pub async fn close(&self) -> bool {
        if self.shared.disposed.load(Ordering::SeqCst) || !self.shared.state().is_open() {
            return false;
        }
        if self
            .shared
            .is_closing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.send_direct(DirectCommand::Close).await
    }

    pub async fn change(&self, config: ContainerConfiguration) -> bool {
        if self.shared.disposed.load(Ordering::SeqCst) || !self.shared.state().is_open() {
            return false;
        }
        if self
            .shared
            .is_changing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.send_direct(DirectCommand::Change(config)).await
    }

    pub async fn play(&self) -> bool {
        self.send_priority(PriorityCommand::Play).await
    }

    pub async fn pause(&self) -> bool {
        self.send_priority(PriorityCommand::Pause).await
    }

    pub async fn stop(&self) -> bool {
        self.send_priority(PriorityCommand::Stop).await
    }

    pub async fn seek(&self, target: Duration) -> bool {
        self.send_seek(SeekOperation::new(target, SeekMode::Normal))
            .await
    }

    pub async fn step_forward(&self) -> bool {
        self.send_seek(SeekOperation::new(Duration::ZERO, SeekMode::StepForward))
            .await
    }

    pub async fn step_backward(&self) -> bool {
        self.send_seek(SeekOperation::new(Duration::ZERO, SeekMode::StepBackward))
            .await
    }

    pub(crate) fn shutdown(&mut self) {
        let _ = self.tx.lock().send(Envelope::Shutdown);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn processor_loop(shared: &Arc<EngineShared>, rx: &mpsc::Receiver<Envelope>, queue: &Arc<CommandQueue>) {
    'outer: loop {
        let first = match rx.recv_timeout(Duration::from_millis(50)) {
            Ok(envelope) => Some(envelope),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => break 'outer,
        };

        let mut batch = Vec::new();
        if let Some(envelope) = first {
            batch.push(envelope);
        }
        loop {
            match rx.try_recv() {
                Ok(envelope) => batch.push(envelope),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break 'outer,
            }
        }

        for envelope in batch {
            match envelope {
                Envelope::Shutdown => break 'outer,
                Envelope::Direct(cmd, reply) => {
                    cancel_queued_seek(shared, queue);
                    let ok = execute_direct(shared, cmd);
                    let _ = reply.send(ok);
                }
                Envelope::Priority(cmd, reply) => {
                    let ok = execute_priority(shared, queue, cmd);
                    let _ = reply.send(ok);
                }
                Envelope::Seek(op, reply) => enqueue_seek(shared, queue, op, reply),
            }
        }

        run_queued_seek(shared, queue);
    }

    run_queued_seek(shared, queue);
    if let Some((_, reply)) = queue.queued_seek.lock().take() {
        let _ = reply.send(false);
    }
    if let Some(mut workers) = shared.worker_set.lock().take() {
        workers.dispose();
    }
}

/// A seek enqueued while another is already queued overwrites it; only the
/// `None -> Some` transition counts as a new pending seek (spec §4.1,
/// "Seek-state bookkeeping").
fn enqueue_seek(shared: &Arc<EngineShared>, queue: &Arc<CommandQueue>, op: SeekOperation, reply: Reply) {
    let mut slot = queue.queued_seek.lock();
    let was_empty = slot.is_none();
    if let Some((_, old_reply)) = slot.replace((op, reply)) {
        let _ = old_reply.send(false);
    }
    drop(slot);

    if was_empty {
        shared.pending_seek_count.fetch_add(1, Ordering::SeqCst);
        shared.is_seeking.store(true, Ordering::SeqCst);
        shared.connector.on_seeking_started();
        if op.mode == SeekMode::Normal {
            let playing = shared.state().playback() == Some(PlaybackState::Play);
            queue.play_after_seek.store(playing, Ordering::SeqCst);
        }
    }
}

fn cancel_queued_seek(shared: &Arc<EngineShared>, queue: &Arc<CommandQueue>) {
    let Some((_, reply)) = queue.queued_seek.lock().take() else {
        return;
    };
    let _ = reply.send(false);
    let remaining = shared.pending_seek_count.fetch_sub(1, Ordering::SeqCst) - 1;
    if remaining == 0 {
        shared.is_seeking.store(false, Ordering::SeqCst);
        queue.play_after_seek.store(false, Ordering::SeqCst);
        shared.connector.on_seeking_ended();
    }
}

fn run_queued_seek(shared: &Arc<EngineShared>, queue: &Arc<CommandQueue>) {
    let Some((op, reply)) = queue.queued_seek.lock().take() else {
        return;
    };

    *shared.current_seek_mode.lock() = Some(op.mode);
    let ok = seek::perform(shared, op);
    *shared.current_seek_mode.lock() = None;

    let remaining = shared.pending_seek_count.fetch_sub(1, Ordering::SeqCst) - 1;
    if remaining == 0 {
        shared.is_seeking.store(false, Ordering::SeqCst);
        shared.connector.on_seeking_ended();
        if queue.play_after_seek.swap(false, Ordering::SeqCst) {
            resume_playback(shared);
        }
    }
    let _ = reply.send(ok);
}

fn resume_playback(shared: &Arc<EngineShared>) {
    shared.timing.play(MediaType::None);
    if let Some(workers) = shared.worker_set.lock().as_ref() {
        workers.resume_all();
    }
    shared.for_each_renderer(|_, r| r.on_play());
    shared.set_state(MediaState::Open(PlaybackState::Play));
}

fn execute_direct(shared: &Arc<EngineShared>, cmd: DirectCommand) -> bool {
    debug!("executing direct command: {}", cmd.name());
    match cmd {
        DirectCommand::Open(source) => execute_open(shared, source),
        DirectCommand::Close => execute_close(shared),
        DirectCommand::Change(config) => execute_change(shared, config),
    }
}

/// Process-wide, lazily-initialized one-time bring-up (spec §9, "Global
/// state": "the `load_ffmpeg` one-time initialization is process-wide...
/// all callers go through the engine's `open` path"). `on_media_initializing`
/// fires exactly once across the process's lifetime, on whichever engine's
/// `open` call reaches it first; every subsequent call (on this engine or
/// any other) skips straight to `on_media_opening`.
static GLOBAL_INIT: std::sync::Once = std::sync::Once::new();

fn execute_open(shared: &Arc<EngineShared>, source: OpenSource) -> bool {
    GLOBAL_INIT.call_once(|| shared.connector.on_media_initializing());
    shared.set_state(MediaState::Opening);
    shared.connector.on_media_opening();

    let uri = match &source {
        OpenSource::Uri(s) => Some(s.clone()),
        OpenSource::Stream(_) => None,
    };

    let result = (move || -> Result<(), EngineError> {
        let mut config = shared.config.read().clone();
        let normalized = source.normalized();
        if let Some(format) = normalized.as_ref().and_then(|n| n.forced_input_format.clone()) {
            config.forced_input_format = Some(format);
        }
        let open_source = match (source, normalized) {
            (OpenSource::Uri(_), Some(n)) => OpenSource::Uri(n.url),
            (other, _) => other,
        };
        let mut container = shared.container_factory.open(&open_source, &config)?;
        container.open()?;
        bring_up_container(shared, container, &config)?;
        Ok(())
    })();

    shared.is_opening.store(false, Ordering::SeqCst);
    match result {
        Ok(()) => {
            *shared.last_uri.lock() = uri;
            shared.set_state(MediaState::Open(PlaybackState::Stop));
            shared.connector.on_media_opened();
            true
        }
        Err(err) => {
            shared.connector.on_media_failed(&err);
            shared.set_state(MediaState::Idle);
            false
        }
    }
}

fn execute_close(shared: &Arc<EngineShared>) -> bool {
    if !shared.state().is_open() {
        shared.is_closing.store(false, Ordering::SeqCst);
        return false;
    }
    shared.set_state(MediaState::Closing);
    shared.connector.on_media_closing();

    if let Some(container) = shared.container.lock().as_mut() {
        container.signal_abort_reads(true);
    }
    shared.buffer_changed.set();
    if let Some(mut workers) = shared.worker_set.lock().take() {
        workers.dispose();
    }
    if let Some(mut container) = shared.container.lock().take() {
        container.dispose();
    }

    shared.for_each_renderer(|_, r| r.on_close());
    shared.renderers.write().clear();
    *shared.preloaded_subtitles.write() = None;
    shared.buffers.dispose();
    shared.timing.reset(MediaType::None);
    *shared.main_media_type.lock() = MediaType::None;
    *shared.last_uri.lock() = None;
    shared.decoding_ended.store(false, Ordering::SeqCst);
    shared.media_ended.store(false, Ordering::SeqCst);
    shared.sync_buffering.store(false, Ordering::SeqCst);
    shared.reads_aborted.store(false, Ordering::SeqCst);
    shared.last_rendered_index.lock().clear();
    shared.last_render_time.lock().clear();

    shared.is_closing.store(false, Ordering::SeqCst);
    shared.set_state(MediaState::Idle);
    shared.connector.on_media_closed();
    true
}

/// Re-opens the last-used URI under a new configuration. A source opened
/// from a custom stream cannot be replayed, so `change` is refused for it
/// (a deliberate narrowing of the generic "consults new media options"
/// contract to what an in-memory `Read` source can actually support).
fn execute_change(shared: &Arc<EngineShared>, config: ContainerConfiguration) -> bool {
    if !shared.state().is_open() {
        shared.is_changing.store(false, Ordering::SeqCst);
        return false;
    }
    let Some(uri) = shared.last_uri.lock().clone() else {
        shared.is_changing.store(false, Ordering::SeqCst);
        return false;
    };

    let prior_playback = shared.state().playback();
    shared.set_state(MediaState::Changing);
    shared.connector.on_media_changing();

    if let Some(mut workers) = shared.worker_set.lock().take() {
        workers.dispose();
    }
    if let Some(mut container) = shared.container.lock().take() {
        container.dispose();
    }

    *shared.config.write() = config.clone();
    let result = (|| -> Result<(), EngineError> {
        let mut config = config.clone();
        let normalized = uri::normalize(&uri);
        if let Some(format) = normalized.forced_input_format.clone() {
            config.forced_input_format = Some(format);
        }
        let source = OpenSource::Uri(normalized.url);
        let mut container = shared.container_factory.open(&source, &config)?;
        container.open()?;
        bring_up_container(shared, container, &config)?;
        Ok(())
    })();

    shared.is_changing.store(false, Ordering::SeqCst);
    match result {
        Ok(()) => {
            let playback = prior_playback.unwrap_or(PlaybackState::Stop);
            shared.set_state(MediaState::Open(playback));
            if playback == PlaybackState::Play {
                resume_playback(shared);
            }
            shared.connector.on_media_changed();
            true
        }
        Err(err) => {
            shared.connector.on_media_failed(&err);
            shared.set_state(MediaState::Idle);
            false
        }
    }
}

/// Shared bring-up sequence for `open` and `change`: selects the main
/// component, builds renderers and block buffers, sets up the timing
/// controller and starts the worker set (spec §3 Lifecycle).
fn bring_up_container(
    shared: &Arc<EngineShared>,
    mut container: Box<dyn Container>,
    config: &ContainerConfiguration,
) -> Result<(), EngineError> {
    let main_type = container.components().main_media_type();
    let has_audio = container.components().has_component(MediaType::Audio);
    let has_video = container.components().has_component(MediaType::Video);
    if !has_audio && !has_video {
        return Err(EngineError::OpenFailed);
    }

    let mut component_times = HashMap::new();
    let mut renderers = HashMap::new();
    for t in MediaType::ALL {
        if !container.components().has_component(t) {
            continue;
        }
        if let Some((start_time, end_time)) = container.components().time_range(t) {
            component_times.insert(t, ComponentTimes { start_time, end_time });
        }
        if t == MediaType::Subtitle && config.is_subtitle_disabled {
            continue;
        }
        if let Some(renderer) = shared.renderer_factory.create(t) {
            renderers.insert(t, Mutex::new(renderer));
        }
    }

    *shared.main_media_type.lock() = main_type;
    *shared.renderers.write() = renderers;
    preload_subtitles(shared, config);

    shared.is_live.store(container.is_live_stream(), Ordering::SeqCst);
    shared.is_seekable.store(container.is_stream_seekable(), Ordering::SeqCst);
    shared.can_pause.store(!container.is_live_stream(), Ordering::SeqCst);
    shared.decoding_ended.store(false, Ordering::SeqCst);
    shared.media_ended.store(false, Ordering::SeqCst);
    shared.sync_buffering.store(false, Ordering::SeqCst);
    shared.reads_aborted.store(false, Ordering::SeqCst);
    shared.last_rendered_index.lock().clear();
    shared.last_render_time.lock().clear();

    shared.buffers.setup(|_| 64);
    shared.buffer_changed.set();

    shared.timing.setup(
        config.is_time_sync_disabled,
        container.is_stream_seekable(),
        has_audio,
        has_video,
        main_type,
        component_times,
    );

    *shared.container.lock() = Some(container);
    *shared.worker_set.lock() = Some(WorkerSet::start(shared));
    Ok(())
}

/// Fetches `config.subtitles_url` (if set and subtitles are not disabled)
/// through the host's [`SubtitleLoader`](crate::subtitle::SubtitleLoader)
/// and stores the result for the rendering worker (spec §4.5 step 5, §7
/// `SubtitlePreloadFailed`). A missing loader or a failed fetch is logged
/// as a warning and playback continues without side-loaded subtitles.
fn preload_subtitles(shared: &Arc<EngineShared>, config: &ContainerConfiguration) {
    *shared.preloaded_subtitles.write() = None;
    if config.is_subtitle_disabled {
        return;
    }
    let Some(url) = config.subtitles_url.as_deref() else {
        return;
    };
    let Some(loader) = shared.subtitle_loader.as_ref() else {
        warn!("subtitle preload requested for {url} but no subtitle loader is configured");
        return;
    };
    match loader.load(url) {
        Ok(blocks) => {
            *shared.preloaded_subtitles.write() =
                Some(crate::subtitle::PreloadedSubtitles::new(blocks, config.subtitles_delay));
        }
        Err(err) => {
            warn!("subtitle preload failed: {err}");
            shared.connector.on_message_logged(&err.to_string());
        }
    }
}

fn execute_priority(shared: &Arc<EngineShared>, queue: &Arc<CommandQueue>, cmd: PriorityCommand) -> bool {
    if !shared.state().is_open() {
        return false;
    }
    match cmd {
        PriorityCommand::Play => {
            if shared.media_ended.load(Ordering::SeqCst) && shared.is_seekable.load(Ordering::SeqCst) {
                return false;
            }
            resume_playback(shared);
            true
        }
        PriorityCommand::Pause => {
            if !shared.can_pause.load(Ordering::SeqCst) {
                return false;
            }
            shared.timing.pause(MediaType::None);
            if let Some(workers) = shared.worker_set.lock().as_ref() {
                workers.pause_all(false);
            }
            shared.for_each_renderer(|_, r| r.on_pause());
            shared.set_state(MediaState::Open(PlaybackState::Pause));
            true
        }
        PriorityCommand::Stop => {
            shared.timing.pause(MediaType::None);
            if let Some(workers) = shared.worker_set.lock().as_ref() {
                workers.pause_all(false);
            }
            shared.for_each_renderer(|_, r| r.on_stop());
            shared.set_state(MediaState::Open(PlaybackState::Stop));
            if shared.is_seekable.load(Ordering::SeqCst) {
                let (reply, _rx) = oneshot::channel();
                enqueue_seek(shared, queue, SeekOperation::new(Duration::ZERO, SeekMode::Stop), reply);
            }
            true
        }
    }
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
    fn first_enqueue_marks_seeking_and_counts_one() {
        let shared = bare_shared();
        let queue = Arc::new(CommandQueue::new());
        shared.set_state(MediaState::Open(PlaybackState::Play));
        let (reply, _rx) = oneshot::channel();

        enqueue_seek(&shared, &queue, SeekOperation::new(Duration::from_secs(1), SeekMode::Normal), reply);

        assert_eq!(shared.pending_seek_count.load(Ordering::SeqCst), 1);
        assert!(shared.is_seeking.load(Ordering::SeqCst));
        assert!(queue.play_after_seek.load(Ordering::SeqCst));
    }

    #[test]
    fn second_enqueue_overwrites_and_resolves_superseded_reply_false() {
        let shared = bare_shared();
        let queue = Arc::new(CommandQueue::new());
        let (reply1, mut rx1) = oneshot::channel();
        let (reply2, _rx2) = oneshot::channel();

        enqueue_seek(&shared, &queue, SeekOperation::new(Duration::from_secs(2), SeekMode::Normal), reply1);
        enqueue_seek(&shared, &queue, SeekOperation::new(Duration::from_secs(4), SeekMode::Normal), reply2);

        assert_eq!(rx1.try_recv(), Ok(false));
        // Only the None -> Some transition counts (spec §4.1, "Seek-state bookkeeping").
        assert_eq!(shared.pending_seek_count.load(Ordering::SeqCst), 1);
        assert_eq!(queue.queued_seek.lock().as_ref().unwrap().0.target, Duration::from_secs(4));
    }

    #[test]
    fn cancel_resolves_false_and_clears_seeking_flag() {
        let shared = bare_shared();
        let queue = Arc::new(CommandQueue::new());
        let (reply, mut rx) = oneshot::channel();
        enqueue_seek(&shared, &queue, SeekOperation::new(Duration::from_secs(1), SeekMode::Normal), reply);

        cancel_queued_seek(&shared, &queue);

        assert_eq!(rx.try_recv(), Ok(false));
        assert_eq!(shared.pending_seek_count.load(Ordering::SeqCst), 0);
        assert!(!shared.is_seeking.load(Ordering::SeqCst));
        assert!(queue.queued_seek.lock().is_none());
    }

    #[test]
    fn preload_subtitles_noop_when_url_unset() {
        let shared = bare_shared();
        preload_subtitles(&shared, &ContainerConfiguration::default());
        assert!(shared.preloaded_subtitles.read().is_none());
    }

    #[test]
    fn preload_subtitles_skips_fetch_when_disabled() {
        let shared = bare_shared();
        let config = ContainerConfiguration::builder()
            .subtitles_url("https://example.test/subs.srt")
            .is_subtitle_disabled(true)
            .build();
        preload_subtitles(&shared, &config);
        assert!(shared.preloaded_subtitles.read().is_none());
    }

    #[test]
    fn preload_subtitles_leaves_store_empty_without_a_configured_loader() {
        let shared = bare_shared();
        let config = ContainerConfiguration::builder()
            .subtitles_url("https://example.test/subs.srt")
            .build();
        preload_subtitles(&shared, &config);
        assert!(shared.preloaded_subtitles.read().is_none());
    }

    #[test]
    fn run_queued_seek_fast_path_resolves_true_and_ends_seeking() {
        let shared = bare_shared();
        shared.buffers.setup(|_| 64);
        shared.buffers.add(audio_block(0, 2_000));
        let queue = Arc::new(CommandQueue::new());
        let (reply, mut rx) = oneshot::channel();
        enqueue_seek(&shared, &queue, SeekOperation::new(Duration::from_millis(500), SeekMode::Normal), reply);

        run_queued_seek(&shared, &queue);

        assert_eq!(rx.try_recv(), Ok(true));
        assert_eq!(shared.pending_seek_count.load(Ordering::SeqCst), 0);
        assert!(!shared.is_seeking.load(Ordering::SeqCst));
        assert_eq!(shared.timing.position(MediaType::Audio), Duration::from_millis(500));
    }
}
