//! In-memory test doubles for the `Container`, `Renderer` and `Connector`
//! collaborators (spec §1: these are declared-but-unspecified external
//! collaborators). Used by the end-to-end scenarios in `../e2e.rs` to
//! drive a real [`MediaEngine`] — real command-processor thread, real
//! worker threads — against a scripted, in-memory timeline instead of a
//! real demuxer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use playback_engine::{
    Components, Connector, Container, ContainerFactory, EngineError, MediaBlock, MediaState,
    MediaType, OpenSource, PacketQueueStats, Payload, Renderer, RendererFactory,
};

/// Number of queued-but-undecoded frames a component holds before the
/// packet reading worker backs off (mirrors spec §4.3's packet-queue
/// backpressure at a much smaller, test-friendly scale).
const QUEUE_THRESHOLD: usize = 8;

#[must_use]
pub fn audio_timeline(count: usize, frame_ms: u64) -> Vec<MediaBlock> {
    (0..count)
        .map(|i| {
            let start = Duration::from_millis(i as u64 * frame_ms);
            let end = start + Duration::from_millis(frame_ms);
            MediaBlock::new(
                start,
                end,
                0,
                Payload::Audio {
                    samples: Arc::from(vec![0.0_f32; 4]),
                    channels: 2,
                },
            )
        })
        .collect()
}

#[must_use]
pub fn video_timeline(count: usize, frame_ms: u64) -> Vec<MediaBlock> {
    (0..count)
        .map(|i| {
            let start = Duration::from_millis(i as u64 * frame_ms);
            let end = start + Duration::from_millis(frame_ms);
            MediaBlock::new(
                start,
                end,
                0,
                Payload::Video {
                    pixels: Arc::from(vec![0_u8; 16]),
                    width: 4,
                    height: 4,
                    is_attached_picture: false,
                    timecode: None,
                    is_closed_caption: false,
                },
            )
        })
        .collect()
}

/// A scripted timeline for one `open()` call: the full, never-mutated set
/// of frames each present component will ever produce, plus the stream
/// flags the container reports.
#[derive(Clone, Default)]
pub struct TimelineSpec {
    pub audio: Vec<MediaBlock>,
    pub video: Vec<MediaBlock>,
    pub main: MediaType,
    pub is_live: bool,
    pub is_network: bool,
    pub is_seekable: bool,
}

impl TimelineSpec {
    #[must_use]
    pub fn audio_video(audio: Vec<MediaBlock>, video: Vec<MediaBlock>, main: MediaType) -> Self {
        Self {
            audio,
            video,
            main,
            is_live: false,
            is_network: false,
            is_seekable: true,
        }
    }
}

/// Per-component read/decode cursors into a `TimelineSpec`'s frames.
/// `read_cursor` counts how many frames have been "packetized" (enqueued
/// by [`Container::read`]); `decode_cursor` counts how many of those have
/// actually been handed to [`Components::receive_next_frame`]. The gap
/// between them is the component's queued-packet count.
struct ComponentState {
    frames: Vec<MediaBlock>,
    read_cursor: usize,
    decode_cursor: usize,
}

impl ComponentState {
    fn new(frames: Vec<MediaBlock>) -> Self {
        Self {
            frames,
            read_cursor: 0,
            decode_cursor: 0,
        }
    }

    fn queued(&self) -> usize {
        self.read_cursor - self.decode_cursor
    }

    fn fully_read(&self) -> bool {
        self.read_cursor >= self.frames.len()
    }
}

/// An in-memory stand-in for the demuxer/decoder collaborator (spec §6,
/// "Container interface"). Round-robins `read()` across present
/// components and serves `receive_next_frame` from each component's own
/// cursor; `seek` relocates every component's cursors to the requested
/// container-level target and returns the landing frame directly, the
/// way a real demuxer's seek would.
pub struct FakeContainer {
    components: HashMap<MediaType, ComponentState>,
    main: MediaType,
    read_turn: usize,
    aborted: bool,
    is_live: bool,
    is_network: bool,
    is_seekable: bool,
}

impl FakeContainer {
    fn new(spec: &TimelineSpec) -> Self {
        let mut components = HashMap::new();
        if !spec.audio.is_empty() {
            components.insert(MediaType::Audio, ComponentState::new(spec.audio.clone()));
        }
        if !spec.video.is_empty() {
            components.insert(MediaType::Video, ComponentState::new(spec.video.clone()));
        }
        Self {
            components,
            main: spec.main,
            read_turn: 0,
            aborted: false,
            is_live: spec.is_live,
            is_network: spec.is_network,
            is_seekable: spec.is_seekable,
        }
    }
}

impl Components for FakeContainer {
    fn main_media_type(&self) -> MediaType {
        self.main
    }

    fn has_component(&self, media_type: MediaType) -> bool {
        self.components.contains_key(&media_type)
    }

    fn receive_next_frame(&mut self, media_type: MediaType) -> Result<Option<MediaBlock>, EngineError> {
        let Some(c) = self.components.get_mut(&media_type) else {
            return Ok(None);
        };
        if c.decode_cursor < c.read_cursor {
            let block = c.frames[c.decode_cursor].clone();
            c.decode_cursor += 1;
            Ok(Some(block))
        } else {
            Ok(None)
        }
    }

    fn buffer_length(&self, media_type: MediaType) -> usize {
        self.components.get(&media_type).map_or(0, ComponentState::queued)
    }

    fn has_enough_packets(&self) -> bool {
        self.components
            .values()
            .all(|c| c.queued() >= QUEUE_THRESHOLD || c.fully_read())
    }

    fn packet_queue_stats(&self, media_type: MediaType) -> Option<PacketQueueStats> {
        self.components.get(&media_type).map(|c| PacketQueueStats {
            length: c.queued(),
            count: c.queued(),
            count_threshold: QUEUE_THRESHOLD,
            duration: Duration::from_millis(100),
        })
    }

    fn time_range(&self, media_type: MediaType) -> Option<(Duration, Duration)> {
        let c = self.components.get(&media_type)?;
        Some((c.frames.first()?.start_time, c.frames.last()?.end_time))
    }
}

impl Container for FakeContainer {
    fn open(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    fn dispose(&mut self) {}

    fn flush(&mut self) -> Result<(), EngineError> {
        for c in self.components.values_mut() {
            c.read_cursor = c.decode_cursor;
        }
        Ok(())
    }

    fn read(&mut self) -> Result<MediaType, EngineError> {
        let types: Vec<MediaType> = self.components.keys().copied().collect();
        for i in 0..types.len() {
            let idx = (self.read_turn + i) % types.len();
            let t = types[idx];
            let c = self.components.get_mut(&t).expect("component present");
            if c.read_cursor < c.frames.len() {
                c.read_cursor += 1;
                self.read_turn = (idx + 1) % types.len().max(1);
                return Ok(t);
            }
        }
        Ok(MediaType::None)
    }

    fn seek(&mut self, target: Duration) -> Result<MediaBlock, EngineError> {
        let main = self.main;
        let land_idx = {
            let c = self
                .components
                .get(&main)
                .ok_or_else(|| EngineError::MediaContainerError("no main component".into()))?;
            c.frames
                .iter()
                .position(|b| b.start_time >= target)
                .unwrap_or_else(|| c.frames.len().saturating_sub(1))
        };
        let landing_start = self.components[&main].frames[land_idx].start_time;

        let types: Vec<MediaType> = self.components.keys().copied().collect();
        let mut first_block = None;
        for t in types {
            let c = self.components.get_mut(&t).expect("component present");
            let idx = if t == main {
                land_idx
            } else {
                c.frames
                    .iter()
                    .position(|b| b.start_time >= landing_start)
                    .unwrap_or(c.frames.len())
            };
            c.read_cursor = idx;
            c.decode_cursor = idx;
            if t == main && idx < c.frames.len() {
                first_block = Some(c.frames[idx].clone());
                c.read_cursor = idx + 1;
                c.decode_cursor = idx + 1;
            }
        }
        first_block.ok_or_else(|| EngineError::MediaContainerError("seek past end of stream".into()))
    }

    fn components(&mut self) -> &mut dyn Components {
        self
    }

    fn signal_abort_reads(&mut self, _immediate: bool) {
        self.aborted = true;
    }

    fn is_read_aborted(&self) -> bool {
        self.aborted
    }

    fn is_at_end_of_stream(&self) -> bool {
        self.components.values().all(ComponentState::fully_read)
    }

    fn is_live_stream(&self) -> bool {
        self.is_live
    }

    fn is_network_stream(&self) -> bool {
        self.is_network
    }

    fn is_stream_seekable(&self) -> bool {
        self.is_seekable
    }
}

/// Builds [`FakeContainer`]s from a [`TimelineSpec`]; fails `open` for any
/// URI starting with `fail://`, so tests can exercise `OpenFailed`.
pub struct FakeContainerFactory {
    pub spec: TimelineSpec,
}

impl ContainerFactory for FakeContainerFactory {
    fn open(
        &self,
        source: &OpenSource,
        _config: &playback_engine::ContainerConfiguration,
    ) -> Result<Box<dyn Container>, EngineError> {
        if let OpenSource::Uri(uri) = source {
            if uri.starts_with("fail://") {
                return Err(EngineError::OpenFailed);
            }
        }
        Ok(Box::new(FakeContainer::new(&self.spec)))
    }
}

/// Per-renderer event counters and a log of every rendered `(block index,
/// position)` pair, recorded across the rendering worker thread.
#[derive(Default)]
pub struct RenderEvents {
    pub rendered: Mutex<Vec<(u64, Duration)>>,
    pub play_count: AtomicUsize,
    pub pause_count: AtomicUsize,
    pub stop_count: AtomicUsize,
    pub seek_count: AtomicUsize,
    pub close_count: AtomicUsize,
}

impl RenderEvents {
    #[must_use]
    pub fn render_count(&self) -> usize {
        self.rendered.lock().unwrap().len()
    }
}

pub struct RecordingRenderer {
    events: Arc<RenderEvents>,
}

impl Renderer for RecordingRenderer {
    fn on_play(&mut self) {
        self.events.play_count.fetch_add(1, Ordering::SeqCst);
    }
    fn on_pause(&mut self) {
        self.events.pause_count.fetch_add(1, Ordering::SeqCst);
    }
    fn on_stop(&mut self) {
        self.events.stop_count.fetch_add(1, Ordering::SeqCst);
    }
    fn on_close(&mut self) {
        self.events.close_count.fetch_add(1, Ordering::SeqCst);
    }
    fn on_seek(&mut self) {
        self.events.seek_count.fetch_add(1, Ordering::SeqCst);
    }
    fn render(&mut self, block: &MediaBlock, position: Duration) {
        self.events.rendered.lock().unwrap().push((block.index, position));
    }
}

pub struct RecordingRendererFactory {
    pub audio: Arc<RenderEvents>,
    pub video: Arc<RenderEvents>,
}

impl RendererFactory for RecordingRendererFactory {
    fn create(&self, media_type: MediaType) -> Option<Box<dyn Renderer>> {
        match media_type {
            MediaType::Audio => Some(Box::new(RecordingRenderer {
                events: Arc::clone(&self.audio),
            })),
            MediaType::Video => Some(Box::new(RecordingRenderer {
                events: Arc::clone(&self.video),
            })),
            _ => None,
        }
    }
}

/// Every connector notification the core can emit, tallied and logged for
/// assertions (spec §6, "Connector interface").
#[derive(Default)]
pub struct ConnectorEvents {
    pub log: Mutex<Vec<String>>,
    pub seeking_started: AtomicUsize,
    pub seeking_ended: AtomicUsize,
    pub media_ended: AtomicUsize,
    pub media_failed: AtomicUsize,
    pub buffering_started: AtomicUsize,
    pub buffering_ended: AtomicUsize,
    pub last_position: Mutex<Duration>,
}

impl ConnectorEvents {
    #[must_use]
    pub fn log_count(&self, needle: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|s| s.as_str() == needle).count()
    }
}

pub struct RecordingConnector {
    pub events: Arc<ConnectorEvents>,
}

impl Connector for RecordingConnector {
    fn on_media_opening(&self) {
        self.events.log.lock().unwrap().push("opening".into());
    }
    fn on_media_opened(&self) {
        self.events.log.lock().unwrap().push("opened".into());
    }
    fn on_media_closing(&self) {
        self.events.log.lock().unwrap().push("closing".into());
    }
    fn on_media_closed(&self) {
        self.events.log.lock().unwrap().push("closed".into());
    }
    fn on_media_changing(&self) {
        self.events.log.lock().unwrap().push("changing".into());
    }
    fn on_media_changed(&self) {
        self.events.log.lock().unwrap().push("changed".into());
    }
    fn on_media_failed(&self, err: &EngineError) {
        self.events.media_failed.fetch_add(1, Ordering::SeqCst);
        self.events.log.lock().unwrap().push(format!("failed: {err}"));
    }
    fn on_buffering_started(&self) {
        self.events.buffering_started.fetch_add(1, Ordering::SeqCst);
    }
    fn on_buffering_ended(&self) {
        self.events.buffering_ended.fetch_add(1, Ordering::SeqCst);
    }
    fn on_seeking_started(&self) {
        self.events.seeking_started.fetch_add(1, Ordering::SeqCst);
    }
    fn on_seeking_ended(&self) {
        self.events.seeking_ended.fetch_add(1, Ordering::SeqCst);
    }
    fn on_media_ended(&self) {
        self.events.media_ended.fetch_add(1, Ordering::SeqCst);
    }
    fn on_media_state_changed(&self, old: MediaState, new: MediaState) {
        self.events.log.lock().unwrap().push(format!("state {old} -> {new}"));
    }
    fn on_position_changed(&self, _old: Duration, new: Duration) {
        *self.events.last_position.lock().unwrap() = new;
    }
}

/// Test harness bundle: the engine plus every recorder wired into it.
pub struct Harness {
    pub engine: playback_engine::MediaEngine,
    pub connector: Arc<ConnectorEvents>,
    pub audio: Arc<RenderEvents>,
    pub video: Arc<RenderEvents>,
}

#[must_use]
pub fn build_engine(spec: TimelineSpec, config: playback_engine::ContainerConfiguration) -> Harness {
    let connector = Arc::new(ConnectorEvents::default());
    let audio = Arc::new(RenderEvents::default());
    let video = Arc::new(RenderEvents::default());

    let container_factory = Box::new(FakeContainerFactory { spec });
    let renderer_factory = Box::new(RecordingRendererFactory {
        audio: Arc::clone(&audio),
        video: Arc::clone(&video),
    });
    let connector_box = Box::new(RecordingConnector {
        events: Arc::clone(&connector),
    });

    let engine = playback_engine::MediaEngine::new(container_factory, renderer_factory, Some(connector_box), config);
    Harness {
        engine,
        connector,
        audio,
        video,
    }
}

/// Polls `cond` every 20ms up to `timeout`, returning whether it became
/// true. Used instead of a fixed `sleep` so assertions settle as soon as
/// the real worker threads catch up rather than racing a guessed delay.
pub async fn wait_until(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let start = std::time::Instant::now();
    loop {
        if cond() {
            return true;
        }
        if start.elapsed() >= timeout {
            return cond();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[allow(dead_code)]
pub fn default_av_spec(frame_count: usize, frame_ms: u64) -> TimelineSpec {
    TimelineSpec::audio_video(
        audio_timeline(frame_count, frame_ms),
        video_timeline(frame_count, frame_ms),
        MediaType::Video,
    )
}
