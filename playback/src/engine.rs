//! `MediaEngine`, the public facade (spec §9): the sole owner of the
//! [`CommandManager`], the [`WorkerSet`], the block buffers and the timing
//! controller. Ties together the external collaborators (container,
//! renderers, connector) the host application supplies.

use std::collections::HashMap;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mediacore::{config::ContainerConfiguration, error::EngineError, media_type::MediaType, uri};
use parking_lot::{Mutex, RwLock};

use crate::buffers::BlockBuffers;
use crate::command::manager::CommandManager;
use crate::command::SeekMode;
use crate::connector::{Connector, NullConnector};
use crate::container::Container;
use crate::latch::Latch;
use crate::renderer::Renderer;
use crate::state::MediaState;
use crate::subtitle::{PreloadedSubtitles, SubtitleLoader};
use crate::timing::TimingController;
use crate::worker::WorkerSet;

/// Either a plain URI or a custom input object supplied by the host (spec
/// §4.1: "`open(uri)` or `open(stream)`").
pub enum OpenSource {
    Uri(String),
    Stream(Box<dyn Read + Send>),
}

impl OpenSource {
    /// Applies the URI normalization rules of spec §6 when this source is
    /// a URI; custom streams are passed through to the factory untouched.
    #[must_use]
    pub(crate) fn normalized(&self) -> Option<uri::NormalizedSource> {
        match self {
            OpenSource::Uri(s) => Some(uri::normalize(s)),
            OpenSource::Stream(_) => None,
        }
    }
}

/// Opens a [`Container`] against a normalized source and configuration.
/// The demuxer/decoder library itself is out of scope (spec §1); this
/// trait is the seam the host plugs a real implementation into.
pub trait ContainerFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns [`EngineError::MediaContainerError`] or
    /// [`EngineError::OpenFailed`] on failure to open.
    fn open(
        &self,
        source: &OpenSource,
        config: &ContainerConfiguration,
    ) -> Result<Box<dyn Container>, EngineError>;
}

/// Produces a renderer for a media type the container reports, or `None`
/// if the host does not render that type (spec §6, "Renderer interface").
pub trait RendererFactory: Send + Sync {
    fn create(&self, media_type: MediaType) -> Option<Box<dyn Renderer>>;
}

/// Everything the command processor thread, the three workers, and the
/// seek engine share. Modeled as a single struct behind `Arc` rather than
/// the raw back-pointer the design notes describe (spec §9, "Cyclic
/// graphs"): every long-lived component holds a clone of the same `Arc`,
/// so the "engine owns the manager which points back at the engine"
/// relationship is expressed without an actual reference cycle.
///
/// `renderers` keys its map by a per-type `Mutex` rather than one lock
/// over the whole map so [`crate::worker`]'s rendering cycle can fan the
/// per-type dispatch of spec §4.5 step 5 out across real OS threads via
/// `std::thread::scope` when `use_parallel_rendering` is set, without two
/// renderers ever contending on the same lock.
pub(crate) struct EngineShared {
    pub(crate) config: RwLock<ContainerConfiguration>,
    pub(crate) container_factory: Box<dyn ContainerFactory>,
    pub(crate) renderer_factory: Box<dyn RendererFactory>,
    pub(crate) connector: Box<dyn Connector>,
    pub(crate) subtitle_loader: Option<Box<dyn SubtitleLoader>>,

    pub(crate) container: Mutex<Option<Box<dyn Container>>>,
    pub(crate) renderers: RwLock<HashMap<MediaType, Mutex<Box<dyn Renderer>>>>,
    pub(crate) buffers: BlockBuffers,
    pub(crate) timing: TimingController,
    pub(crate) worker_set: Mutex<Option<WorkerSet>>,
    pub(crate) preloaded_subtitles: RwLock<Option<PreloadedSubtitles>>,

    pub(crate) state: Mutex<MediaState>,
    pub(crate) main_media_type: Mutex<MediaType>,
    pub(crate) last_uri: Mutex<Option<String>>,

    pub(crate) is_opening: AtomicBool,
    pub(crate) is_closing: AtomicBool,
    pub(crate) is_changing: AtomicBool,
    pub(crate) is_seeking: AtomicBool,
    pub(crate) disposed: AtomicBool,

    pub(crate) seek_blocks_available: Latch,
    /// Set whenever the packet-queue/buffer state the reading worker polls
    /// on might have changed (a frame was decoded, reads were aborted, the
    /// stream ended). Lets the reading worker wait instead of spin-polling
    /// (spec §4.3 step 2).
    pub(crate) buffer_changed: Latch,
    pub(crate) current_seek_mode: Mutex<Option<SeekMode>>,
    pub(crate) decoding_ended: AtomicBool,
    pub(crate) sync_buffering: AtomicBool,
    pub(crate) reads_aborted: AtomicBool,
    pub(crate) media_ended: AtomicBool,

    pub(crate) is_live: AtomicBool,
    pub(crate) is_seekable: AtomicBool,
    pub(crate) can_pause: AtomicBool,

    pub(crate) last_rendered_index: Mutex<HashMap<MediaType, u64>>,
    pub(crate) last_render_time: Mutex<HashMap<MediaType, Instant>>,
    pub(crate) last_reported_position: Mutex<Duration>,

    /// Number of enqueued-but-not-yet-completed seek operations (spec
    /// §4.1, "Seek-state bookkeeping"). Owned here (rather than inside
    /// [`CommandManager`]) because the rendering worker reads
    /// [`EngineShared::commands_pending`] every cycle.
    pub(crate) pending_seek_count: std::sync::atomic::AtomicU32,
}

impl EngineShared {
    /// True while any direct command, priority command or queued seek is
    /// in flight. The rendering worker treats this as "commands pending"
    /// throughout spec §4.5.
    pub(crate) fn commands_pending(&self) -> bool {
        self.is_opening.load(Ordering::SeqCst)
            || self.is_closing.load(Ordering::SeqCst)
            || self.is_changing.load(Ordering::SeqCst)
            || self.pending_seek_count.load(Ordering::SeqCst) > 0
    }

    pub(crate) fn main_media_type(&self) -> MediaType {
        *self.main_media_type.lock()
    }

    pub(crate) fn set_state(&self, new: MediaState) {
        let old = {
            let mut state = self.state.lock();
            let old = *state;
            *state = new;
            old
        };
        if old != new {
            self.connector.on_media_state_changed(old, new);
        }
    }

    pub(crate) fn state(&self) -> MediaState {
        *self.state.lock()
    }

    pub(crate) fn for_each_renderer(&self, mut f: impl FnMut(MediaType, &mut dyn Renderer)) {
        for (t, r) in self.renderers.read().iter() {
            f(*t, &mut **r.lock());
        }
    }

    /// The subtitle block covering `position`, preferring the preloaded
    /// store when one was fetched at open/change time (spec §4.5 step 5:
    /// "from the preloaded subtitles store for `Subtitle` if present; else
    /// from the block buffer").
    pub(crate) fn subtitle_block_at(&self, position: Duration) -> Option<mediacore::block::MediaBlock> {
        if let Some(store) = self.preloaded_subtitles.read().as_ref() {
            if !store.is_empty() {
                return store.block_at(position).cloned();
            }
        }
        self.buffers
            .with(MediaType::Subtitle, None, |b| b.block_at(position).cloned())
    }
}

/// The playback control core's public entry point. Construct one per
/// logical player; `open`/`close`/`change` drive its internal worker
/// pipeline through the [`CommandManager`].
pub struct MediaEngine {
    shared: Arc<EngineShared>,
    manager: CommandManager,
}

impl MediaEngine {
    /// Constructs an engine with no subtitle loader; `subtitles_url` is
    /// ignored and [`EngineError::SubtitlePreloadFailed`] never fires.
    #[must_use]
    pub fn new(
        container_factory: Box<dyn ContainerFactory>,
        renderer_factory: Box<dyn RendererFactory>,
        connector: Option<Box<dyn Connector>>,
        config: ContainerConfiguration,
    ) -> Self {
        Self::with_subtitle_loader(container_factory, renderer_factory, connector, config, None)
    }

    /// Constructs an engine that preloads side-loaded subtitles through
    /// `subtitle_loader` whenever `subtitles_url` is set (spec §3, §4.5
    /// step 5, §7).
    #[must_use]
    pub fn with_subtitle_loader(
        container_factory: Box<dyn ContainerFactory>,
        renderer_factory: Box<dyn RendererFactory>,
        connector: Option<Box<dyn Connector>>,
        config: ContainerConfiguration,
        subtitle_loader: Option<Box<dyn SubtitleLoader>>,
    ) -> Self {
        let shared = Arc::new(EngineShared {
            config: RwLock::new(config),
            container_factory,
            renderer_factory,
            connector: connector.unwrap_or_else(|| Box::new(NullConnector)),
            subtitle_loader,
            container: Mutex::new(None),
            renderers: RwLock::new(HashMap::new()),
            buffers: BlockBuffers::new(),
            timing: TimingController::new(),
            worker_set: Mutex::new(None),
            preloaded_subtitles: RwLock::new(None),
            state: Mutex::new(MediaState::Idle),
            main_media_type: Mutex::new(MediaType::None),
            last_uri: Mutex::new(None),
            is_opening: AtomicBool::new(false),
            is_closing: AtomicBool::new(false),
            is_changing: AtomicBool::new(false),
            is_seeking: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            seek_blocks_available: Latch::new(),
            buffer_changed: Latch::new(),
            current_seek_mode: Mutex::new(None),
            decoding_ended: AtomicBool::new(false),
            sync_buffering: AtomicBool::new(false),
            reads_aborted: AtomicBool::new(false),
            media_ended: AtomicBool::new(false),
            is_live: AtomicBool::new(false),
            is_seekable: AtomicBool::new(true),
            can_pause: AtomicBool::new(true),
            last_rendered_index: Mutex::new(HashMap::new()),
            last_render_time: Mutex::new(HashMap::new()),
            last_reported_position: Mutex::new(Duration::ZERO),
            pending_seek_count: std::sync::atomic::AtomicU32::new(0),
        });
        let manager = CommandManager::start(Arc::clone(&shared));
        Self { shared, manager }
    }

    #[must_use]
    pub fn state(&self) -> MediaState {
        self.shared.state()
    }

    #[must_use]
    pub fn position(&self, media_type: MediaType) -> Duration {
        self.shared.timing.position(media_type)
    }

    #[must_use]
    pub fn duration(&self, media_type: MediaType) -> Duration {
        self.shared.timing.duration(media_type)
    }

    #[must_use]
    pub fn is_seeking(&self) -> bool {
        self.shared.is_seeking.load(Ordering::SeqCst)
    }

    pub async fn open(&self, source: OpenSource) -> bool {
        self.manager.open(source).await
    }

    pub async fn close(&self) -> bool {
        self.manager.close().await
    }

    pub async fn change(&self, config: ContainerConfiguration) -> bool {
        self.manager.change(config).await
    }

    pub async fn play(&self) -> bool {
        self.manager.play().await
    }

    pub async fn pause(&self) -> bool {
        self.manager.pause().await
    }

    pub async fn stop(&self) -> bool {
        self.manager.stop().await
    }

    pub async fn seek(&self, target: Duration) -> bool {
        self.manager.seek(target).await
    }

    pub async fn step_forward(&self) -> bool {
        self.manager.step_forward().await
    }

    pub async fn step_backward(&self) -> bool {
        self.manager.step_backward().await
    }
}


impl Drop for MediaEngine {
    fn drop(&mut self) {
        self.shared.disposed.store(true, Ordering::SeqCst);
        self.manager.shutdown();
    }
}

/// Mirrors the teacher's `PlayerTrait` seam (`playback/src/lib.rs`): an
/// object-safe surface a host can hold as `Box<dyn PlayerFacade>` without
/// naming `MediaEngine` directly. `async_trait` reproduces the awaitable
/// public contract spec §9 calls for without making the internal workers
/// coroutines themselves.
#[async_trait]
pub trait PlayerFacade: Send + Sync {
    async fn open(&self, source: OpenSource) -> bool;
    async fn close(&self) -> bool;
    async fn change(&self, config: ContainerConfiguration) -> bool;
    async fn play(&self) -> bool;
    async fn pause(&self) -> bool;
    async fn stop(&self) -> bool;
    async fn seek(&self, target: Duration) -> bool;
    async fn step_forward(&self) -> bool;
    async fn step_backward(&self) -> bool;
}

#[async_trait]
impl PlayerFacade for MediaEngine {
    async fn open(&self, source: OpenSource) -> bool {
        MediaEngine::open(self, source).await
    }
    async fn close(&self) -> bool {
        MediaEngine::close(self).await
    }
    async fn change(&self, config: ContainerConfiguration) -> bool {
        MediaEngine::change(self, config).await
    }
    async fn play(&self) -> bool {
        MediaEngine::play(self).await
    }
    async fn pause(&self) -> bool {
        MediaEngine::pause(self).await
    }
    async fn stop(&self) -> bool {
        MediaEngine::stop(self).await
    }
    async fn seek(&self, target: Duration) -> bool {
        MediaEngine::seek(self, target).await
    }
    async fn step_forward(&self) -> bool {
        MediaEngine::step_forward(self).await
    }
    async fn step_backward(&self) -> bool {
        MediaEngine::step_backward(self).await
    }
}
