//! The timing controller: up to two real-time clocks (audio + video), an
//! optional disconnected mode, per-type start-time offsets, and a
//! reference component for reporting (spec §4.7).

use std::collections::HashMap;
use std::time::Duration;

use mediacore::{clock::RealTimeClock, media_type::MediaType};
use parking_lot::Mutex;

/// Start/end/duration metadata the container reports for one component,
/// used to derive [`TimingController::duration`], [`TimingController::start_time`]
/// and [`TimingController::end_time`] without touching the clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentTimes {
    pub start_time: Duration,
    pub end_time: Duration,
}

impl ComponentTimes {
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end_time.saturating_sub(self.start_time)
    }
}

/// Streams do not share a timebase when their reported start times differ
/// by more than this (spec §4.7, "Setup rules").
const TIMEBASE_THRESHOLD: Duration = Duration::from_millis(50);

enum ClockMode {
    /// A single [`RealTimeClock`] shared across every media type.
    Shared(RealTimeClock),
    /// Independent clocks for audio and video; subtitles alias video (spec
    /// §4.7: "Audio and video get independent RealTimeClocks; subtitles
    /// alias video.").
    Disconnected {
        audio: RealTimeClock,
        video: RealTimeClock,
    },
}

impl ClockMode {
    fn clock_mut(&mut self, t: MediaType) -> &mut RealTimeClock {
        match self {
            ClockMode::Shared(c) => c,
            ClockMode::Disconnected { audio, video } => match t {
                MediaType::Audio => audio,
                _ => video,
            },
        }
    }

    fn clock(&self, t: MediaType) -> &RealTimeClock {
        match self {
            ClockMode::Shared(c) => c,
            ClockMode::Disconnected { audio, video } => match t {
                MediaType::Audio => audio,
                _ => video,
            },
        }
    }

    fn is_disconnected(&self) -> bool {
        matches!(self, ClockMode::Disconnected { .. })
    }
}

struct TimingState {
    mode: ClockMode,
    reference: MediaType,
    offsets: HashMap<MediaType, Duration>,
    component_times: HashMap<MediaType, ComponentTimes>,
}

/// Maintains up to three clocks indexed by media type plus a "reference"
/// clock aliasing the chosen reference type, and a table of per-type
/// start-time offsets. Protected by a single lock (spec §5: "Clocks — ...
/// all publicly-visible reads ... take that lock.").
pub struct TimingController {
    state: Mutex<TimingState>,
}

impl TimingController {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TimingState {
                mode: ClockMode::Shared(RealTimeClock::new()),
                reference: MediaType::Video,
                offsets: HashMap::new(),
                component_times: HashMap::new(),
            }),
        }
    }

    /// Re-derives clock mode and the reference component for a fresh open
    /// or change (spec §4.7, "Setup rules"). Previous position and speed
    /// ratio are copied onto the new clocks so a `change` does not reset
    /// playback position.
    pub fn setup(
        &self,
        is_time_sync_disabled: bool,
        is_stream_seekable: bool,
        has_audio: bool,
        has_video: bool,
        seekable_reference: MediaType,
        component_times: HashMap<MediaType, ComponentTimes>,
    ) {
        let mut state = self.state.lock();

        let reference = if !is_stream_seekable && has_audio {
            MediaType::Audio
        } else {
            seekable_reference
        };

        let start_times_differ = has_audio
            && has_video
            && component_times
                .get(&MediaType::Audio)
                .zip(component_times.get(&MediaType::Video))
                .is_some_and(|(a, v)| {
                    let diff = if a.start_time >= v.start_time {
                        a.start_time - v.start_time
                    } else {
                        v.start_time - a.start_time
                    };
                    diff > TIMEBASE_THRESHOLD
                });

        let disconnected = is_time_sync_disabled && start_times_differ;

        let (prev_position, prev_speed) = {
            let reference_clock = state.mode.clock(reference);
            (reference_clock.position(), reference_clock.speed_ratio())
        };

        let mut new_mode = if disconnected {
            let mut audio = RealTimeClock::new();
            let mut video = RealTimeClock::new();
            audio.update(prev_position);
            audio.set_speed_ratio(prev_speed);
            video.update(prev_position);
            video.set_speed_ratio(prev_speed);
            ClockMode::Disconnected { audio, video }
        } else {
            let mut shared = RealTimeClock::new();
            shared.update(prev_position);
            shared.set_speed_ratio(prev_speed);
            ClockMode::Shared(shared)
        };
        std::mem::swap(&mut state.mode, &mut new_mode);

        state.reference = reference;
        state.component_times = component_times;
    }

    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.state.lock().mode.is_disconnected()
    }

    #[must_use]
    pub fn reference(&self) -> MediaType {
        self.state.lock().reference
    }

    fn resolve(&self, t: MediaType) -> MediaType {
        if t == MediaType::None {
            self.state.lock().reference
        } else {
            t
        }
    }

    /// `position(t) = clock[t].position + offset[disconnected ? t : reference]`
    /// (spec §4.7, "Observable values").
    #[must_use]
    pub fn position(&self, t: MediaType) -> Duration {
        let resolved = self.resolve(t);
        let state = self.state.lock();
        let offset_key = if state.mode.is_disconnected() {
            resolved
        } else {
            state.reference
        };
        let offset = state.offsets.get(&offset_key).copied().unwrap_or_default();
        state.mode.clock(resolved).position() + offset
    }

    #[must_use]
    pub fn is_running(&self, t: MediaType) -> bool {
        let resolved = self.resolve(t);
        self.state.lock().mode.clock(resolved).is_running()
    }

    #[must_use]
    pub fn duration(&self, t: MediaType) -> Duration {
        let resolved = self.resolve(t);
        self.state
            .lock()
            .component_times
            .get(&resolved)
            .map(ComponentTimes::duration)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn start_time(&self, t: MediaType) -> Duration {
        let resolved = self.resolve(t);
        self.state
            .lock()
            .component_times
            .get(&resolved)
            .map(|c| c.start_time)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn end_time(&self, t: MediaType) -> Duration {
        let resolved = self.resolve(t);
        self.state
            .lock()
            .component_times
            .get(&resolved)
            .map(|c| c.end_time)
            .unwrap_or_default()
    }

    /// `t = None` applies to every clock currently in play (spec §4.7,
    /// "Operations").
    pub fn update(&self, position: Duration, t: MediaType) {
        let mut state = self.state.lock();
        if t == MediaType::None {
            match &mut state.mode {
                ClockMode::Shared(c) => c.update(position),
                ClockMode::Disconnected { audio, video } => {
                    audio.update(position);
                    video.update(position);
                }
            }
        } else {
            state.mode.clock_mut(t).update(position);
        }
    }

    pub fn play(&self, t: MediaType) {
        let mut state = self.state.lock();
        if t == MediaType::None {
            match &mut state.mode {
                ClockMode::Shared(c) => c.play(),
                ClockMode::Disconnected { audio, video } => {
                    audio.play();
                    video.play();
                }
            }
        } else {
            state.mode.clock_mut(t).play();
        }
    }

    pub fn pause(&self, t: MediaType) {
        let mut state = self.state.lock();
        if t == MediaType::None {
            match &mut state.mode {
                ClockMode::Shared(c) => c.pause(),
                ClockMode::Disconnected { audio, video } => {
                    audio.pause();
                    video.pause();
                }
            }
        } else {
            state.mode.clock_mut(t).pause();
        }
    }

    pub fn reset(&self, t: MediaType) {
        let mut state = self.state.lock();
        if t == MediaType::None {
            match &mut state.mode {
                ClockMode::Shared(c) => c.reset(),
                ClockMode::Disconnected { audio, video } => {
                    audio.reset();
                    video.reset();
                }
            }
        } else {
            state.mode.clock_mut(t).reset();
        }
        state.offsets.clear();
    }

    /// The single writable speed ratio, applied to audio and video (spec
    /// §4.7, "Operations").
    pub fn set_speed_ratio(&self, speed_ratio: f64) {
        let mut state = self.state.lock();
        match &mut state.mode {
            ClockMode::Shared(c) => c.set_speed_ratio(speed_ratio),
            ClockMode::Disconnected { audio, video } => {
                audio.set_speed_ratio(speed_ratio);
                video.set_speed_ratio(speed_ratio);
            }
        }
    }

    #[must_use]
    pub fn speed_ratio(&self) -> f64 {
        let state = self.state.lock();
        state.mode.clock(state.reference).speed_ratio()
    }

    pub fn set_offset(&self, t: MediaType, offset: Duration) {
        self.state.lock().offsets.insert(t, offset);
    }
}

impl Default for TimingController {
    fn default() -> Self {
        Self::new()
    }
}
