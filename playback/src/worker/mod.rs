//! Owns the three worker threads and their lifecycle (spec §4.2, "Worker
//! Set"): packet reading, frame decoding and block rendering. Each worker
//! runs its cycle on a dedicated OS thread (spec §9: "internal workers
//! must not themselves be coroutines").

mod decoding;
mod reading;
mod rendering;

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::engine::EngineShared;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Running,
    PauseRequested,
    Paused,
    StopRequested,
    Stopped,
}

struct WorkerControl {
    state: Mutex<RunState>,
    cond: Condvar,
}

impl WorkerControl {
    fn new() -> Self {
        Self {
            state: Mutex::new(RunState::Running),
            cond: Condvar::new(),
        }
    }

    fn request_pause(&self) {
        let mut state = self.state.lock();
        if *state == RunState::Running {
            *state = RunState::PauseRequested;
        }
    }

    fn resume(&self) {
        let mut state = self.state.lock();
        if matches!(*state, RunState::PauseRequested | RunState::Paused) {
            *state = RunState::Running;
            self.cond.notify_all();
        }
    }

    fn request_stop(&self) {
        let mut state = self.state.lock();
        *state = RunState::StopRequested;
        self.cond.notify_all();
    }

    fn wait_until_paused(&self) {
        let mut state = self.state.lock();
        while *state == RunState::PauseRequested {
            self.cond.wait_for(&mut state, Duration::from_millis(50));
        }
    }

    fn wait_until_stopped(&self) {
        let mut state = self.state.lock();
        while *state != RunState::Stopped {
            self.cond.wait_for(&mut state, Duration::from_millis(50));
        }
    }

    fn is_paused(&self) -> bool {
        *self.state.lock() == RunState::Paused
    }

    /// Called by the worker thread itself at the top of every cycle.
    /// Returns `false` once the worker should exit its loop.
    fn tick(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            RunState::StopRequested => {
                *state = RunState::Stopped;
                self.cond.notify_all();
                false
            }
            RunState::Stopped => false,
            RunState::PauseRequested => {
                *state = RunState::Paused;
                self.cond.notify_all();
                true
            }
            RunState::Paused => {
                self.cond.wait_for(&mut state, Duration::from_millis(20));
                true
            }
            RunState::Running => true,
        }
    }

    fn should_run_body(&self) -> bool {
        *self.state.lock() == RunState::Running
    }
}

struct WorkerHandle {
    control: Arc<WorkerControl>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    fn pause(&self, wait: bool) {
        self.control.request_pause();
        if wait {
            self.control.wait_until_paused();
        }
    }

    fn resume(&self) {
        self.control.resume();
    }

    fn resume_if_paused(&self) {
        if self.control.is_paused() {
            self.control.resume();
        }
    }

    fn stop(&mut self, wait: bool) {
        self.control.request_stop();
        if wait {
            self.control.wait_until_stopped();
        }
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Owns the reading, decoding and rendering worker threads. Constructed
/// once per open/change (spec §3 Lifecycle) and disposed at close.
pub struct WorkerSet {
    reading: WorkerHandle,
    decoding: WorkerHandle,
    rendering: WorkerHandle,
}

impl WorkerSet {
    /// Spawns all three workers against `shared`, already running.
    pub(crate) fn start(shared: &Arc<EngineShared>) -> Self {
        let reading_control = Arc::new(WorkerControl::new());
        let decoding_control = Arc::new(WorkerControl::new());
        let rendering_control = Arc::new(WorkerControl::new());

        let reading_join = {
            let shared = Arc::clone(shared);
            let control = Arc::clone(&reading_control);
            std::thread::Builder::new()
                .name("packet-reading".into())
                .spawn(move || reading::run(&shared, &control))
                .expect("failed to spawn packet reading worker")
        };
        let decoding_join = {
            let shared = Arc::clone(shared);
            let control = Arc::clone(&decoding_control);
            std::thread::Builder::new()
                .name("frame-decoding".into())
                .spawn(move || decoding::run(&shared, &control))
                .expect("failed to spawn frame decoding worker")
        };
        let rendering_join = {
            let shared = Arc::clone(shared);
            let control = Arc::clone(&rendering_control);
            std::thread::Builder::new()
                .name("block-rendering".into())
                .spawn(move || rendering::run(&shared, &control))
                .expect("failed to spawn block rendering worker")
        };

        Self {
            reading: WorkerHandle {
                control: reading_control,
                join: Some(reading_join),
            },
            decoding: WorkerHandle {
                control: decoding_control,
                join: Some(decoding_join),
            },
            rendering: WorkerHandle {
                control: rendering_control,
                join: Some(rendering_join),
            },
        }
    }

    pub fn pause_all(&self, wait: bool) {
        self.reading.pause(wait);
        self.decoding.pause(wait);
        self.rendering.pause(wait);
    }

    pub fn resume_all(&self) {
        self.reading.resume();
        self.decoding.resume();
        self.rendering.resume();
    }

    /// Pauses only the reading and decoding workers so the renderer can
    /// keep presenting already-decoded blocks during a seek (spec §4.6
    /// step 3).
    pub fn pause_read_decode(&self, wait: bool) {
        self.reading.pause(wait);
        self.decoding.pause(wait);
    }

    /// Resumes only the workers that are currently paused, so an
    /// already-running worker is never interrupted (spec §4.2).
    pub fn resume_paused(&self) {
        self.reading.resume_if_paused();
        self.decoding.resume_if_paused();
        self.rendering.resume_if_paused();
    }

    pub fn dispose(&mut self) {
        self.reading.stop(true);
        self.decoding.stop(true);
        self.rendering.stop(true);
    }
}

impl Drop for WorkerSet {
    fn drop(&mut self) {
        self.dispose();
    }
}
