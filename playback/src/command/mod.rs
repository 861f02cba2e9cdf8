//! Command taxonomy (spec §4.1): direct, priority and deferred-seek
//! operations, each with distinct preemption semantics.

pub mod manager;

use std::time::Duration;

use mediacore::config::ContainerConfiguration;

use crate::engine::OpenSource;

/// A direct command: executes at most one at a time and preempts
/// everything else (spec §4.1).
pub(crate) enum DirectCommand {
    Open(OpenSource),
    Close,
    Change(ContainerConfiguration),
}

impl DirectCommand {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            DirectCommand::Open(_) => "open",
            DirectCommand::Close => "close",
            DirectCommand::Change(_) => "change",
        }
    }
}

/// A priority command: at most one pending at a time, executed before any
/// seek (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PriorityCommand {
    Play,
    Pause,
    Stop,
}

/// How a deferred seek computes and lands on its target (spec §4.6 step 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    Normal,
    Stop,
    StepForward,
    StepBackward,
}

/// A coalesced, deferred seek request (spec §4.1, "Deferred seek
/// commands"). Only one is ever in flight; a second request overwrites
/// the queued *next* seek rather than enqueuing.
#[derive(Debug, Clone, Copy)]
pub struct SeekOperation {
    pub target: Duration,
    pub mode: SeekMode,
}

impl SeekOperation {
    #[must_use]
    pub fn new(target: Duration, mode: SeekMode) -> Self {
        Self { target, mode }
    }
}
