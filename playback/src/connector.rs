//! Notifications emitted by the core toward the host application (spec
//! §6, "Connector interface"). Property-change notification plumbing and
//! the host application surface itself are explicitly out of scope (spec
//! §1); this trait only declares the call shape the core drives.

use mediacore::error::EngineError;

use crate::state::{MediaState, PlaybackState};

/// Optional observer of core lifecycle events. Every method defaults to a
/// no-op so a host only overrides what it cares about, mirroring the
/// teacher's event-forwarding style (`discord.rs`, `mpris.rs`) where a
/// sink only reacts to the subset of player events it needs.
#[allow(unused_variables)]
pub trait Connector: Send + Sync {
    /// Fires exactly once per process, the first time any engine's `open`
    /// reaches the command processor (spec §9, "Global state" — the
    /// `load_ffmpeg`-style one-time bring-up).
    fn on_media_initializing(&self) {}
    fn on_media_opening(&self) {}
    fn on_media_opened(&self) {}
    fn on_media_closing(&self) {}
    fn on_media_closed(&self) {}
    fn on_media_changing(&self) {}
    fn on_media_changed(&self) {}
    fn on_media_failed(&self, err: &EngineError) {}

    fn on_buffering_started(&self) {}
    fn on_buffering_ended(&self) {}

    fn on_seeking_started(&self) {}
    fn on_seeking_ended(&self) {}

    fn on_media_ended(&self) {}
    fn on_media_state_changed(&self, old: MediaState, new: MediaState) {}
    fn on_position_changed(&self, old: std::time::Duration, new: std::time::Duration) {}

    fn on_packet_read(&self, media_type: mediacore::media_type::MediaType) {}
    fn on_message_logged(&self, message: &str) {}
}

/// A [`Connector`] that ignores every notification. Used as the default
/// when the host does not supply one.
pub struct NullConnector;

impl Connector for NullConnector {}
