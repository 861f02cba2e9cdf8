/*
 * MIT License
 *
 * termusic - Copyright (c) 2021 Larry Hao
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */

#![warn(clippy::all, clippy::correctness)]
#![warn(rust_2018_idioms)]

//! The playback control core: a command manager, a three-worker pipeline
//! (packet reading, frame decoding, block rendering), a seek engine and a
//! timing controller, coordinated against a demuxer/decoder and a set of
//! renderers supplied by the host application.

#[macro_use]
extern crate log;

pub mod buffers;
pub mod command;
pub mod connector;
pub mod container;
pub mod engine;
mod latch;
pub mod renderer;
pub mod seek;
pub mod state;
pub mod subtitle;
pub mod timing;
pub mod worker;

pub use command::manager::CommandManager;
pub use command::{SeekMode, SeekOperation};
pub use connector::Connector;
pub use container::{Components, Container, PacketQueueStats};
pub use engine::{ContainerFactory, MediaEngine, OpenSource, PlayerFacade, RendererFactory};
pub use mediacore::{
    block::{MediaBlock, Payload},
    block_buffer::MediaBlockBuffer,
    clock::RealTimeClock,
    config::ContainerConfiguration,
    error::EngineError,
    media_type::MediaType,
};
pub use renderer::Renderer;
pub use state::{MediaState, PlaybackState};
pub use subtitle::{PreloadedSubtitles, SubtitleLoader};

/// Installs the default env-filtered, prettified logger (mirrors the
/// daemon binary's `lovely_env_logger::init_default()` call). A host
/// embedding this crate is free to set up its own subscriber instead;
/// this is a convenience for the common case, not something the engine
/// calls on its own.
pub fn init_logging() {
    lovely_env_logger::init_default();
}
