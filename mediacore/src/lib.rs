#![warn(clippy::all, clippy::correctness)]
#![warn(rust_2018_idioms)]

//! Media-type-agnostic data model for the playback control core: block
//! types, the bounded per-type block buffer, the real-time clock, the
//! recognized configuration surface, the closed error set and URI
//! normalization. Nothing in this crate touches a thread or a socket; the
//! `playback` crate wires it up against real workers and collaborators.

pub mod block;
pub mod block_buffer;
pub mod clock;
pub mod config;
pub mod error;
pub mod media_type;
pub mod uri;

pub use block::{MediaBlock, Payload};
pub use block_buffer::MediaBlockBuffer;
pub use clock::RealTimeClock;
pub use config::ContainerConfiguration;
pub use error::EngineError;
pub use media_type::MediaType;
