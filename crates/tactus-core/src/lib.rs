//! Core types for the tactus sequencing engine.
//!
//! This crate defines the event model shared between the control side and
//! the audio side, plus the packed wire codec used by the C ABI. The
//! scheduling and mixing core consumes these types; it never parses bytes
//! itself.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod event;
mod wire;

pub use event::{Event, EventPayload, MidiMessage, PositionFrames, TrackIndex, INVALID_TRACK};
pub use wire::{decode_events, encode_events, WireError, EVENT_RECORD_SIZE};

/// Engine sample rate, fixed at construction.
pub const SAMPLE_RATE: u32 = 44_100;

/// Interleaved output channels (stereo).
pub const CHANNEL_COUNT: usize = 2;

/// Frames rendered per audio callback block.
pub const BLOCK_FRAMES: u32 = 128;

/// Upper bound on the block size; scratch buffers are sized to this.
pub const MAX_BLOCK_FRAMES: u32 = 256;

/// Documented limit on simultaneous tracks.
pub const MAX_TRACKS: usize = 64;

/// Events each track's buffer can hold.
pub const EVENT_BUFFER_CAPACITY: usize = 1024;

/// Events older than this many frames are dropped instead of clamped.
pub const STALE_EVENT_FRAMES: u32 = 1024;
