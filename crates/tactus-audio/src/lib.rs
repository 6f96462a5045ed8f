//! Audio output backends and the fixed-rate driver for tactus.
//!
//! The engine renders 128-frame blocks through the mixer on a dedicated
//! render thread, converts to PCM16, and feeds a short frame queue that
//! the device callback drains. When no device can be opened, a timer-paced
//! null backend keeps the transport advancing for headless use.

mod cpal_backend;
mod engine;
mod null_output;
mod pcm;
mod traits;

pub use cpal_backend::CpalOutput;
pub use engine::{Engine, EngineConfig};
pub use null_output::NullOutput;
pub use pcm::{block_to_pcm, PcmFrame};
pub use traits::{AudioError, AudioOutput};
