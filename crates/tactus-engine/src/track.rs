//! Per-track state shared between the control and audio sides.

use core::sync::atomic::{AtomicU32, Ordering};

use tactus_core::EVENT_BUFFER_CAPACITY;

use crate::event_buffer::EventBuffer;

/// The shared half of one track: its event queue and current gain.
///
/// The control side holds this in its registry and uses the producer
/// operations of the buffer; the audio side consumes the buffer and writes
/// the gain when a volume event fires. Gain is stored as f32 bits in an
/// atomic so both sides can read it without locking.
pub struct TrackHandle {
    buffer: EventBuffer,
    gain: AtomicU32,
}

impl TrackHandle {
    pub fn new() -> Self {
        Self {
            buffer: EventBuffer::new(EVENT_BUFFER_CAPACITY),
            gain: AtomicU32::new(1.0f32.to_bits()),
        }
    }

    pub fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }

    /// Current linear gain. Starts at 1.0.
    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain.load(Ordering::Relaxed))
    }

    pub(crate) fn set_gain(&self, gain: f32) {
        self.gain.store(gain.to_bits(), Ordering::Relaxed);
    }
}

impl Default for TrackHandle {
    fn default() -> Self {
        Self::new()
    }
}
