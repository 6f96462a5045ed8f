//! Shared transport state.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use tactus_core::PositionFrames;

/// Transport state shared between the control and audio threads.
///
/// The audio thread writes the position as blocks complete; the control
/// thread flips the playing flag. Plain atomic scalars with relaxed
/// ordering; there is no cross-field invariant to protect.
#[derive(Debug, Default)]
pub struct Transport {
    position: AtomicU32,
    playing: AtomicBool,
    last_render_us: AtomicU64,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames rendered since engine start.
    pub fn position(&self) -> PositionFrames {
        self.position.load(Ordering::Relaxed)
    }

    /// Move the playhead. Takes effect on the next block boundary.
    pub fn set_position(&self, frame: PositionFrames) {
        self.position.store(frame, Ordering::Relaxed);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    pub fn play(&self) {
        self.playing.store(true, Ordering::Relaxed);
    }

    pub fn pause(&self) {
        self.playing.store(false, Ordering::Relaxed);
    }

    /// Wall-clock timestamp of the most recent render, in microseconds.
    pub fn last_render_time_us(&self) -> u64 {
        self.last_render_us.load(Ordering::Relaxed)
    }

    pub fn set_last_render_time_us(&self, micros: u64) {
        self.last_render_us.store(micros, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_paused_at_zero() {
        let transport = Transport::new();
        assert!(!transport.is_playing());
        assert_eq!(transport.position(), 0);
    }

    #[test]
    fn play_pause_round_trip() {
        let transport = Transport::new();
        transport.play();
        assert!(transport.is_playing());
        transport.pause();
        assert!(!transport.is_playing());
    }
}
