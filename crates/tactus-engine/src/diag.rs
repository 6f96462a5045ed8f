//! Realtime-safe diagnostics records.
//!
//! The audio thread must never format strings or touch a logger, so it
//! pushes plain records into a bounded ring instead. The control side
//! drains the ring and turns each record into a log line.

use core::fmt;

use tactus_core::{PositionFrames, TrackIndex};

/// Capacity of the diagnostics ring.
pub(crate) const DIAG_CAPACITY: usize = 256;

/// One diagnostic record from the audio thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagEvent {
    /// An event was more than the stale threshold behind the playhead and
    /// was discarded.
    StaleEventDropped {
        track: TrackIndex,
        frame: PositionFrames,
        position: PositionFrames,
    },
    /// An instrument returned an error; its block was replaced by silence.
    RenderFailed { track: TrackIndex },
    /// More gain changes landed in one block than the mixer tracks
    /// per-block; later changes applied from their offset onward may have
    /// been coalesced.
    GainChangesSaturated { track: TrackIndex },
}

impl fmt::Display for DiagEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagEvent::StaleEventDropped { track, frame, position } => write!(
                f,
                "track {}: dropped stale event at frame {} (position {})",
                track, frame, position
            ),
            DiagEvent::RenderFailed { track } => {
                write!(f, "track {}: instrument render failed, block silenced", track)
            }
            DiagEvent::GainChangesSaturated { track } => {
                write!(f, "track {}: too many volume changes in one block", track)
            }
        }
    }
}
