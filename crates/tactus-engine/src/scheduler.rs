//! Block slicing and event dispatch.
//!
//! `handle_frames` walks one track's event queue and cuts the render block
//! at every event boundary: render up to the event, deliver it at that
//! exact offset, continue. When every attached track has rendered the
//! block, the shared transport position advances.

use alloc::sync::Arc;
use alloc::vec::Vec;

use tactus_core::{Event, TrackIndex, MAX_TRACKS, STALE_EVENT_FRAMES};

use crate::track::TrackHandle;
use crate::transport::Transport;

/// Receives the render and dispatch calls for one track's block.
///
/// The mixer implements this over the track's instrument and scratch
/// buffer; a graph-pulling host could implement `render_range` as a no-op
/// and only take the event timings.
pub trait FrameSink {
    /// Render `frames` frames starting `offset` frames into the block.
    fn render_range(&mut self, offset: u32, frames: u32);

    /// Apply an event `offset` frames into the block.
    fn handle_event(&mut self, event: &Event, offset: u32);

    /// Called for events discarded as stale instead of dispatched.
    fn discard_event(&mut self, event: &Event) {
        let _ = event;
    }
}

struct TrackState {
    handle: Arc<TrackHandle>,
    has_rendered: bool,
}

/// Per-track schedules plus the shared transport.
///
/// Lives on the audio side; the control side talks to it only through the
/// per-track buffers and the transport atomics.
pub struct Scheduler {
    tracks: Vec<Option<TrackState>>,
    transport: Arc<Transport>,
}

impl Scheduler {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self {
            tracks: (0..MAX_TRACKS).map(|_| None).collect(),
            transport,
        }
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Install a track at the slot the control side allocated for it.
    pub fn attach_track(&mut self, index: TrackIndex, handle: Arc<TrackHandle>) {
        if let Some(slot) = slot_index(index).and_then(|i| self.tracks.get_mut(i)) {
            *slot = Some(TrackState { handle, has_rendered: false });
        }
    }

    /// Detach a track. Its queued events go with it.
    pub fn detach_track(&mut self, index: TrackIndex) {
        if let Some(slot) = slot_index(index).and_then(|i| self.tracks.get_mut(i)) {
            *slot = None;
        }
    }

    pub fn is_attached(&self, index: TrackIndex) -> bool {
        slot_index(index)
            .and_then(|i| self.tracks.get(i))
            .is_some_and(|slot| slot.is_some())
    }

    pub fn track_count(&self) -> usize {
        self.tracks.iter().filter(|slot| slot.is_some()).count()
    }

    /// Advance the transport for a block rendered with no tracks attached,
    /// so the position invariant holds even on an empty mixer.
    pub fn advance_empty(&mut self, frames: u32) {
        if self.transport.is_playing() && self.track_count() == 0 {
            let position = self.transport.position();
            self.transport.set_position(position.wrapping_add(frames));
        }
    }

    /// Drive one track through one block of `frames` frames.
    ///
    /// While paused the instrument still renders (so voice tails decay)
    /// but no events are delivered and the position does not move.
    pub fn handle_frames(&mut self, index: TrackIndex, frames: u32, sink: &mut dyn FrameSink) {
        let Some(track) = slot_index(index)
            .and_then(|i| self.tracks.get_mut(i))
            .and_then(|slot| slot.as_mut())
        else {
            return;
        };

        if !self.transport.is_playing() {
            sink.render_range(0, frames);
            return;
        }

        // Remember where we started so a position change made during this
        // block (a seek) is not overwritten by the end-of-block advance.
        let original_position = self.transport.position();
        let start = original_position;
        let mut last = start;
        let mut rendered: u32 = 0;

        while let Some(event) = track.handle.buffer().peek() {
            let mut event_frame = event.frame;

            if event_frame < start {
                if event_frame + STALE_EVENT_FRAMES < start {
                    track.handle.buffer().pop();
                    sink.discard_event(&event);
                    continue;
                }
                // Slightly late: snap to the start of this block.
                event_frame = start;
            }

            let gap = event_frame - last;
            if rendered + gap >= frames {
                break;
            }

            sink.render_range(rendered, gap);
            rendered += gap;
            last = event_frame;

            sink.handle_event(&event, rendered);
            track.handle.buffer().pop();
        }

        sink.render_range(rendered, frames - rendered);

        track.has_rendered = true;
        if self.all_tracks_rendered() {
            if self.transport.position() == original_position {
                self.transport.set_position(start.wrapping_add(frames));
            }
            for slot in self.tracks.iter_mut().flatten() {
                slot.has_rendered = false;
            }
        }
    }

    fn all_tracks_rendered(&self) -> bool {
        self.tracks
            .iter()
            .flatten()
            .all(|track| track.has_rendered)
    }
}

pub(crate) fn slot_index(index: TrackIndex) -> Option<usize> {
    usize::try_from(index).ok().filter(|&i| i < MAX_TRACKS)
}
