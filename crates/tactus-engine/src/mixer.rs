//! Summing mixer and its control-side handle.
//!
//! `Mixer::new` returns a split pair: the `Mixer` moves to the audio side
//! and renders; the `MixerHandle` stays with the control side and owns
//! track allocation, event scheduling, and transport control. Structural
//! changes (add/remove/reset, immediate dispatch) cross over a bounded
//! command ring drained at the start of every block; removed instruments
//! come back over a retire ring so their memory is never freed on the
//! audio thread.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use arrayvec::ArrayVec;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use tactus_core::{
    Event, EventPayload, PositionFrames, TrackIndex, INVALID_TRACK, MAX_BLOCK_FRAMES, MAX_TRACKS,
};

use crate::diag::{DiagEvent, DIAG_CAPACITY};
use crate::instrument::Instrument;
use crate::scheduler::{slot_index, FrameSink, Scheduler};
use crate::track::TrackHandle;
use crate::transport::Transport;

/// Command ring capacity. Generous enough for a full track roster to be
/// rebuilt between two blocks.
const COMMAND_CAPACITY: usize = MAX_TRACKS * 2;

/// Most gain changes one track can apply sample-accurately in one block.
const MAX_GAIN_CHANGES: usize = 32;

/// Immediate-dispatch events carried per command.
const NOW_BATCH: usize = 16;

enum Command {
    AddTrack {
        index: TrackIndex,
        instrument: Box<dyn Instrument>,
        handle: Arc<TrackHandle>,
    },
    RemoveTrack {
        index: TrackIndex,
    },
    ResetTrack {
        index: TrackIndex,
    },
    DispatchNow {
        index: TrackIndex,
        events: ArrayVec<Event, NOW_BATCH>,
    },
}

struct MixerTrack {
    instrument: Box<dyn Instrument>,
    handle: Arc<TrackHandle>,
}

/// A gain change observed while slicing a block, applied segment-wise in
/// the mix so it takes effect at its exact offset.
#[derive(Clone, Copy)]
struct GainChange {
    offset: u32,
    gain: f32,
}

/// Audio-side half: owns the instruments and the scratch buffer, drives
/// the scheduler, sums tracks into the output.
pub struct Mixer {
    scheduler: Scheduler,
    slots: Vec<Option<MixerTrack>>,
    scratch: Vec<f32>,
    channels: usize,
    commands: HeapCons<Command>,
    retired: HeapProd<Box<dyn Instrument>>,
    diag: HeapProd<DiagEvent>,
}

/// Control-side half: allocates track slots, schedules events, and drives
/// the transport. Single control thread at a time; producer operations
/// require `&mut self`.
pub struct MixerHandle {
    registry: Vec<Option<Arc<TrackHandle>>>,
    commands: HeapProd<Command>,
    retired: HeapCons<Box<dyn Instrument>>,
    diag: HeapCons<DiagEvent>,
    transport: Arc<Transport>,
}

impl Mixer {
    /// Create the audio/control pair for an interleaved output with
    /// `channels` channels (1 or 2).
    pub fn new(channels: usize) -> (Mixer, MixerHandle) {
        assert!(channels == 1 || channels == 2, "output is mono or stereo");

        let transport = Arc::new(Transport::new());
        let (cmd_prod, cmd_cons) = HeapRb::<Command>::new(COMMAND_CAPACITY).split();
        let (retire_prod, retire_cons) = HeapRb::<Box<dyn Instrument>>::new(MAX_TRACKS).split();
        let (diag_prod, diag_cons) = HeapRb::<DiagEvent>::new(DIAG_CAPACITY).split();

        let mixer = Mixer {
            scheduler: Scheduler::new(transport.clone()),
            slots: (0..MAX_TRACKS).map(|_| None).collect(),
            scratch: vec![0.0; MAX_BLOCK_FRAMES as usize * channels],
            channels,
            commands: cmd_cons,
            retired: retire_prod,
            diag: diag_prod,
        };
        let handle = MixerHandle {
            registry: (0..MAX_TRACKS).map(|_| None).collect(),
            commands: cmd_prod,
            retired: retire_cons,
            diag: diag_cons,
            transport,
        };
        (mixer, handle)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn transport(&self) -> &Arc<Transport> {
        self.scheduler.transport()
    }

    /// Render one block of `frames` frames into `out`.
    ///
    /// `out` must hold exactly `frames * channels` samples; every one of
    /// them is written. Runs on the audio thread: bounded work, no
    /// allocation, no locks.
    pub fn render(&mut self, out: &mut [f32], frames: u32) {
        assert!(frames <= MAX_BLOCK_FRAMES, "block exceeds scratch size");
        assert_eq!(out.len(), frames as usize * self.channels);

        self.process_commands();

        out.fill(0.0);

        if self.slots.iter().all(Option::is_none) {
            self.scheduler.advance_empty(frames);
            return;
        }

        let channels = self.channels;
        let block_start = self.scheduler.transport().position();
        let samples = frames as usize * channels;
        let Self { scheduler, slots, scratch, diag, .. } = self;

        for (index, slot) in slots.iter_mut().enumerate() {
            let Some(track) = slot.as_mut() else { continue };
            let index = index as TrackIndex;

            let start_gain = track.handle.gain();
            let mut gain_changes: ArrayVec<GainChange, MAX_GAIN_CHANGES> = ArrayVec::new();
            {
                let mut sink = TrackSink {
                    instrument: track.instrument.as_mut(),
                    handle: track.handle.as_ref(),
                    scratch: &mut scratch[..samples],
                    channels,
                    gain_changes: &mut gain_changes,
                    diag: &mut *diag,
                    index,
                    block_start,
                };
                scheduler.handle_frames(index, frames, &mut sink);
            }

            mix_track(out, &scratch[..samples], channels, start_gain, &gain_changes);
        }
    }

    fn process_commands(&mut self) {
        while let Some(command) = self.commands.try_pop() {
            match command {
                Command::AddTrack { index, instrument, handle } => {
                    let Some(i) = slot_index(index) else { continue };
                    let old = self.slots[i].replace(MixerTrack {
                        instrument,
                        handle: handle.clone(),
                    });
                    self.scheduler.attach_track(index, handle);
                    if let Some(old) = old {
                        self.retire(old.instrument);
                    }
                }
                Command::RemoveTrack { index } => {
                    let Some(i) = slot_index(index) else { continue };
                    let old = self.slots[i].take();
                    self.scheduler.detach_track(index);
                    if let Some(old) = old {
                        self.retire(old.instrument);
                    }
                }
                Command::ResetTrack { index } => {
                    if let Some(track) = slot_index(index).and_then(|i| self.slots[i].as_mut()) {
                        track.instrument.reset();
                    }
                }
                Command::DispatchNow { index, events } => {
                    if let Some(track) = slot_index(index).and_then(|i| self.slots[i].as_mut()) {
                        for event in &events {
                            match event.payload {
                                EventPayload::Midi(msg) => {
                                    track.instrument.handle_midi(msg.status, msg.data1, msg.data2)
                                }
                                EventPayload::Volume(gain) => track.handle.set_gain(gain),
                            }
                        }
                    }
                }
            }
        }
    }

    fn retire(&mut self, instrument: Box<dyn Instrument>) {
        // Dropping here is the fallback when the control side stops
        // reclaiming; the ring is sized for a full roster.
        let _ = self.retired.try_push(instrument);
    }
}

struct TrackSink<'a> {
    instrument: &'a mut dyn Instrument,
    handle: &'a TrackHandle,
    scratch: &'a mut [f32],
    channels: usize,
    gain_changes: &'a mut ArrayVec<GainChange, MAX_GAIN_CHANGES>,
    diag: &'a mut HeapProd<DiagEvent>,
    index: TrackIndex,
    block_start: PositionFrames,
}

impl FrameSink for TrackSink<'_> {
    fn render_range(&mut self, offset: u32, frames: u32) {
        if frames == 0 {
            return;
        }
        let from = offset as usize * self.channels;
        let to = from + frames as usize * self.channels;
        let out = &mut self.scratch[from..to];
        if self.instrument.render(out).is_err() {
            out.fill(0.0);
            let _ = self.diag.try_push(DiagEvent::RenderFailed { track: self.index });
        }
    }

    fn handle_event(&mut self, event: &Event, offset: u32) {
        match event.payload {
            EventPayload::Midi(msg) => {
                self.instrument.handle_midi(msg.status, msg.data1, msg.data2);
            }
            EventPayload::Volume(gain) => {
                self.handle.set_gain(gain);
                if self
                    .gain_changes
                    .try_push(GainChange { offset, gain })
                    .is_err()
                {
                    let _ = self
                        .diag
                        .try_push(DiagEvent::GainChangesSaturated { track: self.index });
                }
            }
        }
    }

    fn discard_event(&mut self, event: &Event) {
        let _ = self.diag.try_push(DiagEvent::StaleEventDropped {
            track: self.index,
            frame: event.frame,
            position: self.block_start,
        });
    }
}

/// Sum one track's scratch into the output, switching gain at each
/// recorded change offset. Unity gain adds directly; gains above 1.0 are
/// limited to 1.0; segments at or below zero contribute nothing.
fn mix_track(
    out: &mut [f32],
    scratch: &[f32],
    channels: usize,
    start_gain: f32,
    changes: &[GainChange],
) {
    let frames = (scratch.len() / channels) as u32;
    let mut gain = start_gain;
    let mut cursor = 0u32;

    for change in changes {
        mix_segment(out, scratch, channels, cursor, change.offset, gain);
        gain = change.gain;
        cursor = change.offset;
    }
    mix_segment(out, scratch, channels, cursor, frames, gain);
}

fn mix_segment(out: &mut [f32], scratch: &[f32], channels: usize, from: u32, to: u32, gain: f32) {
    if to <= from || gain <= 0.0 {
        return;
    }
    let range = from as usize * channels..to as usize * channels;
    let gain = gain.min(1.0);
    if gain == 1.0 {
        for (o, s) in out[range.clone()].iter_mut().zip(&scratch[range]) {
            *o += *s;
        }
    } else {
        for (o, s) in out[range.clone()].iter_mut().zip(&scratch[range]) {
            *o += *s * gain;
        }
    }
}

impl MixerHandle {
    /// Allocate the lowest free track slot for `instrument`.
    ///
    /// The caller configures the instrument's output format first. Returns
    /// `INVALID_TRACK` when all slots are taken. The instrument starts
    /// rendering from the next block.
    pub fn add_track(&mut self, instrument: Box<dyn Instrument>) -> TrackIndex {
        let Some(index) = self.registry.iter().position(Option::is_none) else {
            return INVALID_TRACK;
        };
        let handle = Arc::new(TrackHandle::new());
        self.registry[index] = Some(handle.clone());
        self.push_command(Command::AddTrack {
            index: index as TrackIndex,
            instrument,
            handle,
        });
        index as TrackIndex
    }

    /// Detach a track. Its slot is immediately reusable; the instrument
    /// comes back through [`reclaim_instruments`](Self::reclaim_instruments).
    pub fn remove_track(&mut self, index: TrackIndex) {
        let Some(i) = slot_index(index) else { return };
        if self.registry[i].take().is_some() {
            self.push_command(Command::RemoveTrack { index });
        }
    }

    /// Clear a track's queued events and reset its instrument. No MIDI is
    /// synthesized; the instrument silences its own voices.
    pub fn reset_track(&mut self, index: TrackIndex) {
        let Some(handle) = self.track(index) else { return };
        handle.buffer().clear();
        self.push_command(Command::ResetTrack { index });
    }

    /// Append frame-ordered events to a track's queue. Returns how many
    /// were accepted (short on ordering violations or a full buffer).
    pub fn schedule_events(&mut self, index: TrackIndex, events: &[Event]) -> u32 {
        match self.track(index) {
            Some(handle) => handle.buffer().append(events),
            None => 0,
        }
    }

    /// Dispatch events at the start of the next block, bypassing the
    /// queue.
    pub fn handle_events_now(&mut self, index: TrackIndex, events: &[Event]) {
        if self.track(index).is_none() {
            return;
        }
        for chunk in events.chunks(NOW_BATCH) {
            let batch: ArrayVec<Event, NOW_BATCH> = chunk.iter().copied().collect();
            self.push_command(Command::DispatchNow { index, events: batch });
        }
    }

    /// Remove queued events with `frame >= from_frame` from a track.
    pub fn clear_events(&mut self, index: TrackIndex, from_frame: PositionFrames) {
        if let Some(handle) = self.track(index) {
            handle.buffer().clear_after(from_frame);
        }
    }

    /// Remaining event capacity of a track's queue; 0 for unknown tracks.
    pub fn buffer_available(&self, index: TrackIndex) -> u32 {
        self.track(index)
            .map(|handle| handle.buffer().available())
            .unwrap_or(0)
    }

    /// A track's current gain; 1.0 for unknown tracks.
    pub fn track_volume(&self, index: TrackIndex) -> f32 {
        self.track(index).map(|handle| handle.gain()).unwrap_or(1.0)
    }

    /// Set a track's gain outside the event stream. Takes effect from the
    /// next block; use a volume event for a frame-accurate change.
    pub fn set_track_volume(&mut self, index: TrackIndex, gain: f32) {
        if let Some(handle) = self.track(index) {
            handle.set_gain(gain);
        }
    }

    pub fn has_track(&self, index: TrackIndex) -> bool {
        self.track(index).is_some()
    }

    pub fn play(&self) {
        self.transport.play();
    }

    pub fn pause(&self) {
        self.transport.pause();
    }

    pub fn position(&self) -> PositionFrames {
        self.transport.position()
    }

    pub fn last_render_time_us(&self) -> u64 {
        self.transport.last_render_time_us()
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Drop instruments retired by the audio side. Returns how many were
    /// reclaimed. Call this periodically from the control thread.
    pub fn reclaim_instruments(&mut self) -> usize {
        let mut reclaimed = 0;
        while self.retired.try_pop().is_some() {
            reclaimed += 1;
        }
        reclaimed
    }

    /// Take pending diagnostics records from the audio side so the caller
    /// can log them.
    pub fn drain_diagnostics(&mut self) -> Vec<DiagEvent> {
        let mut records = Vec::new();
        while let Some(record) = self.diag.try_pop() {
            records.push(record);
        }
        records
    }

    fn track(&self, index: TrackIndex) -> Option<&Arc<TrackHandle>> {
        slot_index(index).and_then(|i| self.registry[i].as_ref())
    }

    fn push_command(&mut self, command: Command) {
        let mut command = command;
        // The audio side drains every block; spin rather than lose a
        // structural change.
        while let Err(returned) = self.commands.try_push(command) {
            command = returned;
            core::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::{RenderError, SilenceInstrument};
    use core::sync::atomic::{AtomicUsize, Ordering};
    use tactus_core::BLOCK_FRAMES;

    /// Renders a constant level; NoteOn sets it from velocity, NoteOff and
    /// reset silence it. Counts every MIDI message and reset it receives.
    struct LevelInstrument {
        level: f32,
        midi_seen: Arc<AtomicUsize>,
        resets: Arc<AtomicUsize>,
    }

    impl LevelInstrument {
        fn new(midi_seen: Arc<AtomicUsize>, resets: Arc<AtomicUsize>) -> Self {
            Self { level: 0.0, midi_seen, resets }
        }
    }

    impl Instrument for LevelInstrument {
        fn set_output_format(&mut self, _sample_rate: u32, _stereo: bool) -> bool {
            true
        }

        fn render(&mut self, out: &mut [f32]) -> Result<(), RenderError> {
            out.fill(self.level);
            Ok(())
        }

        fn handle_midi(&mut self, status: u8, _data1: u8, data2: u8) {
            self.midi_seen.fetch_add(1, Ordering::Relaxed);
            match status & 0xF0 {
                0x90 => self.level = data2 as f32 / 127.0,
                0x80 => self.level = 0.0,
                _ => {}
            }
        }

        fn reset(&mut self) {
            self.resets.fetch_add(1, Ordering::Relaxed);
            self.level = 0.0;
        }
    }

    struct FailingInstrument;

    impl Instrument for FailingInstrument {
        fn set_output_format(&mut self, _sample_rate: u32, _stereo: bool) -> bool {
            true
        }
        fn render(&mut self, _out: &mut [f32]) -> Result<(), RenderError> {
            Err(RenderError)
        }
        fn handle_midi(&mut self, _status: u8, _data1: u8, _data2: u8) {}
        fn reset(&mut self) {}
    }

    fn counters() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        (Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0)))
    }

    fn level_track(handle: &mut MixerHandle) -> (TrackIndex, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let (midi, resets) = counters();
        let index = handle.add_track(Box::new(LevelInstrument::new(midi.clone(), resets.clone())));
        (index, midi, resets)
    }

    fn render_block(mixer: &mut Mixer) -> Vec<f32> {
        let mut out = vec![0.0f32; BLOCK_FRAMES as usize * mixer.channels()];
        mixer.render(&mut out, BLOCK_FRAMES);
        out
    }

    #[test]
    fn add_track_allocates_lowest_free_index() {
        let (_mixer, mut handle) = Mixer::new(2);
        assert_eq!(handle.add_track(Box::new(SilenceInstrument)), 0);
        assert_eq!(handle.add_track(Box::new(SilenceInstrument)), 1);
        handle.remove_track(0);
        assert_eq!(handle.add_track(Box::new(SilenceInstrument)), 0);
    }

    #[test]
    fn add_track_fails_when_slots_exhausted() {
        let (mut mixer, mut handle) = Mixer::new(2);
        for _ in 0..MAX_TRACKS {
            assert_ne!(handle.add_track(Box::new(SilenceInstrument)), INVALID_TRACK);
        }
        assert_eq!(handle.add_track(Box::new(SilenceInstrument)), INVALID_TRACK);
        render_block(&mut mixer); // drain the command ring
    }

    #[test]
    fn track_volume_defaults_to_unity_for_unknown_tracks() {
        let (_mixer, handle) = Mixer::new(2);
        assert_eq!(handle.track_volume(7), 1.0);
        assert_eq!(handle.buffer_available(7), 0);
    }

    #[test]
    fn set_track_volume_scales_the_next_block() {
        let (mut mixer, mut handle) = Mixer::new(2);
        let (index, _, _) = level_track(&mut handle);
        handle.schedule_events(index, &[Event::midi(0, 0x90, 60, 127)]);
        handle.set_track_volume(index, 0.25);
        handle.play();

        let out = render_block(&mut mixer);

        assert!(out.iter().all(|&s| s == 0.25));
        assert_eq!(handle.track_volume(index), 0.25);
    }

    #[test]
    fn note_takes_effect_at_its_frame_offset() {
        let (mut mixer, mut handle) = Mixer::new(2);
        let (index, midi, _) = level_track(&mut handle);
        handle.schedule_events(index, &[Event::midi(64, 0x90, 60, 127)]);
        handle.play();

        let out = render_block(&mut mixer);

        assert!(out[..64 * 2].iter().all(|&s| s == 0.0));
        assert!(out[64 * 2..].iter().all(|&s| s == 1.0));
        assert_eq!(midi.load(Ordering::Relaxed), 1);
        assert_eq!(handle.position(), 128);
    }

    #[test]
    fn volume_change_applies_mid_block() {
        let (mut mixer, mut handle) = Mixer::new(2);
        let (index, _, _) = level_track(&mut handle);
        handle.schedule_events(
            index,
            &[Event::midi(0, 0x90, 60, 127), Event::volume(64, 0.5)],
        );
        handle.play();

        let out = render_block(&mut mixer);

        assert!(out[..64 * 2].iter().all(|&s| s == 1.0));
        assert!(out[64 * 2..].iter().all(|&s| s == 0.5));
        assert_eq!(handle.track_volume(index), 0.5);
    }

    #[test]
    fn gain_above_unity_is_limited_at_mix_time() {
        let (mut mixer, mut handle) = Mixer::new(2);
        let (index, _, _) = level_track(&mut handle);
        handle.schedule_events(
            index,
            &[Event::midi(0, 0x90, 60, 127), Event::volume(0, 4.0)],
        );
        handle.play();

        let out = render_block(&mut mixer);

        assert!(out.iter().all(|&s| s == 1.0));
        // The stored value is not clamped, only the mix is.
        assert_eq!(handle.track_volume(index), 4.0);
    }

    #[test]
    fn silent_track_consumes_events_but_adds_nothing() {
        let (mut mixer, mut handle) = Mixer::new(2);
        let (index, midi, _) = level_track(&mut handle);
        handle.schedule_events(
            index,
            &[Event::volume(0, 0.0), Event::midi(10, 0x90, 60, 127)],
        );
        handle.play();

        let out = render_block(&mut mixer);

        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(midi.load(Ordering::Relaxed), 1, "events still dispatch");
        assert!(handle.track(index).unwrap().buffer().is_empty());
    }

    #[test]
    fn failed_render_contributes_silence_and_reports() {
        let (mut mixer, mut handle) = Mixer::new(2);
        let index = handle.add_track(Box::new(FailingInstrument));
        handle.play();

        let out = render_block(&mut mixer);

        assert!(out.iter().all(|&s| s == 0.0));
        let records = handle.drain_diagnostics();
        assert!(records.contains(&DiagEvent::RenderFailed { track: index }));
    }

    #[test]
    fn reset_clears_queue_and_resets_instrument_without_midi() {
        let (mut mixer, mut handle) = Mixer::new(2);
        let (index, midi, resets) = level_track(&mut handle);
        handle.schedule_events(index, &[Event::midi(0, 0x90, 60, 127)]);

        handle.reset_track(index);
        handle.play();
        render_block(&mut mixer);

        assert_eq!(midi.load(Ordering::Relaxed), 0);
        assert_eq!(resets.load(Ordering::Relaxed), 1);
        assert_eq!(handle.buffer_available(index), handle.track(index).unwrap().buffer().capacity() as u32);
    }

    #[test]
    fn removed_instrument_is_reclaimed_off_the_audio_side() {
        let (mut mixer, mut handle) = Mixer::new(2);
        let index = handle.add_track(Box::new(SilenceInstrument));
        render_block(&mut mixer);

        handle.remove_track(index);
        render_block(&mut mixer);

        assert_eq!(handle.reclaim_instruments(), 1);
        assert!(!handle.has_track(index));
    }

    #[test]
    fn events_now_reach_the_instrument_at_the_next_block() {
        let (mut mixer, mut handle) = Mixer::new(2);
        let (index, midi, _) = level_track(&mut handle);
        handle.play();

        handle.handle_events_now(index, &[Event::midi(0, 0x90, 60, 127)]);
        let out = render_block(&mut mixer);

        assert_eq!(midi.load(Ordering::Relaxed), 1);
        // Applied at offset 0, so the whole block carries the note.
        assert!(out.iter().all(|&s| s == 1.0));
    }

    #[test]
    fn position_advances_even_with_no_tracks() {
        let (mut mixer, handle) = Mixer::new(2);
        handle.play();
        render_block(&mut mixer);
        assert_eq!(handle.position(), 128);
    }

    #[test]
    fn position_holds_while_paused() {
        let (mut mixer, mut handle) = Mixer::new(2);
        let (index, _, _) = level_track(&mut handle);
        handle.schedule_events(index, &[Event::midi(0, 0x90, 60, 127)]);

        render_block(&mut mixer); // not playing

        assert_eq!(handle.position(), 0);
        assert_eq!(handle.buffer_available(index), 1023, "event stays queued");
    }

    #[test]
    fn mono_output_mixes_one_sample_per_frame() {
        let (mut mixer, mut handle) = Mixer::new(1);
        let (index, _, _) = level_track(&mut handle);
        handle.schedule_events(index, &[Event::midi(0, 0x90, 60, 127)]);
        handle.play();

        let mut out = vec![0.0f32; BLOCK_FRAMES as usize];
        mixer.render(&mut out, BLOCK_FRAMES);
        assert!(out.iter().all(|&s| s == 1.0));
    }

    #[test]
    fn two_tracks_sum() {
        let (mut mixer, mut handle) = Mixer::new(2);
        let (a, _, _) = level_track(&mut handle);
        let (b, _, _) = level_track(&mut handle);
        handle.schedule_events(a, &[Event::midi(0, 0x90, 60, 127)]);
        handle.schedule_events(b, &[Event::midi(0, 0x90, 64, 127)]);
        handle.play();

        let out = render_block(&mut mixer);
        assert!(out.iter().all(|&s| s == 2.0), "mixer itself does not clamp");
    }
}
