//! SFZ sample-playback instrument.
//!
//! A voice engine over the parsed region set: each NoteOn starts one voice
//! per matching region, voices read their sample with linear interpolation
//! at a pitch ratio derived from the key distance to the region's
//! keycenter, and NoteOff puts voices into a short linear release so notes
//! end without clicks. The voice pool is fixed size; when it is full the
//! oldest releasing (then oldest active) voice is stolen.

mod parser;

use std::path::{Path, PathBuf};

use tactus_core::SAMPLE_RATE;
use tactus_engine::{Instrument, RenderError};

use parser::{parse_sfz, LoopMode, SfzRegion};

/// Maximum simultaneous voices.
const MAX_VOICES: usize = 64;

/// Length of the note-off release ramp.
const RELEASE_SECONDS: f32 = 0.01;

/// Pitch bend range, in semitones either way.
const BEND_RANGE_SEMITONES: f64 = 2.0;

/// Error type for SFZ loading.
#[derive(Debug)]
pub enum SfzError {
    /// Could not read the .sfz file
    Io(std::io::Error),
    /// A referenced sample failed to load
    Sample { path: PathBuf, source: hound::Error },
    /// The file defines no playable regions
    NoRegions,
}

impl std::fmt::Display for SfzError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SfzError::Io(err) => write!(f, "SFZ read error: {}", err),
            SfzError::Sample { path, source } => {
                write!(f, "sample {} failed to load: {}", path.display(), source)
            }
            SfzError::NoRegions => write!(f, "SFZ file defines no playable regions"),
        }
    }
}

impl std::error::Error for SfzError {}

impl From<std::io::Error> for SfzError {
    fn from(err: std::io::Error) -> Self {
        SfzError::Io(err)
    }
}

/// Decoded sample data, interleaved.
#[derive(Debug)]
struct SampleData {
    frames: Vec<f32>,
    channels: usize,
    sample_rate: u32,
}

impl SampleData {
    fn frame_count(&self) -> usize {
        self.frames.len() / self.channels
    }

    /// Linear-interpolated read of one channel at a fractional frame.
    fn read(&self, channel: usize, position: f64) -> f32 {
        let index = position as usize;
        let frac = (position - index as f64) as f32;
        let channel = channel.min(self.channels - 1);
        let a = self.frames[index * self.channels + channel];
        let b = if index + 1 < self.frame_count() {
            self.frames[(index + 1) * self.channels + channel]
        } else {
            a
        };
        a + (b - a) * frac
    }
}

#[derive(Debug)]
struct LoadedRegion {
    spec: SfzRegion,
    data: SampleData,
    /// Linear gain from the region's volume opcode.
    gain: f32,
}

#[derive(Debug)]
struct Voice {
    region: usize,
    position: f64,
    /// Source frames per output frame at neutral pitch bend.
    step: f64,
    gain: f32,
    note: u8,
    released: bool,
    release_env: f32,
    serial: u64,
}

/// A sample-playback instrument over a subset of the SFZ format.
#[derive(Debug)]
pub struct SfzInstrument {
    regions: Vec<LoadedRegion>,
    voices: Vec<Option<Voice>>,
    sample_rate: u32,
    stereo: bool,
    bend_ratio: f64,
    release_step: f32,
    next_serial: u64,
}

impl SfzInstrument {
    /// Load an .sfz file; samples resolve relative to it (and its
    /// `default_path`, if set).
    pub fn from_file(path: &Path) -> Result<Self, SfzError> {
        let text = std::fs::read_to_string(path)?;
        let root = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_string(root, &text)
    }

    /// Build from in-memory SFZ text with an explicit sample root.
    pub fn from_string(sample_root: &Path, text: &str) -> Result<Self, SfzError> {
        let parsed = parse_sfz(text);
        let base = match &parsed.default_path {
            Some(default_path) => sample_root.join(default_path),
            None => sample_root.to_path_buf(),
        };

        let mut regions = Vec::with_capacity(parsed.regions.len());
        for spec in parsed.regions {
            let sample_path = base.join(&spec.sample);
            let data = load_wav(&sample_path)?;
            if data.frames.is_empty() {
                log::warn!("skipping empty sample {}", sample_path.display());
                continue;
            }
            let gain = 10f32.powf(spec.volume_db / 20.0);
            regions.push(LoadedRegion { spec, data, gain });
        }
        if regions.is_empty() {
            return Err(SfzError::NoRegions);
        }

        let sample_rate = SAMPLE_RATE;
        Ok(Self {
            regions,
            voices: (0..MAX_VOICES).map(|_| None).collect(),
            sample_rate,
            stereo: true,
            bend_ratio: 1.0,
            release_step: 1.0 / (RELEASE_SECONDS * sample_rate as f32),
            next_serial: 0,
        })
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    fn note_on(&mut self, note: u8, velocity: u8) {
        for region_index in 0..self.regions.len() {
            let region = &self.regions[region_index];
            let spec = &region.spec;
            if note < spec.lokey || note > spec.hikey {
                continue;
            }
            if velocity < spec.lovel || velocity > spec.hivel {
                continue;
            }

            let semitones = f64::from(i32::from(note) - i32::from(spec.pitch_keycenter))
                + f64::from(spec.transpose)
                + f64::from(spec.tune_cents) / 100.0;
            let ratio = 2f64.powf(semitones / 12.0);
            let step = ratio * f64::from(region.data.sample_rate) / f64::from(self.sample_rate);
            let gain = region.gain * f32::from(velocity) / 127.0;

            let serial = self.next_serial;
            self.next_serial += 1;
            let voice = Voice {
                region: region_index,
                position: 0.0,
                step,
                gain,
                note,
                released: false,
                release_env: 1.0,
                serial,
            };
            *self.allocate_voice() = Some(voice);
        }
    }

    /// Pick a slot for a new voice: a free one, else steal the oldest
    /// releasing voice, else the oldest voice outright.
    fn allocate_voice(&mut self) -> &mut Option<Voice> {
        let slot = match self.voices.iter().position(Option::is_none) {
            Some(free) => free,
            None => self
                .voices
                .iter()
                .enumerate()
                .filter_map(|(i, slot)| slot.as_ref().map(|v| (i, (!v.released, v.serial))))
                .min_by_key(|&(_, key)| key)
                .map(|(i, _)| i)
                .unwrap_or(0),
        };
        &mut self.voices[slot]
    }

    fn note_off(&mut self, note: u8) {
        for voice in self.voices.iter_mut().flatten() {
            if voice.note != note || voice.released {
                continue;
            }
            // One-shot regions always play out.
            if self.regions[voice.region].spec.loop_mode == LoopMode::OneShot {
                continue;
            }
            voice.released = true;
        }
    }

    fn release_all(&mut self) {
        for voice in self.voices.iter_mut().flatten() {
            voice.released = true;
        }
    }

    fn kill_all(&mut self) {
        for slot in &mut self.voices {
            *slot = None;
        }
    }
}

impl Instrument for SfzInstrument {
    fn set_output_format(&mut self, sample_rate: u32, stereo: bool) -> bool {
        if sample_rate != self.sample_rate {
            // Voice steps bake in the rate; drop them rather than detune.
            self.kill_all();
            self.sample_rate = sample_rate;
            self.release_step = 1.0 / (RELEASE_SECONDS * sample_rate as f32);
        }
        self.stereo = stereo;
        true
    }

    fn render(&mut self, out: &mut [f32]) -> Result<(), RenderError> {
        out.fill(0.0);
        let channels = if self.stereo { 2 } else { 1 };
        let frames = out.len() / channels;

        for slot in &mut self.voices {
            let Some(voice) = slot.as_mut() else { continue };
            let region = &self.regions[voice.region];
            let data = &region.data;
            let spec = &region.spec;
            let step = voice.step * self.bend_ratio;
            let last_readable = (data.frame_count().saturating_sub(1)) as f64;
            let mut ended = false;

            for frame in 0..frames {
                let envelope = if voice.released {
                    voice.release_env -= self.release_step;
                    if voice.release_env <= 0.0 {
                        ended = true;
                        break;
                    }
                    voice.release_env
                } else {
                    1.0
                };
                let amp = voice.gain * envelope;

                let left = data.read(0, voice.position) * amp;
                if channels == 2 {
                    let right = data.read(1, voice.position) * amp;
                    out[frame * 2] += left;
                    out[frame * 2 + 1] += right;
                } else if data.channels > 1 {
                    let right = data.read(1, voice.position) * amp;
                    out[frame] += (left + right) * 0.5;
                } else {
                    out[frame] += left;
                }

                voice.position += step;

                let looping = spec.loop_mode == LoopMode::Continuous && !voice.released;
                if looping {
                    let end = f64::from(spec.loop_end.unwrap_or(data.frame_count() as u32 - 1));
                    let start = f64::from(spec.loop_start.unwrap_or(0));
                    if voice.position >= end && end > start {
                        voice.position -= end - start;
                    }
                }
                if voice.position >= last_readable {
                    ended = true;
                    break;
                }
            }

            if ended {
                *slot = None;
            }
        }
        Ok(())
    }

    fn handle_midi(&mut self, status: u8, data1: u8, data2: u8) {
        match status & 0xF0 {
            0x90 => {
                if data2 == 0 {
                    self.note_off(data1);
                } else {
                    self.note_on(data1, data2);
                }
            }
            0x80 => self.note_off(data1),
            0xB0 => match data1 {
                120 => self.kill_all(),     // all sound off
                123 => self.release_all(),  // all notes off
                _ => {}
            },
            0xE0 => {
                let value = (u16::from(data2) << 7) | u16::from(data1);
                let semitones = (f64::from(value) - 8192.0) / 8192.0 * BEND_RANGE_SEMITONES;
                self.bend_ratio = 2f64.powf(semitones / 12.0);
            }
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.kill_all();
        self.bend_ratio = 1.0;
    }
}

fn load_wav(path: &Path) -> Result<SampleData, SfzError> {
    let sample_error = |source| SfzError::Sample { path: path.to_path_buf(), source };

    let mut reader = hound::WavReader::open(path).map_err(sample_error)?;
    let spec = reader.spec();

    let frames: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(sample_error)?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 * scale))
                .collect::<Result<_, _>>()
                .map_err(sample_error)?
        }
    };

    Ok(SampleData {
        frames,
        channels: spec.channels as usize,
        sample_rate: spec.sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tactus-sfz-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Write a mono float WAV of `frames` constant samples.
    fn write_wav(dir: &Path, name: &str, value: f32, frames: usize) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44_100,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(dir.join(name), spec).unwrap();
        for _ in 0..frames {
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn render_frames(instrument: &mut SfzInstrument, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; frames * 2];
        instrument.render(&mut out).unwrap();
        out
    }

    #[test]
    fn note_in_range_produces_sound() {
        let dir = test_dir("basic");
        write_wav(&dir, "c4.wav", 0.5, 44_100);
        let mut instrument =
            SfzInstrument::from_string(&dir, "<region> sample=c4.wav key=60").unwrap();

        instrument.handle_midi(0x90, 60, 127);
        let out = render_frames(&mut instrument, 64);

        assert!(out.iter().all(|&s| (s - 0.5).abs() < 1e-3));
    }

    #[test]
    fn note_outside_range_is_silent() {
        let dir = test_dir("range");
        write_wav(&dir, "c4.wav", 0.5, 4_410);
        let mut instrument =
            SfzInstrument::from_string(&dir, "<region> sample=c4.wav lokey=60 hikey=64").unwrap();

        instrument.handle_midi(0x90, 72, 127);
        let out = render_frames(&mut instrument, 64);

        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn velocity_selects_the_matching_layer() {
        let dir = test_dir("layers");
        write_wav(&dir, "soft.wav", 0.2, 4_410);
        write_wav(&dir, "hard.wav", 0.8, 4_410);
        let text = "
            <region> sample=soft.wav key=60 lovel=0 hivel=63
            <region> sample=hard.wav key=60 lovel=64 hivel=127
        ";
        let mut instrument = SfzInstrument::from_string(&dir, text).unwrap();

        instrument.handle_midi(0x90, 60, 127);
        let out = render_frames(&mut instrument, 16);
        // hard layer at full velocity: 0.8 * 127/127
        assert!((out[0] - 0.8).abs() < 1e-3);

        instrument.reset();
        instrument.handle_midi(0x90, 60, 32);
        let out = render_frames(&mut instrument, 16);
        // soft layer scaled by velocity
        assert!((out[0] - 0.2 * 32.0 / 127.0).abs() < 1e-3);
    }

    #[test]
    fn note_off_fades_to_silence() {
        let dir = test_dir("release");
        write_wav(&dir, "c4.wav", 0.5, 44_100);
        let mut instrument =
            SfzInstrument::from_string(&dir, "<region> sample=c4.wav key=60").unwrap();

        instrument.handle_midi(0x90, 60, 127);
        render_frames(&mut instrument, 64);
        instrument.handle_midi(0x80, 60, 0);

        // The release ramp is 10 ms = 441 frames; well past it, silence.
        let mut out = Vec::new();
        for _ in 0..10 {
            out = render_frames(&mut instrument, 128);
        }
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn velocity_zero_note_on_acts_as_note_off() {
        let dir = test_dir("vel0");
        write_wav(&dir, "c4.wav", 0.5, 44_100);
        let mut instrument =
            SfzInstrument::from_string(&dir, "<region> sample=c4.wav key=60").unwrap();

        instrument.handle_midi(0x90, 60, 127);
        instrument.handle_midi(0x90, 60, 0);
        for _ in 0..10 {
            render_frames(&mut instrument, 128);
        }
        assert!(render_frames(&mut instrument, 64).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn one_shot_ignores_note_off() {
        let dir = test_dir("oneshot");
        write_wav(&dir, "hit.wav", 0.5, 44_100);
        let mut instrument = SfzInstrument::from_string(
            &dir,
            "<region> sample=hit.wav key=36 loop_mode=one_shot",
        )
        .unwrap();

        instrument.handle_midi(0x90, 36, 127);
        instrument.handle_midi(0x80, 36, 0);
        let out = render_frames(&mut instrument, 64);

        assert!((out[0] - 0.5).abs() < 1e-3, "one-shot keeps sounding");
    }

    #[test]
    fn higher_note_exhausts_the_sample_faster() {
        let dir = test_dir("pitch");
        write_wav(&dir, "c4.wav", 0.5, 100);
        let text = "<region> sample=c4.wav lokey=0 hikey=127 pitch_keycenter=60";

        // An octave up reads at double step: ~50 output frames of sound.
        let mut instrument = SfzInstrument::from_string(&dir, text).unwrap();
        instrument.handle_midi(0x90, 72, 127);
        let out = render_frames(&mut instrument, 128);
        assert!(out[2 * 40] != 0.0);
        assert_eq!(out[2 * 60], 0.0);

        // At the keycenter it lasts ~99 frames.
        let mut instrument = SfzInstrument::from_string(&dir, text).unwrap();
        instrument.handle_midi(0x90, 60, 127);
        let out = render_frames(&mut instrument, 128);
        assert!(out[2 * 60] != 0.0);
        assert_eq!(out[2 * 110], 0.0);
    }

    #[test]
    fn looped_region_sustains_past_the_sample_end() {
        let dir = test_dir("loop");
        write_wav(&dir, "pad.wav", 0.5, 100);
        let text = "<region> sample=pad.wav key=60 loop_mode=loop_continuous loop_start=0 loop_end=99";
        let mut instrument = SfzInstrument::from_string(&dir, text).unwrap();

        instrument.handle_midi(0x90, 60, 127);
        let out = render_frames(&mut instrument, 1_000);

        assert!(out[2 * 999] != 0.0, "loop sustains past 100 source frames");
    }

    #[test]
    fn reset_silences_everything() {
        let dir = test_dir("reset");
        write_wav(&dir, "c4.wav", 0.5, 44_100);
        let mut instrument =
            SfzInstrument::from_string(&dir, "<region> sample=c4.wav key=60").unwrap();

        instrument.handle_midi(0x90, 60, 127);
        instrument.reset();
        let out = render_frames(&mut instrument, 64);

        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn missing_sample_reports_its_path() {
        let dir = test_dir("missing");
        let err = SfzInstrument::from_string(&dir, "<region> sample=absent.wav").unwrap_err();
        match err {
            SfzError::Sample { path, .. } => {
                assert!(path.ends_with("absent.wav"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn file_with_no_regions_is_an_error() {
        let dir = test_dir("empty");
        assert!(matches!(
            SfzInstrument::from_string(&dir, "// nothing here"),
            Err(SfzError::NoRegions)
        ));
    }
}
