//! SoundFont instrument backed by rustysynth.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};
use tactus_core::{MAX_BLOCK_FRAMES, SAMPLE_RATE};
use tactus_engine::{Instrument, RenderError};

/// Error type for SoundFont loading.
#[derive(Debug)]
pub enum SoundFontError {
    /// Could not read the file
    Io(std::io::Error),
    /// The file is not a usable SoundFont
    Parse(String),
    /// The synthesizer rejected the configuration
    Synthesizer(String),
}

impl std::fmt::Display for SoundFontError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SoundFontError::Io(err) => write!(f, "SoundFont read error: {}", err),
            SoundFontError::Parse(msg) => write!(f, "SoundFont parse error: {}", msg),
            SoundFontError::Synthesizer(msg) => write!(f, "Synthesizer error: {}", msg),
        }
    }
}

impl std::error::Error for SoundFontError {}

impl From<std::io::Error> for SoundFontError {
    fn from(err: std::io::Error) -> Self {
        SoundFontError::Io(err)
    }
}

/// A polyphonic SoundFont (SF2) instrument.
///
/// Renders into planar scratch buffers sized for the largest block, then
/// interleaves; nothing on the render path allocates. The GM program
/// number given at load time is applied to all 16 MIDI channels.
pub struct SoundFontInstrument {
    sound_font: Option<Arc<SoundFont>>,
    synthesizer: Option<Synthesizer>,
    preset: i32,
    sample_rate: u32,
    stereo: bool,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl SoundFontInstrument {
    /// Create an unloaded instrument for the given GM program number.
    pub fn new(preset: i32) -> Self {
        Self {
            sound_font: None,
            synthesizer: None,
            preset,
            sample_rate: SAMPLE_RATE,
            stereo: true,
            left: vec![0.0; MAX_BLOCK_FRAMES as usize],
            right: vec![0.0; MAX_BLOCK_FRAMES as usize],
        }
    }

    /// Load an SF2 file and build the synthesizer at the configured rate.
    pub fn load_file(&mut self, path: &Path) -> Result<(), SoundFontError> {
        let mut file = File::open(path)?;
        let sound_font = Arc::new(
            SoundFont::new(&mut file).map_err(|err| SoundFontError::Parse(err.to_string()))?,
        );
        self.sound_font = Some(sound_font);
        self.rebuild_synthesizer()
    }

    fn rebuild_synthesizer(&mut self) -> Result<(), SoundFontError> {
        let Some(sound_font) = self.sound_font.as_ref() else {
            return Ok(());
        };

        let settings = SynthesizerSettings::new(self.sample_rate as i32);
        let synthesizer = Synthesizer::new(sound_font, &settings)
            .map_err(|err| SoundFontError::Synthesizer(err.to_string()))?;
        self.synthesizer = Some(synthesizer);

        let preset_count = sound_font.get_presets().len();
        let in_bank_zero = sound_font
            .get_presets()
            .iter()
            .any(|preset| preset.get_bank_number() == 0 && preset.get_patch_number() == self.preset);
        if !in_bank_zero {
            log::warn!(
                "GM program {} not found in bank 0 ({} presets); falling back to program 0",
                self.preset,
                preset_count
            );
            self.preset = 0;
        }

        // Select the program on every channel so events can use any of them.
        if let Some(synthesizer) = self.synthesizer.as_mut() {
            for channel in 0..16 {
                synthesizer.process_midi_message(channel, 0xC0, self.preset, 0);
            }
        }
        Ok(())
    }

    pub fn preset(&self) -> i32 {
        self.preset
    }
}

impl Instrument for SoundFontInstrument {
    fn set_output_format(&mut self, sample_rate: u32, stereo: bool) -> bool {
        let rate_changed = self.sample_rate != sample_rate;
        self.sample_rate = sample_rate;
        self.stereo = stereo;
        if rate_changed && self.sound_font.is_some() {
            return self.rebuild_synthesizer().is_ok();
        }
        true
    }

    fn render(&mut self, out: &mut [f32]) -> Result<(), RenderError> {
        let channels = if self.stereo { 2 } else { 1 };
        let frames = out.len() / channels;

        let Some(synthesizer) = self.synthesizer.as_mut() else {
            out.fill(0.0);
            return Ok(());
        };
        if frames > self.left.len() {
            out.fill(0.0);
            return Err(RenderError);
        }

        let left = &mut self.left[..frames];
        let right = &mut self.right[..frames];
        synthesizer.render(left, right);

        if self.stereo {
            for (frame, pair) in out.chunks_exact_mut(2).enumerate() {
                pair[0] = left[frame];
                pair[1] = right[frame];
            }
        } else {
            for (frame, sample) in out.iter_mut().enumerate() {
                *sample = (left[frame] + right[frame]) * 0.5;
            }
        }
        Ok(())
    }

    fn handle_midi(&mut self, status: u8, data1: u8, data2: u8) {
        let Some(synthesizer) = self.synthesizer.as_mut() else {
            return;
        };
        let channel = (status & 0x0F) as i32;
        let command = (status & 0xF0) as i32;

        // Velocity-0 NoteOn is a NoteOff per MIDI 1.0.
        if command == 0x90 && data2 == 0 {
            synthesizer.process_midi_message(channel, 0x80, data1 as i32, 0);
            return;
        }
        synthesizer.process_midi_message(channel, command, data1 as i32, data2 as i32);
    }

    fn reset(&mut self) {
        if let Some(synthesizer) = self.synthesizer.as_mut() {
            synthesizer.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unloaded_instrument_renders_silence() {
        let mut instrument = SoundFontInstrument::new(0);
        let mut out = [0.7f32; 64];
        instrument.render(&mut out).unwrap();
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn midi_before_load_is_ignored() {
        let mut instrument = SoundFontInstrument::new(0);
        instrument.handle_midi(0x90, 60, 100);
        instrument.reset();
    }

    #[test]
    fn missing_file_reports_io_error() {
        let mut instrument = SoundFontInstrument::new(0);
        let err = instrument
            .load_file(Path::new("/nonexistent/instrument.sf2"))
            .unwrap_err();
        assert!(matches!(err, SoundFontError::Io(_)));
    }
}
