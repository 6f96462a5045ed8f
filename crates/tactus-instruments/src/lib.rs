//! Concrete instruments for the tactus sequencing engine.
//!
//! Both instruments sit behind `tactus_engine::Instrument`; the core never
//! sees their internals. `SoundFontInstrument` wraps a full SoundFont
//! synthesizer, `SfzInstrument` is a sample-playback voice engine over a
//! subset of the SFZ format.

mod sfz;
mod soundfont;

pub use sfz::{SfzError, SfzInstrument};
pub use soundfont::{SoundFontError, SoundFontInstrument};
