//! tactus CLI — demo sequence playback and WAV export.
//!
//! Usage:
//!   tactus instrument.sf2 [--preset N]
//!   tactus instrument.sfz --seconds 8
//!   tactus instrument.sf2 --wav output.wav

mod wav;

use std::io::Write;
use std::path::Path;
use std::{env, fs};

use tactus_audio::{block_to_pcm, Engine, EngineConfig, PcmFrame};
use tactus_core::{Event, BLOCK_FRAMES, CHANNEL_COUNT, INVALID_TRACK, SAMPLE_RATE};
use tactus_engine::{Instrument, Mixer};
use tactus_instruments::{SfzInstrument, SoundFontInstrument};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let path = args.get(1).unwrap_or_else(|| {
        eprintln!("Usage: tactus <file.sf2|file.sfz> [--preset N] [--seconds N] [--wav output.wav]");
        std::process::exit(1);
    });

    let preset: i32 = flag_value(&args, "--preset").unwrap_or(0);
    let seconds: u32 = flag_value(&args, "--seconds").unwrap_or(6);
    let wav_path = args
        .iter()
        .position(|a| a == "--wav")
        .and_then(|i| args.get(i + 1))
        .cloned();

    let instrument = load_instrument(Path::new(path), preset);
    let events = demo_events(SAMPLE_RATE, seconds);

    match wav_path {
        Some(out) => render_to_wav(instrument, &events, seconds, &out),
        None => play_live(instrument, &events, seconds),
    }
}

fn flag_value<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}

fn load_instrument(path: &Path, preset: i32) -> Box<dyn Instrument> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "sf2" => {
            let mut instrument = SoundFontInstrument::new(preset);
            instrument.set_output_format(SAMPLE_RATE, CHANNEL_COUNT == 2);
            if let Err(err) = instrument.load_file(path) {
                eprintln!("Failed to load {}: {}", path.display(), err);
                std::process::exit(1);
            }
            Box::new(instrument)
        }
        "sfz" => match SfzInstrument::from_file(path) {
            Ok(mut instrument) => {
                instrument.set_output_format(SAMPLE_RATE, CHANNEL_COUNT == 2);
                Box::new(instrument)
            }
            Err(err) => {
                eprintln!("Failed to load {}: {}", path.display(), err);
                std::process::exit(1);
            }
        },
        other => {
            eprintln!("Unsupported instrument format: .{}", other);
            std::process::exit(1);
        }
    }
}

/// A C-major arpeggio in half-second steps, with a volume dip at the
/// halfway point. Exercises notes, note-offs, and volume events.
fn demo_events(sample_rate: u32, seconds: u32) -> Vec<Event> {
    const NOTES: [u8; 4] = [60, 64, 67, 72];

    let step = sample_rate / 2;
    let total = sample_rate * seconds;
    let mut events = Vec::new();

    let mut frame = 0u32;
    let mut index = 0usize;
    while frame + step <= total {
        let note = NOTES[index % NOTES.len()];
        events.push(Event::midi(frame, 0x90, note, 100));
        events.push(Event::midi(frame + step * 4 / 5, 0x80, note, 0));
        frame += step;
        index += 1;
    }

    events.push(Event::volume(total / 2, 0.5));
    events.push(Event::volume(total * 3 / 4, 1.0));

    events.sort_by_key(|event| event.frame);
    events
}

fn render_to_wav(instrument: Box<dyn Instrument>, events: &[Event], seconds: u32, out_path: &str) {
    let (mut mixer, mut handle) = Mixer::new(CHANNEL_COUNT);
    let index = handle.add_track(instrument);
    assert_ne!(index, INVALID_TRACK);

    let accepted = handle.schedule_events(index, events);
    if accepted as usize != events.len() {
        log::warn!("only {} of {} events fit the queue", accepted, events.len());
    }
    handle.play();

    println!("Rendering {}s to {} at {} Hz...", seconds, out_path, SAMPLE_RATE);

    let total_frames = SAMPLE_RATE * seconds;
    let mut float_block = vec![0.0f32; BLOCK_FRAMES as usize * CHANNEL_COUNT];
    let mut pcm_block = vec![PcmFrame::silence(); BLOCK_FRAMES as usize];
    let mut frames = Vec::with_capacity(total_frames as usize);

    while handle.position() < total_frames {
        mixer.render(&mut float_block, BLOCK_FRAMES);
        block_to_pcm(&float_block, CHANNEL_COUNT, &mut pcm_block);
        frames.extend_from_slice(&pcm_block);
    }

    let bytes = wav::frames_to_wav(&frames, SAMPLE_RATE);
    fs::write(out_path, &bytes).unwrap_or_else(|err| {
        eprintln!("Failed to write {}: {}", out_path, err);
        std::process::exit(1);
    });

    println!("Wrote {} bytes", bytes.len());
}

fn play_live(instrument: Box<dyn Instrument>, events: &[Event], seconds: u32) {
    let mut engine = Engine::start(EngineConfig::default());
    let index = engine.control().add_track(instrument);
    assert_ne!(index, INVALID_TRACK);

    engine.control().schedule_events(index, events);
    engine.play();
    println!("Playing for {}s...", seconds);

    let total_frames = SAMPLE_RATE * seconds;
    while engine.position() < total_frames {
        for record in engine.control().drain_diagnostics() {
            log::warn!("{}", record);
        }
        print!("\rframe {:>10}", engine.position());
        let _ = std::io::stdout().flush();
        std::thread::sleep(std::time::Duration::from_millis(50));
    }

    engine.pause();
    println!("\rDone.          ");
}
