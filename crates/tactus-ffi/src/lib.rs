//! C ABI facade for the tactus sequencing engine.
//!
//! One engine per process, held in a locked cell; every entry point checks
//! it the way hosts expect (`-1` / no-op instead of panics). Instrument
//! loading happens on detached worker threads and reports the allocated
//! track index (or `-1`) through the caller's callback, so the calling
//! thread never blocks on file parsing.

use std::ffi::{c_char, CStr};
use std::path::Path;
use std::sync::Mutex;

use tactus_audio::{Engine, EngineConfig};
use tactus_core::{decode_events, Event, PositionFrames, TrackIndex, INVALID_TRACK};
use tactus_engine::Instrument;
use tactus_instruments::{SfzInstrument, SoundFontInstrument};

/// Callback port for async results: receives a track index or `-1`.
pub type ResultCallback = extern "C" fn(i32);

static ENGINE: Mutex<Option<Engine>> = Mutex::new(None);

/// Run `f` with the engine if one is set up. Logs the standard complaint
/// otherwise and returns the fallback.
fn with_engine<T>(fallback: T, f: impl FnOnce(&mut Engine) -> T) -> T {
    let mut guard = match ENGINE.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    match guard.as_mut() {
        Some(engine) => {
            let result = f(engine);
            housekeeping(engine);
            result
        }
        None => {
            log::error!("engine is not set up; call setup_engine() first");
            fallback
        }
    }
}

/// Drain audio-thread diagnostics into the log and drop retired
/// instruments. Piggybacks on every control call.
fn housekeeping(engine: &mut Engine) {
    for record in engine.control().drain_diagnostics() {
        log::warn!("{}", record);
    }
    engine.control().reclaim_instruments();
}

fn decode_batch(event_data: *const u8, events_count: i32) -> Option<Vec<Event>> {
    if event_data.is_null() || events_count < 0 {
        return None;
    }
    let len = events_count as usize * tactus_core::EVENT_RECORD_SIZE;
    let bytes = unsafe { std::slice::from_raw_parts(event_data, len) };
    match decode_events(bytes, events_count as u32) {
        Ok(events) => Some(events),
        Err(err) => {
            log::error!("rejecting event batch: {}", err);
            None
        }
    }
}

unsafe fn c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

/// Configure a loaded instrument for the engine's output format.
fn apply_output_format(engine: &Engine, instrument: &mut dyn Instrument) -> bool {
    instrument.set_output_format(engine.sample_rate(), engine.channels() > 1)
}

/// Hand a loaded instrument to the mixer and report the index.
fn finish_add_track(instrument: Box<dyn Instrument>, callback: ResultCallback) {
    let index = with_engine(INVALID_TRACK, |engine| engine.control().add_track(instrument));
    if index == INVALID_TRACK {
        log::error!("no free track slot");
    }
    callback(index);
}

/// Construct the engine and report the sample rate through the callback.
#[no_mangle]
pub extern "C" fn setup_engine(sample_rate_callback: ResultCallback) {
    let _ = env_logger::try_init();

    let mut guard = match ENGINE.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if guard.is_some() {
        log::warn!("setup_engine called twice; keeping the existing engine");
    } else {
        *guard = Some(Engine::start(EngineConfig::default()));
    }
    let sample_rate = guard.as_ref().map(|e| e.sample_rate()).unwrap_or(0);
    drop(guard);

    sample_rate_callback(sample_rate as i32);
}

/// Pause, stop the device, and tear the engine down.
#[no_mangle]
pub extern "C" fn destroy_engine() {
    let mut guard = match ENGINE.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard = None; // Engine::drop pauses, stops the render thread, frees tracks
}

/// Load a SoundFont asynchronously; the callback receives the track index
/// or `-1`. `is_asset` is accepted for source compatibility; assets
/// resolve as ordinary paths here.
///
/// # Safety
/// `path` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn add_track_sf2(
    path: *const c_char,
    is_asset: bool,
    preset_index: i32,
    callback: ResultCallback,
) {
    let Some(path) = c_str(path).map(String::from) else {
        callback(INVALID_TRACK);
        return;
    };
    if is_asset {
        log::debug!("is_asset ignored; loading {} from the filesystem", path);
    }

    std::thread::spawn(move || {
        let mut instrument = SoundFontInstrument::new(preset_index);
        let configured = with_engine(false, |engine| {
            apply_output_format(engine, &mut instrument)
        });
        if !configured {
            callback(INVALID_TRACK);
            return;
        }
        match instrument.load_file(Path::new(&path)) {
            Ok(()) => finish_add_track(Box::new(instrument), callback),
            Err(err) => {
                log::error!("failed to load {}: {}", path, err);
                callback(INVALID_TRACK);
            }
        }
    });
}

/// Load an SFZ file asynchronously; the callback receives the track index
/// or `-1`.
///
/// # Safety
/// `path` and `tuning_path` must be valid NUL-terminated strings
/// (`tuning_path` may be null).
#[no_mangle]
pub unsafe extern "C" fn add_track_sfz(
    path: *const c_char,
    tuning_path: *const c_char,
    callback: ResultCallback,
) {
    let Some(path) = c_str(path).map(String::from) else {
        callback(INVALID_TRACK);
        return;
    };
    warn_tuning_unsupported(c_str(tuning_path));

    std::thread::spawn(move || match SfzInstrument::from_file(Path::new(&path)) {
        Ok(mut instrument) => {
            let configured = with_engine(false, |engine| {
                apply_output_format(engine, &mut instrument)
            });
            if configured {
                finish_add_track(Box::new(instrument), callback);
            } else {
                callback(INVALID_TRACK);
            }
        }
        Err(err) => {
            log::error!("failed to load {}: {}", path, err);
            callback(INVALID_TRACK);
        }
    });
}

/// Build an SFZ instrument from in-memory text, resolving samples under
/// `sample_root`.
///
/// # Safety
/// `sample_root` and `sfz_string` must be valid NUL-terminated strings
/// (`tuning_string` may be null).
#[no_mangle]
pub unsafe extern "C" fn add_track_sfz_string(
    sample_root: *const c_char,
    sfz_string: *const c_char,
    tuning_string: *const c_char,
    callback: ResultCallback,
) {
    let (Some(root), Some(text)) = (
        c_str(sample_root).map(String::from),
        c_str(sfz_string).map(String::from),
    ) else {
        callback(INVALID_TRACK);
        return;
    };
    warn_tuning_unsupported(c_str(tuning_string));

    std::thread::spawn(
        move || match SfzInstrument::from_string(Path::new(&root), &text) {
            Ok(mut instrument) => {
                let configured = with_engine(false, |engine| {
                    apply_output_format(engine, &mut instrument)
                });
                if configured {
                    finish_add_track(Box::new(instrument), callback);
                } else {
                    callback(INVALID_TRACK);
                }
            }
            Err(err) => {
                log::error!("failed to build SFZ instrument: {}", err);
                callback(INVALID_TRACK);
            }
        },
    );
}

fn warn_tuning_unsupported(tuning: Option<&str>) {
    if let Some(tuning) = tuning {
        if !tuning.is_empty() {
            log::warn!("scala tuning ({}) is not supported; ignoring", tuning);
        }
    }
}

#[no_mangle]
pub extern "C" fn remove_track(track_index: TrackIndex) {
    with_engine((), |engine| engine.control().remove_track(track_index));
}

#[no_mangle]
pub extern "C" fn reset_track(track_index: TrackIndex) {
    with_engine((), |engine| engine.control().reset_track(track_index));
}

#[no_mangle]
pub extern "C" fn get_track_volume(track_index: TrackIndex) -> f32 {
    with_engine(1.0, |engine| engine.control().track_volume(track_index))
}

#[no_mangle]
pub extern "C" fn get_position() -> PositionFrames {
    with_engine(0, |engine| engine.position())
}

#[no_mangle]
pub extern "C" fn get_last_render_time_us() -> u64 {
    with_engine(0, |engine| engine.last_render_time_us())
}

#[no_mangle]
pub extern "C" fn get_buffer_available_count(track_index: TrackIndex) -> u32 {
    with_engine(0, |engine| engine.control().buffer_available(track_index))
}

/// Parse a packed event batch and dispatch it at the start of the next
/// block, bypassing the queue.
///
/// # Safety
/// `event_data` must point to `events_count` packed records.
#[no_mangle]
pub unsafe extern "C" fn handle_events_now(
    track_index: TrackIndex,
    event_data: *const u8,
    events_count: i32,
) {
    let Some(events) = decode_batch(event_data, events_count) else {
        return;
    };
    with_engine((), |engine| {
        engine.control().handle_events_now(track_index, &events)
    });
}

/// Parse a packed event batch and append it to the track's queue.
/// Returns the number of events accepted, or `-1` without an engine.
///
/// # Safety
/// `event_data` must point to `events_count` packed records.
#[no_mangle]
pub unsafe extern "C" fn schedule_events(
    track_index: TrackIndex,
    event_data: *const u8,
    events_count: i32,
) -> i32 {
    let Some(events) = decode_batch(event_data, events_count) else {
        return 0;
    };
    with_engine(-1, |engine| {
        engine.control().schedule_events(track_index, &events) as i32
    })
}

#[no_mangle]
pub extern "C" fn clear_events(track_index: TrackIndex, from_frame: PositionFrames) {
    with_engine((), |engine| {
        engine.control().clear_events(track_index, from_frame)
    });
}

#[no_mangle]
pub extern "C" fn engine_play() {
    with_engine((), |engine| engine.play());
}

#[no_mangle]
pub extern "C" fn engine_pause() {
    with_engine((), |engine| engine.pause());
}
