//! End-to-end exercise of the C ABI lifecycle.
//!
//! One test function: the facade holds process-wide state, so the steps
//! must run in order.

use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use tactus_core::{encode_events, Event};

static SAMPLE_RATE: AtomicI32 = AtomicI32::new(0);

extern "C" fn sample_rate_callback(value: i32) {
    SAMPLE_RATE.store(value, Ordering::SeqCst);
}

#[test]
fn control_api_lifecycle() {
    tactus_ffi::setup_engine(sample_rate_callback);
    assert_eq!(SAMPLE_RATE.load(Ordering::SeqCst), 44_100);

    // Scheduling on a track that does not exist accepts nothing.
    let bytes = encode_events(&[Event::midi(0, 0x90, 60, 100)]);
    let accepted = unsafe { tactus_ffi::schedule_events(0, bytes.as_ptr(), 1) };
    assert_eq!(accepted, 0);
    assert_eq!(tactus_ffi::get_track_volume(0), 1.0);
    assert_eq!(tactus_ffi::get_buffer_available_count(0), 0);

    // The transport advances in real time once playing, even headless.
    tactus_ffi::engine_play();
    std::thread::sleep(Duration::from_millis(60));
    assert!(
        tactus_ffi::get_position() > 0,
        "transport should advance while playing"
    );
    assert!(tactus_ffi::get_last_render_time_us() > 0);

    // Pause freezes the position (allow one in-flight block to land).
    tactus_ffi::engine_pause();
    std::thread::sleep(Duration::from_millis(20));
    let paused_at = tactus_ffi::get_position();
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(tactus_ffi::get_position(), paused_at);

    // Removing or clearing on unknown tracks is a no-op, not a crash.
    tactus_ffi::remove_track(3);
    tactus_ffi::reset_track(3);
    tactus_ffi::clear_events(3, 0);

    tactus_ffi::destroy_engine();
    assert_eq!(tactus_ffi::get_position(), 0);
}
