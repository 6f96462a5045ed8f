//! The fixed-rate driver that connects the mixer to an output backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{SystemTime, UNIX_EPOCH};

use tactus_core::{BLOCK_FRAMES, CHANNEL_COUNT, MAX_BLOCK_FRAMES, SAMPLE_RATE};
use tactus_engine::{Mixer, MixerHandle};

use crate::cpal_backend::CpalOutput;
use crate::null_output::NullOutput;
use crate::pcm::{block_to_pcm, PcmFrame};
use crate::traits::AudioOutput;

/// Fixed output format for one engine instance.
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub channels: usize,
    pub block_frames: u32,
    /// PCM queue depth toward the device, in blocks.
    pub queue_blocks: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: CHANNEL_COUNT,
            block_frames: BLOCK_FRAMES,
            queue_blocks: 3,
        }
    }
}

/// Owns the mixer's render thread and exposes the control handle.
///
/// The render thread pulls one block at a time through the mixer, converts
/// to PCM16, and writes it to the device queue. `play`/`pause` only touch
/// the transport; the device stream keeps running so pausing never stalls
/// the queue.
pub struct Engine {
    control: MixerHandle,
    config: EngineConfig,
    stop: Arc<AtomicBool>,
    render_thread: Option<JoinHandle<()>>,
}

impl Engine {
    /// Spawn the render thread and return the engine.
    ///
    /// If the audio device cannot be opened the engine degrades to the
    /// timer-paced null backend and logs why.
    pub fn start(config: EngineConfig) -> Engine {
        assert!(config.block_frames <= MAX_BLOCK_FRAMES);
        let (mixer, control) = Mixer::new(config.channels);
        let stop = Arc::new(AtomicBool::new(false));

        let thread_stop = stop.clone();
        let render_thread = std::thread::spawn(move || render_thread(mixer, config, thread_stop));

        Engine {
            control,
            config,
            stop,
            render_thread: Some(render_thread),
        }
    }

    /// The control side of the mixer: track management, event scheduling,
    /// diagnostics.
    pub fn control(&mut self) -> &mut MixerHandle {
        &mut self.control
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.config.channels
    }

    pub fn block_frames(&self) -> u32 {
        self.config.block_frames
    }

    pub fn play(&self) {
        self.control.play();
    }

    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn position(&self) -> u32 {
        self.control.position()
    }

    pub fn last_render_time_us(&self) -> u64 {
        self.control.last_render_time_us()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.control.pause();
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.render_thread.take() {
            let _ = thread.join();
        }
        // Instruments retired while shutting down are dropped here, off
        // what used to be the audio thread.
        self.control.reclaim_instruments();
    }
}

fn render_thread(mut mixer: Mixer, config: EngineConfig, stop: Arc<AtomicBool>) {
    let queue_frames = config.queue_blocks * config.block_frames as usize;

    match CpalOutput::new(config.sample_rate, queue_frames) {
        Ok((mut output, consumer)) => match output.build_stream(consumer) {
            Ok(()) => {
                if let Err(err) = output.start() {
                    log::warn!("failed to start audio stream ({}), using timer fallback", err);
                    run_fallback(&mut mixer, &config, &stop);
                    return;
                }
                log::info!("audio stream running at {} Hz", output.sample_rate());
                run_blocks(&mut mixer, &mut output, &config, &stop);
                let _ = output.stop();
            }
            Err(err) => {
                log::warn!("audio stream unavailable ({}), using timer fallback", err);
                run_fallback(&mut mixer, &config, &stop);
            }
        },
        Err(err) => {
            log::warn!("audio device unavailable ({}), using timer fallback", err);
            run_fallback(&mut mixer, &config, &stop);
        }
    }
}

fn run_fallback(mixer: &mut Mixer, config: &EngineConfig, stop: &AtomicBool) {
    let mut output = NullOutput::new(config.sample_rate);
    let _ = output.start();
    run_blocks(mixer, &mut output, config, stop);
}

fn run_blocks(
    mixer: &mut Mixer,
    output: &mut impl AudioOutput,
    config: &EngineConfig,
    stop: &AtomicBool,
) {
    let block = config.block_frames;
    let mut float_block = vec![0.0f32; block as usize * config.channels];
    let mut pcm_block = vec![PcmFrame::silence(); block as usize];

    while !stop.load(Ordering::Relaxed) {
        mixer.transport().set_last_render_time_us(wall_clock_us());
        mixer.render(&mut float_block, block);
        block_to_pcm(&float_block, config.channels, &mut pcm_block);
        output.write(&pcm_block);
    }
}

fn wall_clock_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_micros() as u64)
        .unwrap_or(0)
}
