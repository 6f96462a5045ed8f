//! Timer-paced output for headless operation.

use std::time::{Duration, Instant};

use crate::pcm::PcmFrame;
use crate::traits::{AudioError, AudioOutput};

/// An output that discards frames but sleeps to hold block cadence.
///
/// Used when no audio device can be opened, so the scheduler position
/// keeps advancing in real time for headless tests and tools.
pub struct NullOutput {
    sample_rate: u32,
    next_deadline: Option<Instant>,
}

impl NullOutput {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate, next_deadline: None }
    }
}

impl AudioOutput for NullOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, frames: &[PcmFrame]) {
        let block = Duration::from_micros(frames.len() as u64 * 1_000_000 / self.sample_rate as u64);
        let deadline = match self.next_deadline {
            Some(deadline) => deadline,
            None => Instant::now(),
        } + block;

        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
            self.next_deadline = Some(deadline);
        } else {
            // Fell behind; restart the cadence instead of racing to catch up.
            self.next_deadline = Some(now);
        }
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.next_deadline = None;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_holds_block_cadence() {
        let mut output = NullOutput::new(44_100);
        let frames = vec![PcmFrame::silence(); 441]; // 10 ms

        let start = Instant::now();
        output.write(&frames);
        output.write(&frames);

        assert!(start.elapsed() >= Duration::from_millis(15));
    }
}
