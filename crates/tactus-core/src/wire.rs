//! Packed wire format for control-side event batches.
//!
//! Each event is one fixed-size little-endian record:
//!
//! ```text
//! offset 0  u8   kind     (0 = MIDI, 1 = VOLUME)
//! offset 1  u32  frame
//! offset 5  [u8; 4]  payload
//! ```
//!
//! A MIDI payload is `status, data1, data2` followed by one zero pad byte;
//! a VOLUME payload is an f32 gain. Batches are concatenated records; the
//! event count travels out of band.

use alloc::vec::Vec;
use core::fmt;

use crate::event::{Event, EventPayload, MidiMessage};

/// Size in bytes of one packed event record.
pub const EVENT_RECORD_SIZE: usize = 9;

const KIND_MIDI: u8 = 0;
const KIND_VOLUME: u8 = 1;

/// Error type for wire decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireError {
    /// The byte stream ended before the declared event count was read.
    Truncated { expected: usize, actual: usize },
    /// A record carried an unknown kind byte.
    UnknownKind { index: usize, kind: u8 },
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Truncated { expected, actual } => {
                write!(f, "event stream truncated: need {} bytes, got {}", expected, actual)
            }
            WireError::UnknownKind { index, kind } => {
                write!(f, "event {} has unknown kind byte 0x{:02X}", index, kind)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for WireError {}

/// Decode `count` packed records from `bytes`.
///
/// Trailing bytes beyond `count` records are ignored.
pub fn decode_events(bytes: &[u8], count: u32) -> Result<Vec<Event>, WireError> {
    let needed = count as usize * EVENT_RECORD_SIZE;
    if bytes.len() < needed {
        return Err(WireError::Truncated { expected: needed, actual: bytes.len() });
    }

    let mut events = Vec::with_capacity(count as usize);
    for (index, record) in bytes[..needed].chunks_exact(EVENT_RECORD_SIZE).enumerate() {
        let frame = u32::from_le_bytes([record[1], record[2], record[3], record[4]]);
        let payload = match record[0] {
            KIND_MIDI => EventPayload::Midi(MidiMessage::new(record[5], record[6], record[7])),
            KIND_VOLUME => {
                let gain = f32::from_le_bytes([record[5], record[6], record[7], record[8]]);
                EventPayload::Volume(gain)
            }
            kind => return Err(WireError::UnknownKind { index, kind }),
        };
        events.push(Event::new(frame, payload));
    }
    Ok(events)
}

/// Encode events as concatenated packed records.
pub fn encode_events(events: &[Event]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(events.len() * EVENT_RECORD_SIZE);
    for event in events {
        match event.payload {
            EventPayload::Midi(msg) => {
                bytes.push(KIND_MIDI);
                bytes.extend_from_slice(&event.frame.to_le_bytes());
                bytes.extend_from_slice(&[msg.status, msg.data1, msg.data2, 0]);
            }
            EventPayload::Volume(gain) => {
                bytes.push(KIND_VOLUME);
                bytes.extend_from_slice(&event.frame.to_le_bytes());
                bytes.extend_from_slice(&gain.to_le_bytes());
            }
        }
    }
    bytes
}
