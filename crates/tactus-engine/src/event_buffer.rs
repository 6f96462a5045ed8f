//! Frame-ordered SPSC queue of scheduled events.
//!
//! One buffer per track. The control thread appends, the audio thread
//! peeks and pops; neither side blocks or allocates. Because appends are
//! rejected unless their frame is at or after the newest queued event, the
//! ring is a sorted queue without any heap structure.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

use tactus_core::{Event, EventPayload, MidiMessage, PositionFrames};

/// Fixed-capacity single-producer/single-consumer event ring.
///
/// Roles, not types, enforce the SPSC contract: exactly one thread may call
/// the producer operations (`append`, `clear_after`, `clear`) and exactly
/// one thread the consumer operations (`peek`, `pop`). The head index is
/// written only by the consumer, the tail only by the producer; each side
/// reads the other's index with acquire ordering.
pub struct EventBuffer {
    slots: Box<[UnsafeCell<Event>]>,
    /// Next slot to pop. Monotonic; slot index is `head % capacity`.
    head: AtomicUsize,
    /// Next slot to write. Monotonic.
    tail: AtomicUsize,
}

// Slots are only ever written by the producer, in slots the consumer cannot
// observe until the tail store publishes them.
unsafe impl Send for EventBuffer {}
unsafe impl Sync for EventBuffer {}

impl EventBuffer {
    /// Create a buffer holding up to `capacity` events.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        let placeholder = Event::new(0, EventPayload::Midi(MidiMessage::new(0, 0, 0)));
        let slots: Vec<UnsafeCell<Event>> =
            (0..capacity).map(|_| UnsafeCell::new(placeholder)).collect();
        Self {
            slots: slots.into_boxed_slice(),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of events currently queued.
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining capacity in events.
    pub fn available(&self) -> u32 {
        (self.capacity() - self.len()) as u32
    }

    /// Append events in order. Producer side.
    ///
    /// Each event must have a frame at or after the newest event already in
    /// the buffer, and there must be room for it. Appending stops at the
    /// first rejected event; the number accepted is returned.
    pub fn append(&self, events: &[Event]) -> u32 {
        let mut tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);

        let mut accepted = 0u32;
        for event in events {
            if tail.wrapping_sub(head) >= self.capacity() {
                break;
            }
            if tail != head {
                // Safety: the slot before tail was written by this producer.
                let newest = unsafe { *self.slots[(tail - 1) % self.capacity()].get() };
                if event.frame < newest.frame {
                    break;
                }
            }
            // Safety: slot at tail is unpublished; only the producer writes it.
            unsafe {
                *self.slots[tail % self.capacity()].get() = *event;
            }
            tail = tail.wrapping_add(1);
            accepted += 1;
        }

        if accepted > 0 {
            self.tail.store(tail, Ordering::Release);
        }
        accepted
    }

    /// Copy the earliest event without removing it. Consumer side.
    pub fn peek(&self) -> Option<Event> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        // Safety: the slot at head was published by the tail store above.
        Some(unsafe { *self.slots[head % self.capacity()].get() })
    }

    /// Remove the earliest event. Consumer side. No-op when empty.
    pub fn pop(&self) {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head != tail {
            self.head.store(head.wrapping_add(1), Ordering::Release);
        }
    }

    /// Remove every queued event with `frame >= from_frame`. Producer side.
    ///
    /// This retracts the tail, so the caller must ensure the consumer is
    /// not draining the buffer at the same time, either by pausing it or
    /// by accepting that events popped during the call were already
    /// delivered. `append` and `clear_after` must come from the same
    /// thread.
    pub fn clear_after(&self, from_frame: PositionFrames) {
        let mut tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        while tail != head {
            // Safety: slots below tail belong to the producer.
            let newest = unsafe { *self.slots[(tail - 1) % self.capacity()].get() };
            if newest.frame < from_frame {
                break;
            }
            tail = tail.wrapping_sub(1);
        }
        self.tail.store(tail, Ordering::Release);
    }

    /// Remove all queued events. Producer side; same caveats as
    /// [`clear_after`](Self::clear_after).
    pub fn clear(&self) {
        self.clear_after(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn midi_at(frame: PositionFrames) -> Event {
        Event::midi(frame, 0x90, 60, 100)
    }

    #[test]
    fn append_and_pop_in_order() {
        let buffer = EventBuffer::new(8);
        assert_eq!(buffer.append(&[midi_at(1), midi_at(5), midi_at(9)]), 3);

        assert_eq!(buffer.peek().unwrap().frame, 1);
        buffer.pop();
        assert_eq!(buffer.peek().unwrap().frame, 5);
        buffer.pop();
        assert_eq!(buffer.peek().unwrap().frame, 9);
        buffer.pop();
        assert!(buffer.peek().is_none());
    }

    #[test]
    fn empty_append_is_a_no_op() {
        let buffer = EventBuffer::new(8);
        assert_eq!(buffer.append(&[]), 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn out_of_order_append_stops_at_first_rejection() {
        let buffer = EventBuffer::new(8);
        assert_eq!(buffer.append(&[midi_at(10)]), 1);
        // 5 is before the newest queued frame; it and everything after it
        // in the batch are rejected.
        assert_eq!(buffer.append(&[midi_at(5), midi_at(20)]), 0);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn same_frame_events_keep_insertion_order() {
        let buffer = EventBuffer::new(8);
        let first = Event::midi(10, 0x90, 60, 100);
        let second = Event::midi(10, 0x90, 64, 100);
        assert_eq!(buffer.append(&[first, second]), 2);

        assert_eq!(buffer.peek().unwrap(), first);
        buffer.pop();
        assert_eq!(buffer.peek().unwrap(), second);
    }

    #[test]
    fn full_buffer_returns_short_count() {
        let buffer = EventBuffer::new(4);
        let batch: Vec<Event> = (0..8).map(|i| midi_at(i)).collect();
        assert_eq!(buffer.append(&batch), 4);
        assert_eq!(buffer.available(), 0);
        assert_eq!(buffer.append(&[midi_at(100)]), 0);
    }

    #[test]
    fn popped_slots_become_available_again() {
        let buffer = EventBuffer::new(2);
        assert_eq!(buffer.append(&[midi_at(0), midi_at(1)]), 2);
        buffer.pop();
        assert_eq!(buffer.available(), 1);
        assert_eq!(buffer.append(&[midi_at(2)]), 1);
        // Index wraps; order is preserved.
        assert_eq!(buffer.peek().unwrap().frame, 1);
    }

    #[test]
    fn clear_after_removes_only_at_or_after_frame() {
        let buffer = EventBuffer::new(8);
        buffer.append(&[midi_at(10), midi_at(20), midi_at(30)]);

        buffer.clear_after(20);

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.peek().unwrap().frame, 10);
        assert_eq!(buffer.available(), 7);
    }

    #[test]
    fn clear_after_boundary_is_inclusive() {
        let buffer = EventBuffer::new(8);
        buffer.append(&[midi_at(10), midi_at(20)]);
        buffer.clear_after(21);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn clear_empties_and_restores_capacity() {
        let buffer = EventBuffer::new(8);
        buffer.append(&[midi_at(0), midi_at(1), midi_at(2)]);
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.available(), 8);
    }

    #[test]
    fn append_after_clear_accepts_earlier_frames() {
        let buffer = EventBuffer::new(8);
        buffer.append(&[midi_at(100)]);
        buffer.clear();
        // Empty buffer imposes no ordering constraint.
        assert_eq!(buffer.append(&[midi_at(1)]), 1);
    }
}
