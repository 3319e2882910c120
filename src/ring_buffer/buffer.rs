//! Lock-free ring buffer implementing the disruptor pattern: a bounded,
//! sequence-coordinated queue providing ordered handoff from a single
//! producer to one or more independently-progressing consumers.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, Ordering};

use super::sequence::PaddedSequence;
use super::wait_strategy::WaitStrategy;

/// A single pre-allocated slot. Producer writes before `publish`; consumers
/// only ever observe a slot after its sequence has been published, so the
/// `UnsafeCell` access here never races.
struct Slot<T>(UnsafeCell<Option<T>>);

// The ring hands slots between threads under sequence-counter discipline,
// not interior mutation without synchronization.
unsafe impl<T: Send> Sync for Slot<T> {}

/// Bounded, lock-free, single-producer ring buffer with a configurable
/// number of independent consumers (single-producer/multi-consumer, per
/// the component design).
pub struct RingBuffer<T> {
    buffer: Box<[Slot<T>]>,
    mask: u64,
    capacity: u64,
    /// Next sequence the producer will claim.
    claim_cursor: PaddedSequence,
    /// Highest sequence published so far (count of published items).
    published_cursor: PaddedSequence,
    /// One cursor per consumer: next sequence that consumer will read.
    consumer_cursors: Vec<PaddedSequence>,
}

// Safety: access to slot contents is gated entirely by sequence counters
// with acquire/release ordering; no slot is read before its publish is
// observed, and no slot is reclaimed by the producer before every consumer
// cursor has passed it (see `min_consumer_sequence`).
unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    /// `capacity` must be a power of two. `num_consumers` is the number of
    /// independent downstream readers (siblings sharing the producer
    /// cursor as their upstream barrier).
    pub fn new(capacity: usize, num_consumers: usize) -> Self {
        assert!(capacity.is_power_of_two(), "ring capacity must be a power of two");
        assert!(capacity > 0);
        assert!(num_consumers > 0, "a ring buffer needs at least one consumer");

        let buffer = (0..capacity)
            .map(|_| Slot(UnsafeCell::new(None)))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let consumer_cursors = (0..num_consumers).map(|_| PaddedSequence::new(0)).collect();

        Self {
            buffer,
            mask: capacity as u64 - 1,
            capacity: capacity as u64,
            claim_cursor: PaddedSequence::new(0),
            published_cursor: PaddedSequence::new(0),
            consumer_cursors,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    fn min_consumer_sequence(&self) -> u64 {
        self.consumer_cursors
            .iter()
            .map(|c| c.load(Ordering::Acquire))
            .min()
            .unwrap_or(0)
    }

    /// Fraction of the ring currently occupied by unread slots, for
    /// monitoring (§4.1 capacity/utilization).
    pub fn utilization(&self) -> f64 {
        let produced = self.published_cursor.load(Ordering::Acquire);
        let consumed = self.min_consumer_sequence();
        (produced - consumed) as f64 / self.capacity as f64
    }

    pub fn remaining_capacity(&self) -> u64 {
        let produced = self.claim_cursor.load(Ordering::Acquire);
        let consumed = self.min_consumer_sequence();
        self.capacity - (produced - consumed)
    }

    /// Claim the next sequence for the (single) producer, blocking via
    /// `wait` while the ring would overtake its slowest consumer. Returns
    /// `None` if `running` flips to `false` while waiting — cooperative
    /// shutdown, per the concurrency model.
    pub fn claim(&self, wait: &dyn WaitStrategy, running: &AtomicBool) -> Option<u64> {
        let seq = self.claim_cursor.load(Ordering::Relaxed);
        let mut attempt = 0u64;
        loop {
            if seq - self.min_consumer_sequence() < self.capacity {
                break;
            }
            if !running.load(Ordering::Acquire) {
                return None;
            }
            wait.wait(attempt);
            attempt += 1;
        }
        self.claim_cursor.store(seq + 1, Ordering::Relaxed);
        Some(seq)
    }

    /// Write `item` into the slot claimed at `seq`. Must be called exactly
    /// once between `claim` and `publish` for that sequence, by the
    /// producer thread only.
    pub fn write(&self, seq: u64, item: T) {
        let idx = (seq & self.mask) as usize;
        unsafe {
            *self.buffer[idx].0.get() = Some(item);
        }
    }

    /// Release the slot at `seq` to consumers with a release-ordered store
    /// to the producer cursor. Sequences must be published in order.
    pub fn publish(&self, seq: u64) {
        self.published_cursor.store(seq + 1, Ordering::Release);
    }

    /// Claim, write and publish a single item in one call — the common
    /// case for producers that don't need the raw claim/write/publish
    /// split.
    pub fn publish_item(&self, item: T, wait: &dyn WaitStrategy, running: &AtomicBool) -> Option<u64> {
        let seq = self.claim(wait, running)?;
        self.write(seq, item);
        self.publish(seq);
        Some(seq)
    }

    /// Consume the next published item for `consumer_id`, if any, without
    /// blocking. Returns the item's sequence and a clone of its contents
    /// (consumers must be able to own their view since several consumers
    /// read the same slot independently).
    pub fn try_consume(&self, consumer_id: usize) -> Option<(u64, T)>
    where
        T: Clone,
    {
        let cursor = &self.consumer_cursors[consumer_id];
        let seq = cursor.load(Ordering::Relaxed);
        if seq >= self.published_cursor.load(Ordering::Acquire) {
            return None;
        }
        let idx = (seq & self.mask) as usize;
        let item = unsafe { (*self.buffer[idx].0.get()).clone() }?;
        cursor.store(seq + 1, Ordering::Release);
        Some((seq, item))
    }

    /// Block (per `wait`) until the next item is available for
    /// `consumer_id`, or return `None` on cooperative shutdown.
    pub fn consume_next(&self, consumer_id: usize, wait: &dyn WaitStrategy, running: &AtomicBool) -> Option<(u64, T)>
    where
        T: Clone,
    {
        let mut attempt = 0u64;
        loop {
            if let Some(result) = self.try_consume(consumer_id) {
                return Some(result);
            }
            if !running.load(Ordering::Acquire) {
                // Drain whatever is left before exiting: one last check.
                return self.try_consume(consumer_id);
            }
            wait.wait(attempt);
            attempt += 1;
        }
    }

    pub fn consumer_sequence(&self, consumer_id: usize) -> u64 {
        self.consumer_cursors[consumer_id].load(Ordering::Acquire)
    }

    pub fn published_sequence(&self) -> u64 {
        self.published_cursor.load(Ordering::Acquire)
    }
}
