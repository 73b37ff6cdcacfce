// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single-producer/single-consumer lock-free ring.
//!
//! A bounded ring of `capacity + 1` pointer slots; one slot always stays
//! empty to distinguish full from empty. The producer publishes `tail`
//! with Release after writing the slot; the consumer claims `head` with a
//! CAS before taking the slot.
//!
//! # Strictly SPSC
//!
//! The head CAS makes concurrent consumers *not crash*, but the variant
//! is only specified for one producer and one consumer; under contention
//! `try_pop` may fail spuriously and `size` is approximate. Callers that
//! need multiple producers or consumers should use
//! [`MpmcRingQueue`](super::MpmcRingQueue) instead.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::message::Message;

use super::MessageQueue;

/// A boxed message as stored in a ring slot.
///
/// `Box<dyn Message>` is a fat pointer, so slots hold a thin pointer to a
/// heap cell containing the box.
type Slot = Box<dyn Message>;

/// Lock-free SPSC ring queue.
pub struct SpscRingQueue {
    /// `capacity + 1` slots; null = empty.
    slots: Box<[AtomicUsize]>,
    capacity: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
    shutdown: AtomicBool,
}

// SAFETY:
// - Slots hold raw pointers produced by Box::into_raw; ownership of each
//   pointed-to message is transferred into the queue on push and out of
//   it on the (single) successful pop, so no message is aliased.
// - head/tail/shutdown are atomics; the Release/Acquire pairs on
//   slot-write -> tail-publish and tail-read -> slot-read order the
//   payload with its publication.
unsafe impl Send for SpscRingQueue {}
unsafe impl Sync for SpscRingQueue {}

impl SpscRingQueue {
    /// Create a ring with room for `capacity` messages.
    ///
    /// `capacity` must be at least 1.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "SPSC ring capacity must be > 0");
        let mut slots = Vec::with_capacity(capacity + 1);
        for _ in 0..=capacity {
            slots.push(AtomicUsize::new(0));
        }
        Self {
            slots: slots.into_boxed_slice(),
            capacity,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Ring capacity in messages.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    fn wrap(&self, index: usize) -> usize {
        (index + 1) % (self.capacity + 1)
    }

    fn free_raw(raw: usize) {
        if raw != 0 {
            // SAFETY: non-zero slot values are pointers from Box::into_raw
            // that have not been reclaimed elsewhere (the claiming pop
            // nulls the slot before converting).
            drop(unsafe { Box::from_raw(raw as *mut Slot) });
        }
    }
}

impl MessageQueue for SpscRingQueue {
    fn push(&self, msg: Box<dyn Message>) {
        if self.is_shutdown() {
            log::warn!("message dropped: push to shut-down SPSC ring");
            return;
        }

        let raw = Box::into_raw(Box::new(msg)) as usize;

        let mut tail = self.tail.load(Ordering::Relaxed);
        let mut next = self.wrap(tail);

        while next == self.head.load(Ordering::Acquire) {
            // Ring full: spin-yield until the consumer frees a slot.
            if self.is_shutdown() {
                log::warn!("message dropped: SPSC ring shut down while waiting to push");
                Self::free_raw(raw);
                return;
            }
            thread::yield_now();
            tail = self.tail.load(Ordering::Relaxed);
            next = self.wrap(tail);
        }

        self.slots[tail].store(raw, Ordering::Release);
        self.tail.store(next, Ordering::Release);
    }

    fn pop(&self) -> Option<Box<dyn Message>> {
        loop {
            if let Some(msg) = self.try_pop() {
                return Some(msg);
            }
            if self.is_shutdown() && self.is_empty() {
                return None;
            }
            thread::yield_now();
        }
    }

    fn try_pop(&self) -> Option<Box<dyn Message>> {
        let head = self.head.load(Ordering::Relaxed);

        if head == self.tail.load(Ordering::Acquire) {
            return None;
        }

        let raw = self.slots[head].load(Ordering::Acquire);
        if raw == 0 {
            // Producer published tail but the slot write is not visible
            // yet (or a competing consumer already took it).
            return None;
        }

        let next = self.wrap(head);
        if self
            .head
            .compare_exchange(head, next, Ordering::Release, Ordering::Relaxed)
            .is_err()
        {
            // Lost a race with another consumer (unsupported usage);
            // callers treat this as a spurious empty and retry.
            return None;
        }

        self.slots[head].store(0, Ordering::Relaxed);
        // SAFETY: the successful CAS makes this thread the unique owner of
        // the slot's previous content; raw was produced by Box::into_raw
        // in push and the slot has been nulled, so it is reclaimed once.
        let boxed = unsafe { Box::from_raw(raw as *mut Slot) };
        Some(*boxed)
    }

    fn wait_and_pop(&self, timeout: Duration) -> Option<Box<dyn Message>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(msg) = self.try_pop() {
                return Some(msg);
            }
            if self.is_shutdown() && self.is_empty() {
                return None;
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::yield_now();
        }
    }

    fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        if tail >= head {
            tail - head
        } else {
            (self.capacity + 1) - (head - tail)
        }
    }

    fn clear(&self) {
        while self.try_pop().is_some() {}
    }

    fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

impl Drop for SpscRingQueue {
    fn drop(&mut self) {
        for slot in self.slots.iter() {
            Self::free_raw(slot.swap(0, Ordering::Relaxed));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RawMessage;
    use std::sync::Arc;

    fn msg(id: u16) -> Box<dyn Message> {
        Box::new(RawMessage::new(1, id))
    }

    #[test]
    fn push_pop_cycle() {
        let q = SpscRingQueue::new(8);
        for i in 0..8 {
            q.push(msg(i));
        }
        assert_eq!(q.len(), 8);
        for i in 0..8 {
            assert_eq!(q.try_pop().unwrap().id(), i);
        }
        assert!(q.try_pop().is_none());
    }

    #[test]
    fn wraps_around_the_ring() {
        let q = SpscRingQueue::new(4);
        for round in 0..5u16 {
            for i in 0..4 {
                q.push(msg(round * 4 + i));
            }
            for i in 0..4 {
                assert_eq!(q.try_pop().unwrap().id(), round * 4 + i);
            }
        }
    }

    #[test]
    fn producer_consumer_threads_transfer_everything() {
        let q = Arc::new(SpscRingQueue::new(64));
        let producer_q = Arc::clone(&q);

        let producer = std::thread::spawn(move || {
            for i in 0..10_000u16 {
                producer_q.push(msg(i % 1000));
            }
        });

        let mut received = 0usize;
        while received < 10_000 {
            if q.try_pop().is_some() {
                received += 1;
            } else {
                std::thread::yield_now();
            }
        }

        producer.join().unwrap();
        assert!(q.try_pop().is_none());
    }

    #[test]
    fn full_ring_blocks_push_until_pop() {
        let q = Arc::new(SpscRingQueue::new(2));
        q.push(msg(1));
        q.push(msg(2));

        let q2 = Arc::clone(&q);
        let producer = std::thread::spawn(move || q2.push(msg(3)));

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(q.len(), 2);

        assert_eq!(q.try_pop().unwrap().id(), 1);
        producer.join().unwrap();
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn shutdown_unblocks_waiting_push() {
        let q = Arc::new(SpscRingQueue::new(1));
        q.push(msg(1));

        let q2 = Arc::clone(&q);
        let producer = std::thread::spawn(move || q2.push(msg(2)));

        std::thread::sleep(Duration::from_millis(20));
        q.shutdown();
        producer.join().unwrap();

        assert_eq!(q.pop().unwrap().id(), 1);
        assert!(q.pop().is_none());
    }

    #[test]
    fn wait_and_pop_respects_timeout() {
        let q = SpscRingQueue::new(4);
        let start = Instant::now();
        assert!(q.wait_and_pop(Duration::from_millis(30)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn drop_frees_queued_messages() {
        let q = SpscRingQueue::new(8);
        q.push(msg(1));
        q.push(msg(2));
        drop(q);
    }
}
