// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Priority message queue.
//!
//! Same blocking/shutdown semantics as [`fifo`](super::fifo), but pops
//! return the highest-priority message first. The default priority is the
//! message category; a custom priority function can be supplied.
//!
//! Ties are broken by insertion order (FIFO within equal priority), via a
//! monotonically increasing sequence number attached on push.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::message::Message;

use super::MessageQueue;

/// Computes the priority of a message; larger values pop first.
pub type PriorityFn = dyn Fn(&dyn Message) -> i32 + Send + Sync;

struct Entry {
    priority: i32,
    /// Insertion sequence; earlier entries win ties.
    seq: u64,
    msg: Box<dyn Message>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap on priority; within a priority the *lower* sequence
        // number must compare greater so the earliest insertion pops first.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Inner {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
    shutdown: bool,
}

/// Bounded or unbounded priority queue guarded by a single mutex.
pub struct PriorityQueue {
    inner: Mutex<Inner>,
    not_empty: Condvar,
    not_full: Condvar,
    /// 0 = unbounded.
    max_size: usize,
    priority_fn: Box<PriorityFn>,
}

impl PriorityQueue {
    /// Create a queue using the default priority (message category).
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self::with_priority_fn(max_size, |msg| i32::from(msg.category()))
    }

    /// Create a queue with a custom priority function.
    #[must_use]
    pub fn with_priority_fn<F>(max_size: usize, priority_fn: F) -> Self
    where
        F: Fn(&dyn Message) -> i32 + Send + Sync + 'static,
    {
        Self {
            inner: Mutex::new(Inner { heap: BinaryHeap::new(), next_seq: 0, shutdown: false }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            max_size,
            priority_fn: Box::new(priority_fn),
        }
    }

    fn bounded(&self) -> bool {
        self.max_size > 0
    }

    fn pop_entry(inner: &mut Inner) -> Option<Box<dyn Message>> {
        inner.heap.pop().map(|e| e.msg)
    }
}

impl MessageQueue for PriorityQueue {
    fn push(&self, msg: Box<dyn Message>) {
        let priority = (self.priority_fn)(msg.as_ref());
        let mut inner = self.inner.lock();

        if inner.shutdown {
            log::warn!("message dropped: push to shut-down priority queue");
            return;
        }

        if self.bounded() && inner.heap.len() >= self.max_size {
            log::warn!("priority queue full, waiting for space");
            while inner.heap.len() >= self.max_size && !inner.shutdown {
                self.not_full.wait(&mut inner);
            }
            if inner.shutdown {
                log::warn!("message dropped: priority queue shut down while waiting to push");
                return;
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.heap.push(Entry { priority, seq, msg });
        drop(inner);
        self.not_empty.notify_one();
    }

    fn pop(&self) -> Option<Box<dyn Message>> {
        let mut inner = self.inner.lock();

        while inner.heap.is_empty() && !inner.shutdown {
            self.not_empty.wait(&mut inner);
        }

        let msg = Self::pop_entry(&mut inner)?;
        drop(inner);
        if self.bounded() {
            self.not_full.notify_one();
        }
        Some(msg)
    }

    fn try_pop(&self) -> Option<Box<dyn Message>> {
        let mut inner = self.inner.lock();
        let msg = Self::pop_entry(&mut inner)?;
        drop(inner);
        if self.bounded() {
            self.not_full.notify_one();
        }
        Some(msg)
    }

    fn wait_and_pop(&self, timeout: Duration) -> Option<Box<dyn Message>> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();

        while inner.heap.is_empty() && !inner.shutdown {
            if self.not_empty.wait_until(&mut inner, deadline).timed_out() {
                break;
            }
        }

        let msg = Self::pop_entry(&mut inner)?;
        drop(inner);
        if self.bounded() {
            self.not_full.notify_one();
        }
        Some(msg)
    }

    fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.heap.clear();
        drop(inner);
        if self.bounded() {
            self.not_full.notify_all();
        }
    }

    fn shutdown(&self) {
        let mut inner = self.inner.lock();
        inner.shutdown = true;
        drop(inner);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    fn is_shutdown(&self) -> bool {
        self.inner.lock().shutdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RawMessage;

    fn msg(category: u8, id: u16) -> Box<dyn Message> {
        Box::new(RawMessage::new(category, id))
    }

    #[test]
    fn pops_highest_category_first() {
        let q = PriorityQueue::new(0);
        q.push(msg(1, 10));
        q.push(msg(5, 11));
        q.push(msg(3, 12));

        assert_eq!(q.pop().unwrap().category(), 5);
        assert_eq!(q.pop().unwrap().category(), 3);
        assert_eq!(q.pop().unwrap().category(), 1);
    }

    #[test]
    fn popped_priorities_are_non_increasing() {
        let q = PriorityQueue::new(0);
        for (c, i) in [(2u8, 0u16), (9, 1), (4, 2), (9, 3), (1, 4), (7, 5)] {
            q.push(msg(c, i));
        }

        let mut last = i32::MAX;
        while let Some(m) = q.try_pop() {
            let p = i32::from(m.category());
            assert!(p <= last, "priority increased: {p} after {last}");
            last = p;
        }
    }

    #[test]
    fn equal_priority_is_fifo() {
        let q = PriorityQueue::new(0);
        for id in 0..10 {
            q.push(msg(3, id));
        }
        for id in 0..10 {
            assert_eq!(q.pop().unwrap().id(), id);
        }
    }

    #[test]
    fn custom_priority_function_wins() {
        // Invert: lower category pops first.
        let q = PriorityQueue::with_priority_fn(0, |m| -i32::from(m.category()));
        q.push(msg(5, 0));
        q.push(msg(1, 1));

        assert_eq!(q.pop().unwrap().category(), 1);
        assert_eq!(q.pop().unwrap().category(), 5);
    }

    #[test]
    fn shutdown_semantics_match_fifo() {
        let q = PriorityQueue::new(0);
        q.push(msg(1, 1));
        q.shutdown();

        q.push(msg(2, 2)); // dropped
        assert_eq!(q.len(), 1);
        assert!(q.pop().is_some());
        assert!(q.pop().is_none());
    }
}
