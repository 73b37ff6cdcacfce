// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Default FIFO message queue.
//!
//! One mutex, two condition variables (`not_empty`, `not_full`). Simple
//! and predictable: strict arrival order for a single producer, total
//! (lock-acquisition) order for concurrent producers.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::message::Message;

use super::MessageQueue;

struct Inner {
    queue: VecDeque<Box<dyn Message>>,
    shutdown: bool,
}

/// Bounded or unbounded FIFO queue guarded by a single mutex.
pub struct FifoQueue {
    inner: Mutex<Inner>,
    not_empty: Condvar,
    not_full: Condvar,
    /// 0 = unbounded.
    max_size: usize,
}

impl FifoQueue {
    /// Create a queue; `max_size` 0 means unbounded.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner { queue: VecDeque::new(), shutdown: false }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            max_size,
        }
    }

    fn bounded(&self) -> bool {
        self.max_size > 0
    }
}

impl MessageQueue for FifoQueue {
    fn push(&self, msg: Box<dyn Message>) {
        let mut inner = self.inner.lock();

        if inner.shutdown {
            log::warn!("message dropped: push to shut-down queue");
            return;
        }

        if self.bounded() && inner.queue.len() >= self.max_size {
            log::warn!("message queue full, waiting for space");
            while inner.queue.len() >= self.max_size && !inner.shutdown {
                self.not_full.wait(&mut inner);
            }
            // Re-check after waking: shutdown during the wait drops the
            // message so stop() stays prompt.
            if inner.shutdown {
                log::warn!("message dropped: queue shut down while waiting to push");
                return;
            }
        }

        inner.queue.push_back(msg);
        drop(inner);
        self.not_empty.notify_one();
    }

    fn pop(&self) -> Option<Box<dyn Message>> {
        let mut inner = self.inner.lock();

        while inner.queue.is_empty() && !inner.shutdown {
            self.not_empty.wait(&mut inner);
        }

        let msg = inner.queue.pop_front()?;
        drop(inner);
        if self.bounded() {
            self.not_full.notify_one();
        }
        Some(msg)
    }

    fn try_pop(&self) -> Option<Box<dyn Message>> {
        let mut inner = self.inner.lock();
        let msg = inner.queue.pop_front()?;
        drop(inner);
        if self.bounded() {
            self.not_full.notify_one();
        }
        Some(msg)
    }

    fn wait_and_pop(&self, timeout: Duration) -> Option<Box<dyn Message>> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();

        while inner.queue.is_empty() && !inner.shutdown {
            if self.not_empty.wait_until(&mut inner, deadline).timed_out() {
                break;
            }
        }

        let msg = inner.queue.pop_front()?;
        drop(inner);
        if self.bounded() {
            self.not_full.notify_one();
        }
        Some(msg)
    }

    fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.queue.clear();
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
