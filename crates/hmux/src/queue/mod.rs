// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message queue family.
//!
//! Four variants share one contract ([`MessageQueue`]):
//!
//! | Variant | Module | Use case |
//! |---------|--------|----------|
//! | FIFO | [`fifo`] | Default service inbox, strict arrival order |
//! | Priority | [`priority`] | Control traffic ahead of bulk traffic |
//! | SPSC ring | [`spsc`] | One producer, one consumer, no locks |
//! | MPMC ring | [`mpmc`] | Many producers/consumers, bounded, lock-free |
//!
//! # Contract
//!
//! - `push` transfers ownership into the queue. Bounded variants block
//!   while full. A shut-down queue drops the message (with a warning) so
//!   `shutdown` stays prompt.
//! - `pop` blocks until a message arrives or the queue is shut down *and*
//!   empty; `try_pop` never blocks; `wait_and_pop` gives up after a
//!   timeout.
//! - `shutdown` is one-way and wakes every blocked thread within a
//!   bounded time. The predicate re-checks the flag on every wake; no
//!   single notification is relied upon.
//! - No message is ever observed by two consumers, and (absent early
//!   shutdown) the multiset of popped messages equals the multiset of
//!   pushed messages.

pub mod fifo;
pub mod mpmc;
pub mod priority;
pub mod spsc;

pub use fifo::FifoQueue;
pub use mpmc::MpmcRingQueue;
pub use priority::PriorityQueue;
pub use spsc::SpscRingQueue;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_QUEUE_CAPACITY;
use crate::message::Message;

/// Shared contract of the four queue variants.
///
/// All operations take `&self`; implementations synchronize internally.
pub trait MessageQueue: Send + Sync {
    /// Transfer a message into the queue.
    ///
    /// Blocks while a bounded queue is full. If the queue is shut down
    /// (before or during the wait) the message is dropped.
    fn push(&self, msg: Box<dyn Message>);

    /// Remove the next message, blocking until one is available.
    ///
    /// Returns `None` once the queue is shut down and drained.
    fn pop(&self) -> Option<Box<dyn Message>>;

    /// Remove the next message without blocking.
    fn try_pop(&self) -> Option<Box<dyn Message>>;

    /// As [`pop`](Self::pop), but gives up after `timeout`.
    fn wait_and_pop(&self, timeout: Duration) -> Option<Box<dyn Message>>;

    /// Number of queued messages.
    fn len(&self) -> usize;

    /// Whether the queue is currently empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every queued message.
    fn clear(&self);

    /// Shut the queue down: wake all blocked threads, drop future pushes.
    ///
    /// One-way; there is no restart.
    fn shutdown(&self);

    /// Whether [`shutdown`](Self::shutdown) has been called.
    fn is_shutdown(&self) -> bool;
}

/// Selects the queue variant backing a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    /// Single-mutex FIFO, the default. `capacity` 0 = unbounded.
    Fifo,
    /// Max-heap by message priority, FIFO within equal priority.
    Priority,
    /// Lock-free ring, strictly single-producer/single-consumer.
    Spsc,
    /// Lock-free bounded ring, any number of producers/consumers.
    Mpmc,
}

impl Default for QueueKind {
    fn default() -> Self {
        QueueKind::Fifo
    }
}

/// Construct a queue of the requested kind.
///
/// `capacity` 0 means unbounded for the mutex-based variants. The ring
/// variants require a bound; 0 is replaced by
/// [`DEFAULT_QUEUE_CAPACITY`] with a warning.
#[must_use]
pub fn create_queue(kind: QueueKind, capacity: usize) -> Arc<dyn MessageQueue> {
    match kind {
        QueueKind::Fifo => Arc::new(FifoQueue::new(capacity)),
        QueueKind::Priority => Arc::new(PriorityQueue::new(capacity)),
        QueueKind::Spsc => Arc::new(SpscRingQueue::new(ring_capacity(kind, capacity))),
        QueueKind::Mpmc => Arc::new(MpmcRingQueue::new(ring_capacity(kind, capacity))),
    }
}

fn ring_capacity(kind: QueueKind, capacity: usize) -> usize {
    if capacity == 0 {
        log::warn!(
            "{:?} queue requires a bound, using default capacity {}",
            kind,
            DEFAULT_QUEUE_CAPACITY
        );
        DEFAULT_QUEUE_CAPACITY
    } else {
        capacity
    }
}
