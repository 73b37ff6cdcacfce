// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Contract tests run against every queue variant.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hmux::{create_queue, Message, MessageQueue, QueueKind};

use common::ValueMessage;

const ALL_KINDS: [QueueKind; 4] =
    [QueueKind::Fifo, QueueKind::Priority, QueueKind::Spsc, QueueKind::Mpmc];

fn msg(value: u32) -> Box<dyn Message> {
    Box::new(ValueMessage::new(value))
}

fn value_of(msg: &dyn Message) -> u32 {
    msg.as_any().downcast_ref::<ValueMessage>().unwrap().value
}

#[test]
fn popped_multiset_equals_pushed_multiset() {
    const PRODUCERS: usize = 2;
    const CONSUMERS: usize = 2;
    const PER_PRODUCER: u32 = 2_000;

    for kind in ALL_KINDS {
        // SPSC is specified for one producer/one consumer only.
        let (producers, consumers) = match kind {
            QueueKind::Spsc => (1, 1),
            _ => (PRODUCERS, CONSUMERS),
        };
        let total = producers as u32 * PER_PRODUCER;

        let queue = create_queue(kind, 256);
        let seen = Arc::new((0..total).map(|_| AtomicUsize::new(0)).collect::<Vec<_>>());
        let popped = Arc::new(AtomicUsize::new(0));

        crossbeam::thread::scope(|scope| {
            for p in 0..producers {
                let queue = Arc::clone(&queue);
                scope.spawn(move |_| {
                    for i in 0..PER_PRODUCER {
                        queue.push(msg(p as u32 * PER_PRODUCER + i));
                    }
                });
            }
            for _ in 0..consumers {
                let queue = Arc::clone(&queue);
                let seen = Arc::clone(&seen);
                let popped = Arc::clone(&popped);
                scope.spawn(move |_| loop {
                    if let Some(m) = queue.wait_and_pop(Duration::from_millis(20)) {
                        seen[value_of(m.as_ref()) as usize].fetch_add(1, Ordering::Relaxed);
                        popped.fetch_add(1, Ordering::Relaxed);
                    } else if popped.load(Ordering::Relaxed) as u32 >= total {
                        break;
                    }
                });
            }
        })
        .unwrap();

        for (value, count) in seen.iter().enumerate() {
            assert_eq!(
                count.load(Ordering::Relaxed),
                1,
                "{kind:?}: value {value} popped wrong number of times"
            );
        }
    }
}

#[test]
fn fifo_kinds_preserve_single_producer_order() {
    for kind in [QueueKind::Fifo, QueueKind::Spsc, QueueKind::Mpmc] {
        let queue = create_queue(kind, 1024);
        for i in 0..500 {
            queue.push(msg(i));
        }
        for i in 0..500 {
            assert_eq!(value_of(queue.pop().unwrap().as_ref()), i, "{kind:?} reordered");
        }
    }
}

#[test]
fn blocked_pop_wakes_within_bound_after_shutdown() {
    for kind in ALL_KINDS {
        let queue = create_queue(kind, 64);
        let queue2 = Arc::clone(&queue);

        let consumer = std::thread::spawn(move || queue2.pop());

        std::thread::sleep(Duration::from_millis(30));
        let start = Instant::now();
        queue.shutdown();
        assert!(consumer.join().unwrap().is_none(), "{kind:?}: pop returned a message");
        assert!(
            start.elapsed() < Duration::from_millis(10),
            "{kind:?}: shutdown wake took {:?}",
            start.elapsed()
        );
    }
}

#[test]
fn wait_and_pop_timeout_window() {
    for kind in ALL_KINDS {
        let queue = create_queue(kind, 64);
        let timeout = Duration::from_millis(60);

        let start = Instant::now();
        assert!(queue.wait_and_pop(timeout).is_none());
        let elapsed = start.elapsed();

        assert!(elapsed >= timeout, "{kind:?}: woke early after {elapsed:?}");
        assert!(
            elapsed < timeout + Duration::from_millis(50),
            "{kind:?}: overslept: {elapsed:?}"
        );
    }
}

#[test]
fn shutdown_during_blocked_push_drops_the_message() {
    for kind in ALL_KINDS {
        let queue = create_queue(kind, 1);
        queue.push(msg(1));

        let queue2 = Arc::clone(&queue);
        let producer = std::thread::spawn(move || queue2.push(msg(2)));

        std::thread::sleep(Duration::from_millis(30));
        queue.shutdown();
        producer.join().unwrap();

        assert_eq!(value_of(queue.pop().unwrap().as_ref()), 1, "{kind:?}");
        assert!(queue.pop().is_none(), "{kind:?}: dropped message was delivered");
    }
}

/// Backpressure: capacity 8, consumer pops every 10 ms, 100 pushes.
/// The producer can only run ~8 ahead of the consumer, so the pushes
/// take at least (100 - 8) * 10 ms.
#[test]
fn bounded_queue_applies_backpressure() {
    common::init_logs();
    let queue = create_queue(QueueKind::Fifo, 8);
    let consumed = Arc::new(AtomicUsize::new(0));

    crossbeam::thread::scope(|scope| {
        let consumer_queue = Arc::clone(&queue);
        let consumer_count = Arc::clone(&consumed);
        scope.spawn(move |_| {
            while consumer_count.load(Ordering::Relaxed) < 100 {
                if consumer_queue.wait_and_pop(Duration::from_millis(100)).is_some() {
                    consumer_count.fetch_add(1, Ordering::Relaxed);
                    std::thread::sleep(Duration::from_millis(10));
                }
            }
        });

        let start = Instant::now();
        for i in 0..100 {
            queue.push(msg(i));
        }
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(900),
            "pushes outran the consumer: {elapsed:?}"
        );
    })
    .unwrap();

    assert_eq!(consumed.load(Ordering::Relaxed), 100);
}
