// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MPMC ring stress: 4 producers x 4 consumers, exact-once delivery.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hmux::{Message, MpmcRingQueue, MessageQueue};

use common::ValueMessage;

fn run_stress(per_producer: u32) {
    const PRODUCERS: u32 = 4;
    const CONSUMERS: usize = 4;

    let total = (PRODUCERS * per_producer) as usize;
    let queue = Arc::new(MpmcRingQueue::new(1024));
    let popped = Arc::new(AtomicUsize::new(0));
    // One slot per value; exactly-once delivery means every slot ends at 1.
    let seen: Arc<Vec<AtomicUsize>> =
        Arc::new((0..total).map(|_| AtomicUsize::new(0)).collect());

    crossbeam::thread::scope(|scope| {
        for p in 0..PRODUCERS {
            let queue = Arc::clone(&queue);
            scope.spawn(move |_| {
                let base = p * per_producer;
                for i in 0..per_producer {
                    queue.push(Box::new(ValueMessage::new(base + i)) as Box<dyn Message>);
                }
            });
        }

        for _ in 0..CONSUMERS {
            let queue = Arc::clone(&queue);
            let popped = Arc::clone(&popped);
            let seen = Arc::clone(&seen);
            scope.spawn(move |_| loop {
                if let Some(msg) = queue.try_pop() {
                    let value = msg.as_any().downcast_ref::<ValueMessage>().unwrap().value;
                    seen[value as usize].fetch_add(1, Ordering::Relaxed);
                    popped.fetch_add(1, Ordering::Relaxed);
                } else if popped.load(Ordering::Relaxed) >= total {
                    break;
                } else {
                    std::thread::yield_now();
                }
            });
        }
    })
    .unwrap();

    assert_eq!(popped.load(Ordering::Relaxed), total);
    for (value, count) in seen.iter().enumerate() {
        let n = count.load(Ordering::Relaxed);
        assert_eq!(n, 1, "value {value} consumed {n} times");
    }
    assert!(queue.try_pop().is_none());
}

#[test]
fn four_by_four_consumes_every_value_once() {
    run_stress(25_000);
}

/// Full-size run from the acceptance checklist: the union of consumed
/// values is exactly [0, 1_000_000).
#[test]
#[ignore = "heavy: ~1M messages; run with --ignored"]
fn four_by_four_one_million() {
    run_stress(250_000);
}
