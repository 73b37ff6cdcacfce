// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service runtime behavior across its lifecycle.

mod common;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hmux::{Error, RawMessage, Result, Service, ServiceListener};

use common::ValueMessage;

#[test]
fn stop_is_idempotent_and_post_after_stop_fails() {
    common::init_logs();
    let service = Service::new("lifecycle");
    service.init().unwrap();
    service.start().unwrap();
    assert!(service.is_running());

    service.stop().unwrap();
    service.stop().unwrap();
    service.stop().unwrap();

    let err = service.post(Box::new(ValueMessage::new(1))).unwrap_err();
    assert!(matches!(err, Error::ServiceNotStarted));
}

#[test]
fn handler_runs_exactly_once_per_matching_message() {
    let service = Service::new("exact-once");
    let matched = Arc::new(AtomicUsize::new(0));

    let m = Arc::clone(&matched);
    service
        .register_handler::<ValueMessage, _>(move |_| {
            m.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    service.init().unwrap();
    service.start().unwrap();

    for i in 0..50 {
        service.post(Box::new(ValueMessage::new(i))).unwrap();
        // Interleave non-matching traffic; nobody handles (3, 3).
        service.post(Box::new(RawMessage::new(3, 3))).unwrap();
    }

    let start = Instant::now();
    while service.metrics().snapshot().messages_processed < 100 {
        assert!(start.elapsed() < Duration::from_secs(5), "worker stalled");
        std::thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(matched.load(Ordering::SeqCst), 50);
    assert_eq!(service.metrics().snapshot().messages_unhandled, 50);

    service.stop().unwrap();
}

#[test]
fn unhandled_message_does_not_stop_the_service() {
    // Post a message nobody handles, then register a handler and verify
    // the service keeps delivering.
    let service = Service::new("mismatch");
    service.init().unwrap();
    service.start().unwrap();

    service.post(Box::new(RawMessage::new(7, 3))).unwrap();

    let start = Instant::now();
    while service.metrics().snapshot().messages_unhandled == 0 {
        assert!(start.elapsed() < Duration::from_secs(2));
        std::thread::sleep(Duration::from_millis(5));
    }

    let got = Arc::new(AtomicUsize::new(0));
    let g = Arc::clone(&got);
    service
        .register_handler::<ValueMessage, _>(move |_| {
            g.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    service.post(Box::new(ValueMessage::new(5))).unwrap();
    let start = Instant::now();
    while got.load(Ordering::SeqCst) == 0 {
        assert!(start.elapsed() < Duration::from_secs(2), "handler never saw message");
        std::thread::sleep(Duration::from_millis(5));
    }

    service.stop().unwrap();
}

#[test]
fn update_tick_runs_with_positive_elapsed_while_idle() {
    struct TickProbe {
        ticks: Arc<AtomicUsize>,
        min_elapsed: Arc<AtomicU64>,
    }

    impl ServiceListener for TickProbe {
        fn on_update(&self, service: &Service, elapsed_ms: u64) -> Result<()> {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            self.min_elapsed.fetch_min(elapsed_ms, Ordering::SeqCst);
            service.update_modules(elapsed_ms);
            Ok(())
        }
    }

    let ticks = Arc::new(AtomicUsize::new(0));
    let min_elapsed = Arc::new(AtomicU64::new(u64::MAX));
    let service = Service::builder("updates")
        .listener(TickProbe { ticks: Arc::clone(&ticks), min_elapsed: Arc::clone(&min_elapsed) })
        .build();

    service.init().unwrap();
    service.start().unwrap();

    std::thread::sleep(Duration::from_secs(1));
    service.stop().unwrap();

    let observed = ticks.load(Ordering::SeqCst);
    // With a 100 ms idle wake the tick runs well more than once per second.
    assert!(observed >= 5, "only {observed} update ticks in 1 s");
    assert!(min_elapsed.load(Ordering::SeqCst) > 0, "elapsed must be positive");
}

#[test]
fn wait_returns_after_a_handler_initiated_stop() {
    let service = Service::new("self-stop");
    let service_ref = service.downgrade();

    service
        .register_handler::<ValueMessage, _>(move |_| {
            if let Ok(service) = service_ref.service() {
                let _ = service.stop();
            }
        })
        .unwrap();

    service.init().unwrap();
    service.start().unwrap();
    service.post(Box::new(ValueMessage::new(0))).unwrap();

    service.wait();
    assert!(!service.is_running());
    // The worker has really exited; a second wait is a no-op.
    service.wait();
}

#[test]
fn on_start_failure_leaves_service_stopped() {
    struct FailingStart;

    impl ServiceListener for FailingStart {
        fn on_start(&self, _service: &Service) -> Result<()> {
            Err(Error::Service("refusing to start".into()))
        }
    }

    let service = Service::builder("failing").listener(FailingStart).build();
    service.init().unwrap();

    assert!(service.start().is_err());
    assert!(!service.is_running());
    assert!(matches!(
        service.post(Box::new(ValueMessage::new(1))),
        Err(Error::ServiceNotStarted)
    ));
}
