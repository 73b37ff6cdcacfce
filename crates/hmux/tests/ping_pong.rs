// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end: a heartbeat module, a timer-driven ping, and a
//! handler-initiated shutdown.
//!
//! Runs the deployment shape (one ping per 5 s observed over 20 s) at
//! 25x speed: one ping per 200 ms observed over 2 s, preserving the
//! ratios the assertions check.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hmux::{
    install_module, Message, MessageMeta, MessageTag, Module, Result, Service, ServiceRef,
    TimerScheduler,
};

macro_rules! control_message {
    ($name:ident, $category:expr, $id:expr) => {
        #[derive(Debug, Clone)]
        struct $name {
            meta: MessageMeta,
        }

        impl Default for $name {
            fn default() -> Self {
                Self { meta: MessageMeta::new(Self::CATEGORY, Self::ID) }
            }
        }

        impl Message for $name {
            fn meta(&self) -> &MessageMeta {
                &self.meta
            }
            fn meta_mut(&mut self) -> &mut MessageMeta {
                &mut self.meta
            }
            fn name(&self) -> &str {
                stringify!($name)
            }
            fn clone_message(&self) -> Box<dyn Message> {
                Box::new(self.clone())
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }

        impl MessageTag for $name {
            const CATEGORY: u8 = $category;
            const ID: u16 = $id;
        }
    };
}

control_message!(Ping, 1, 1);
control_message!(Pong, 1, 2);
control_message!(Shutdown, 1, 3);

struct Heartbeat {
    service: ServiceRef,
    pings: Arc<AtomicUsize>,
    pongs: Arc<AtomicUsize>,
}

impl Module for Heartbeat {
    fn name(&self) -> &str {
        "heartbeat"
    }

    fn init(&self) -> Result<()> {
        let pings = Arc::clone(&self.pings);
        let pong_sender = self.service.clone();
        self.service.register_handler::<Ping, _>(move |_ping| {
            pings.fetch_add(1, Ordering::SeqCst);
            let _ = pong_sender.post(Box::new(Pong::default()));
        })?;

        let pongs = Arc::clone(&self.pongs);
        self.service.register_handler::<Pong, _>(move |_pong| {
            pongs.fetch_add(1, Ordering::SeqCst);
        })?;

        let stopper = self.service.clone();
        self.service.register_handler::<Shutdown, _>(move |_| {
            if let Ok(service) = stopper.service() {
                let _ = service.stop();
            }
        })?;

        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn ping_pong_heartbeat_then_shutdown() {
    let pings = Arc::new(AtomicUsize::new(0));
    let pongs = Arc::new(AtomicUsize::new(0));

    let service = Service::new("game");
    install_module(&service, |service_ref| Heartbeat {
        service: service_ref,
        pings: Arc::clone(&pings),
        pongs: Arc::clone(&pongs),
    })
    .unwrap();

    service.init().unwrap();
    service.start().unwrap();

    // A dedicated scheduler posts the pings, as a transport-side timer
    // would.
    let scheduler = TimerScheduler::new();
    let pinger = service.downgrade();
    let timer_id = scheduler.create_repeat(200, 200, move || {
        if let Ok(service) = pinger.service() {
            let _ = service.post(Box::new(Ping::default()));
        }
    });

    std::thread::sleep(Duration::from_millis(2_000));
    scheduler.cancel(timer_id);
    // Let in-flight messages drain before reading the counters.
    std::thread::sleep(Duration::from_millis(100));

    let observed_pings = pings.load(Ordering::SeqCst);
    let observed_pongs = pongs.load(Ordering::SeqCst);
    // ~10 expected at this cadence; allow scheduler jitter on both ends.
    assert!(
        (6..=12).contains(&observed_pings),
        "unexpected ping count: {observed_pings}"
    );
    let diff = observed_pings.abs_diff(observed_pongs);
    assert!(diff <= 1, "pings {observed_pings} vs pongs {observed_pongs}");

    // Shutdown message -> handler calls stop() -> wait() returns.
    service.post(Box::new(Shutdown::default())).unwrap();
    let start = Instant::now();
    service.wait();
    assert!(start.elapsed() < Duration::from_secs(2), "wait() hung");
    assert!(!service.is_running());

    scheduler.shutdown();
}
