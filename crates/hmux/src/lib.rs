// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # hmux - message-dispatch runtime for server daemons
//!
//! A runtime for long-running services (game backends, gateways, match
//! servers) built from pluggable modules that communicate through typed
//! messages. Each service multiplexes its inbound message stream onto a
//! single worker thread, dispatches into a typed handler table, and
//! drives periodic update ticks; a process-wide timer scheduler fires
//! one-shot and repeating callbacks.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hmux::{Service, RawMessage, Result};
//!
//! fn main() -> Result<()> {
//!     let service = Service::builder("gateway").queue_capacity(10_000).build();
//!
//!     service.register_raw_handler(1, 1, |msg| {
//!         println!("got message from session {}", msg.session_id());
//!     })?;
//!
//!     service.init()?;
//!     service.start()?;
//!
//!     service.post(Box::new(RawMessage::new(1, 1)))?;
//!
//!     service.stop()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                        Application Layer                           |
//! |        Modules (register handlers, post messages, update)         |
//! +--------------------------------------------------------------------+
//! |                         Service Runtime                            |
//! |   worker thread | handler table | module registry | lifecycle     |
//! +--------------------------------------------------------------------+
//! |            Message Queues            |       Timer Scheduler       |
//! |   FIFO | priority | SPSC | MPMC      |  min-heap, groups, 1 thread |
//! +--------------------------------------------------------------------+
//! |                       Session Contract                             |
//! |        7-byte wire frame | Session/SessionListener traits          |
//! +--------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Service`] | Owns a queue, a worker thread, handlers, and modules |
//! | [`Message`] | Typed envelope: (category, id), session, timestamp |
//! | [`MessageQueue`] | Shared contract of the four queue variants |
//! | [`Module`] | Pluggable unit registered into a service |
//! | [`TimerScheduler`] | Process-wide one-shot/repeating callbacks |
//! | [`FrameDecoder`] | Incremental decoder for the wire framing |
//!
//! ## Threading model
//!
//! Plain OS threads, no async runtime. One worker thread per service,
//! one for the timer scheduler, I/O threads owned by transports. Within
//! a service, handlers run strictly one at a time; cross-thread work is
//! done by posting messages, never by sharing handler state.

/// Runtime configuration (defaults, service/transport tuning).
pub mod config;
/// Error type and crate-wide `Result`.
pub mod error;
/// Typed message envelope, tags, and the factory registry.
pub mod message;
/// Pluggable service modules and hot-swap support.
pub mod module;
/// The four message queue variants behind one trait.
pub mod queue;
/// Service runtime: worker loop, handler table, module registry.
pub mod service;
/// Session contract and wire framing for transports.
pub mod session;
/// Timer scheduler (process-wide instance plus embeddable instances).
pub mod timer;

pub use config::{NetConfig, ServiceConfig};
pub use error::{Error, Result};
pub use message::{
    create_message, handler_key, register_message, Category, HandlerKey, Message, MessageId,
    MessageMeta, MessageTag, RawMessage,
};
pub use module::{install_module, Module, ServiceRef};
pub use queue::{
    create_queue, FifoQueue, MessageQueue, MpmcRingQueue, PriorityQueue, QueueKind, SpscRingQueue,
};
pub use service::{
    DefaultServiceListener, Service, ServiceBuilder, ServiceListener, ServiceMetrics,
    ServiceMetricsSnapshot,
};
pub use session::{
    encode_frame, FrameDecoder, FrameHeader, Session, SessionId, SessionListener, SessionState,
    FRAME_HEADER_SIZE,
};
pub use timer::{TimerGroupId, TimerId, TimerScheduler};

/// hmux version string.
pub const VERSION: &str = "0.2.0";
