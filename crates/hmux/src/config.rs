// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime configuration - single source of truth for defaults.
//!
//! This module centralizes the tunable constants of the runtime. Services
//! and transports take their defaults from here; **never hardcode these
//! values elsewhere**.
//!
//! Two levels:
//!
//! - Compile-time constants for the values the runtime itself relies on
//!   (worker wake interval, frame header size).
//! - [`ServiceConfig`] / [`NetConfig`] structs for per-instance tuning,
//!   serde-enabled so deployments can load them from files.

use serde::{Deserialize, Serialize};

use crate::queue::QueueKind;

// =======================================================================
// Service defaults
// =======================================================================

/// Default bound of a service's inbound queue (messages). 0 = unbounded.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Worker wake interval when the queue is idle (milliseconds).
///
/// Bounds the worst-case latency of the periodic update tick: even with no
/// inbound traffic, `on_update` runs at least once per interval.
pub const WORKER_WAKE_INTERVAL_MS: u64 = 100;

// =======================================================================
// Transport defaults
// =======================================================================

/// Default bind address for listening transports.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Default maximum concurrent connections per transport.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 1000;

/// Default read/write buffer size (bytes).
pub const DEFAULT_BUFFER_SIZE: u32 = 8192;

/// Default session idle timeout (milliseconds).
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 60_000;

/// Default number of transport I/O threads.
pub const DEFAULT_IO_THREADS: u32 = 1;

/// Default accept backlog for listening sockets.
pub const DEFAULT_ACCEPT_BACKLOG: u32 = 128;

/// Default maximum UDP datagram size (bytes).
pub const DEFAULT_UDP_MAX_DATAGRAM: u32 = 4096;

/// Default UDP pseudo-session timeout (milliseconds).
pub const DEFAULT_UDP_SESSION_TIMEOUT_MS: u64 = 60_000;

// =======================================================================
// Config structs
// =======================================================================

/// Per-service tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Inbound queue bound in messages; 0 means unbounded.
    pub queue_capacity: usize,
    /// Idle wake interval of the worker loop (milliseconds).
    pub wake_interval_ms: u64,
    /// Which queue variant backs the service.
    pub queue_kind: QueueKind,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            wake_interval_ms: WORKER_WAKE_INTERVAL_MS,
            queue_kind: QueueKind::Fifo,
        }
    }
}

impl ServiceConfig {
    /// Override the queue bound (0 = unbounded).
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Override the idle wake interval.
    pub fn with_wake_interval_ms(mut self, interval_ms: u64) -> Self {
        self.wake_interval_ms = interval_ms;
        self
    }

    /// Override the queue variant.
    pub fn with_queue_kind(mut self, kind: QueueKind) -> Self {
        self.queue_kind = kind;
        self
    }
}

/// Transport-level tuning shared by the TCP and UDP session layers.
///
/// The session implementations live outside this crate; this struct pins
/// down the knobs they are expected to honor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetConfig {
    /// Listen address.
    pub bind_address: String,
    /// Listen port; 0 lets the OS pick.
    pub port: u16,
    /// Maximum concurrent connections.
    pub max_connections: u32,
    /// Per-connection read buffer size (bytes).
    pub read_buffer_size: u32,
    /// Per-connection write buffer size (bytes).
    pub write_buffer_size: u32,
    /// Idle timeout before a session is closed (milliseconds).
    pub idle_timeout_ms: u64,
    /// Number of I/O threads.
    pub io_threads: u32,
    /// Accept backlog for listening sockets.
    pub accept_backlog: u32,
    /// Maximum UDP datagram size (bytes).
    pub udp_max_datagram: u32,
    /// UDP pseudo-session timeout (milliseconds).
    pub udp_session_timeout_ms: u64,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: 0,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            read_buffer_size: DEFAULT_BUFFER_SIZE,
            write_buffer_size: DEFAULT_BUFFER_SIZE,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            io_threads: DEFAULT_IO_THREADS,
            accept_backlog: DEFAULT_ACCEPT_BACKLOG,
            udp_max_datagram: DEFAULT_UDP_MAX_DATAGRAM,
            udp_session_timeout_ms: DEFAULT_UDP_SESSION_TIMEOUT_MS,
        }
    }
}

impl NetConfig {
    /// Override the listen port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the listen address.
    pub fn with_bind_address(mut self, addr: impl Into<String>) -> Self {
        self.bind_address = addr.into();
        self
    }

    /// Override the connection limit.
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Override the idle timeout.
    pub fn with_idle_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.idle_timeout_ms = timeout_ms;
        self
    }
}
