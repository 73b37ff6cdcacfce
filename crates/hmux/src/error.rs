// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for hmux operations.
//!
//! Every fallible operation in the crate returns [`Result`], carrying an
//! [`Error`] that identifies the failure kind plus enough context to log a
//! useful line. Errors never cross the service worker boundary by
//! unwinding: the worker logs handler failures and keeps draining its
//! queue (see `service`).

use std::fmt;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by hmux operations.
///
/// Variants are grouped by subsystem. Match on the variant to branch on
/// the failure kind; the payload (where present) is human-readable
/// context, not machine-parsable data.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // General
    // ========================================================================
    /// Unclassified failure.
    Unknown(String),
    /// Operation is declared but not implemented (e.g. base message
    /// serialization).
    NotImplemented(&'static str),
    /// Caller-supplied argument was rejected.
    InvalidArgument(String),
    /// Index or id outside the valid range.
    OutOfRange(String),

    // ========================================================================
    // System
    // ========================================================================
    /// Operating-system level failure (I/O, thread spawn, ...).
    System(String),

    // ========================================================================
    // Network
    // ========================================================================
    /// Generic transport failure.
    Network(String),
    /// Outbound connection could not be established.
    ConnectionFailed(String),
    /// Peer closed the connection.
    ConnectionClosed,
    /// Blocking operation exceeded its deadline.
    Timeout,

    // ========================================================================
    // Message
    // ========================================================================
    /// Generic message failure (e.g. dispatch found no handler).
    Message(String),
    /// Frame or payload failed validation/deserialization.
    InvalidMessage(String),
    /// Frame body exceeds the configured maximum.
    MessageTooLarge {
        /// Size announced by the frame header.
        size: usize,
        /// Configured maximum body size.
        max: usize,
    },

    // ========================================================================
    // Service
    // ========================================================================
    /// Generic service failure.
    Service(String),
    /// Named service is not registered.
    ServiceNotFound(String),
    /// A service with this name already exists.
    ServiceAlreadyExists(String),
    /// Operation requires a running service.
    ServiceNotStarted,
    /// `start()` called on a service that is already running.
    ServiceAlreadyStarted,

    // ========================================================================
    // Session
    // ========================================================================
    /// Generic session failure.
    Session(String),
    /// No session with this id.
    SessionNotFound(u32),
    /// A session with this id already exists.
    SessionAlreadyExists(u32),
    /// Operation on a closed session.
    SessionClosed,

    // ========================================================================
    // Module
    // ========================================================================
    /// Generic module failure (e.g. the owning service is gone).
    Module(String),
    /// Named module is not registered with the service.
    ModuleNotFound(String),
    /// A module with this name is already registered.
    ModuleAlreadyExists(String),
    /// Module `init()` failed during registration.
    ModuleInitializationFailed(String),
    /// Declared dependency would close a cycle in the module graph.
    CircularDependency(String),

    // ========================================================================
    // Handler
    // ========================================================================
    /// A handler is already registered for this (category, id) pair.
    HandlerAlreadyRegistered {
        /// Message category of the rejected registration.
        category: u8,
        /// Message id of the rejected registration.
        id: u16,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // General
            Error::Unknown(msg) => write!(f, "Unknown error: {}", msg),
            Error::NotImplemented(what) => write!(f, "Not implemented: {}", what),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::OutOfRange(msg) => write!(f, "Out of range: {}", msg),
            // System
            Error::System(msg) => write!(f, "System error: {}", msg),
            // Network
            Error::Network(msg) => write!(f, "Network error: {}", msg),
            Error::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            Error::ConnectionClosed => write!(f, "Connection closed"),
            Error::Timeout => write!(f, "Timeout"),
            // Message
            Error::Message(msg) => write!(f, "Message error: {}", msg),
            Error::InvalidMessage(msg) => write!(f, "Invalid message: {}", msg),
            Error::MessageTooLarge { size, max } => {
                write!(f, "Message too large: {} bytes (max {})", size, max)
            }
            // Service
            Error::Service(msg) => write!(f, "Service error: {}", msg),
            Error::ServiceNotFound(name) => write!(f, "Service not found: {}", name),
            Error::ServiceAlreadyExists(name) => write!(f, "Service already exists: {}", name),
            Error::ServiceNotStarted => write!(f, "Service not started"),
            Error::ServiceAlreadyStarted => write!(f, "Service already started"),
            // Session
            Error::Session(msg) => write!(f, "Session error: {}", msg),
            Error::SessionNotFound(id) => write!(f, "Session not found: {}", id),
            Error::SessionAlreadyExists(id) => write!(f, "Session already exists: {}", id),
            Error::SessionClosed => write!(f, "Session closed"),
            // Module
            Error::Module(msg) => write!(f, "Module error: {}", msg),
            Error::ModuleNotFound(name) => write!(f, "Module not found: {}", name),
            Error::ModuleAlreadyExists(name) => write!(f, "Module already exists: {}", name),
            Error::ModuleInitializationFailed(msg) => {
                write!(f, "Module initialization failed: {}", msg)
            }
            Error::CircularDependency(msg) => write!(f, "Circular dependency: {}", msg),
            // Handler
            Error::HandlerAlreadyRegistered { category, id } => {
                write!(
                    f,
                    "Handler already registered for category {} id {}",
                    category, id
                )
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::System(e.to_string())
    }
}
