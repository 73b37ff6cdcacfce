// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session contract for TCP/UDP transports.
//!
//! The transports themselves live outside this crate; this module pins
//! down what they must provide so services and modules can stay
//! transport-agnostic:
//!
//! - the wire framing ([`frame`]) every transport must produce/consume,
//! - the [`Session`] surface (identity, state, send, attributes),
//! - the [`SessionListener`] events a transport emits.
//!
//! # Write ordering
//!
//! A transport keeps one write queue per session. A send is the sequence
//! of (header, body) buffers for one frame, and the next write starts
//! only after the previous one has completed; frames from one session are
//! never interleaved on the wire.

pub mod frame;

pub use frame::{encode_frame, FrameDecoder, FrameHeader, FRAME_HEADER_SIZE};

use crate::error::{Error, Result};
use crate::message::Message;

/// Session identifier assigned by the transport; 0 means "no session".
pub type SessionId = u32;

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport connection.
    Disconnected,
    /// Outbound connect in progress.
    Connecting,
    /// Transport established, application handshake pending.
    Connected,
    /// Application handshake in progress.
    Authenticating,
    /// Fully established.
    Authenticated,
    /// Close requested, flushing.
    Closing,
}

/// A logical connection managed by a transport.
pub trait Session: Send + Sync {
    /// Transport-assigned session id (never 0 for a live session).
    fn id(&self) -> SessionId;

    /// Peer address in display form.
    fn remote_address(&self) -> String;

    /// Current connection state.
    fn state(&self) -> SessionState;

    /// Milliseconds since the last inbound or outbound traffic.
    fn idle_time_ms(&self) -> u64;

    /// Frame and enqueue a message for this session.
    fn send(&self, msg: &dyn Message) -> Result<()>;

    /// Close the session; pending writes are flushed first.
    fn close(&self) -> Result<()>;

    /// Set a string attribute on the session.
    fn set_attribute(&self, key: &str, value: &str);

    /// Fetch a string attribute.
    fn attribute(&self, key: &str) -> Option<String>;

    /// Whether an attribute is set.
    fn has_attribute(&self, key: &str) -> bool {
        self.attribute(key).is_some()
    }

    /// Remove an attribute.
    fn remove_attribute(&self, key: &str);

    /// Drop all attributes.
    fn clear_attributes(&self);
}

/// Transport events, all defaulting to no-ops.
///
/// A transport calls these from its I/O threads; implementations that
/// need to touch service state should `post` a message instead of doing
/// work inline.
pub trait SessionListener: Send + Sync {
    /// A session object was created (before the transport handshake).
    fn on_session_created(&self, session: &dyn Session) {
        let _ = session;
    }

    /// The transport connection is established.
    fn on_session_opened(&self, session: &dyn Session) {
        let _ = session;
    }

    /// The session is gone; last event for this id.
    fn on_session_closed(&self, session: &dyn Session) {
        let _ = session;
    }

    /// The session exceeded the configured idle timeout.
    fn on_session_idle(&self, session: &dyn Session) {
        let _ = session;
    }

    /// A transport-level error occurred on this session.
    fn on_session_error(&self, session: &dyn Session, error: &Error) {
        let _ = (session, error);
    }

    /// A complete frame was decoded into a message.
    fn on_message_received(&self, session: &dyn Session, msg: Box<dyn Message>) {
        let _ = (session, msg);
    }

    /// A message's frame was fully written to the wire.
    fn on_message_sent(&self, session: &dyn Session, msg: &dyn Message) {
        let _ = (session, msg);
    }
}
