// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed message envelope.
//!
//! Every value flowing through a service is a [`Message`]: a (category, id)
//! type tag, the originating session, a post timestamp, and a concrete
//! payload known to the registered handler. The pair (category, id) is
//! combined into a single 32-bit [`HandlerKey`] used by the dispatch table
//! and the factory registry.
//!
//! Concrete message types embed a [`MessageMeta`] block and implement the
//! trait around it; [`RawMessage`] is the payload-less base type the
//! factory falls back to for unknown (category, id) pairs.
//!
//! # Ownership
//!
//! A message is created by its producer, moved into a queue, moved out by
//! the single consumer, and dropped after the handler returns. Queues
//! never clone messages.

mod factory;

pub use factory::{create_message, register_message, registered_count};

use std::any::Any;

use crate::error::{Error, Result};
use crate::session::SessionId;

/// Message category discriminator (high 8 bits of the handler key).
pub type Category = u8;

/// Message id within a category (low 16 bits of the handler key).
pub type MessageId = u16;

/// Combined dispatch key: `(category << 16) | id`.
pub type HandlerKey = u32;

/// Build the dispatch key for a (category, id) pair.
#[inline]
#[must_use]
pub const fn handler_key(category: Category, id: MessageId) -> HandlerKey {
    ((category as u32) << 16) | id as u32
}

/// Envelope fields shared by every message type.
///
/// Concrete messages embed one of these and expose it through
/// [`Message::meta`] / [`Message::meta_mut`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageMeta {
    /// Message category.
    pub category: Category,
    /// Message id within the category.
    pub id: MessageId,
    /// Originating session, 0 when the message did not come from a session.
    pub session_id: SessionId,
    /// Milliseconds since epoch; stamped by the service on `post`.
    pub timestamp: u64,
}

impl MessageMeta {
    /// Create a meta block for a (category, id) pair.
    #[must_use]
    pub fn new(category: Category, id: MessageId) -> Self {
        Self { category, id, session_id: 0, timestamp: 0 }
    }

    /// Dispatch key of this message.
    #[inline]
    #[must_use]
    pub fn key(&self) -> HandlerKey {
        handler_key(self.category, self.id)
    }
}

/// A typed message.
///
/// Implementors provide the meta block, serialization hooks, and the
/// `Any` bridge the dispatcher uses to recover the concrete type. The
/// envelope accessors (`category`, `session_id`, ...) are provided.
pub trait Message: Send + Any {
    /// Shared envelope fields.
    fn meta(&self) -> &MessageMeta;

    /// Mutable access to the envelope fields.
    fn meta_mut(&mut self) -> &mut MessageMeta;

    /// Human-readable type name, for logs.
    fn name(&self) -> &str {
        "Message"
    }

    /// Encode the payload (not the envelope) to bytes.
    fn serialize(&self) -> Result<Vec<u8>> {
        Err(Error::NotImplemented("serialize"))
    }

    /// Decode the payload from bytes.
    fn deserialize(&mut self, _data: &[u8]) -> Result<()> {
        Err(Error::NotImplemented("deserialize"))
    }

    /// Clone into a new owned message.
    fn clone_message(&self) -> Box<dyn Message>;

    /// `Any` bridge for the dispatcher's typed downcast.
    fn as_any(&self) -> &dyn Any;

    /// Mutable `Any` bridge.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn Message {
    /// Message category.
    #[inline]
    #[must_use]
    pub fn category(&self) -> Category {
        self.meta().category
    }

    /// Message id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> MessageId {
        self.meta().id
    }

    /// Dispatch key.
    #[inline]
    #[must_use]
    pub fn key(&self) -> HandlerKey {
        self.meta().key()
    }

    /// Originating session id (0 = none).
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.meta().session_id
    }

    /// Attach the originating session id.
    #[inline]
    pub fn set_session_id(&mut self, session_id: SessionId) {
        self.meta_mut().session_id = session_id;
    }

    /// Post timestamp (milliseconds since epoch).
    #[inline]
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        self.meta().timestamp
    }

    /// Stamp the post timestamp.
    #[inline]
    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.meta_mut().timestamp = timestamp;
    }
}

/// Compile-time (category, id) coordinates of a concrete message type.
///
/// Implemented by message types that participate in typed handler
/// registration and factory lookup.
pub trait MessageTag: Message {
    /// Category constant of this type.
    const CATEGORY: Category;
    /// Id constant of this type.
    const ID: MessageId;
}

/// Base message with an opaque byte payload.
///
/// Constructible from (category, id) alone; the factory returns one of
/// these for unregistered pairs so transports can still carry the frame
/// body through the runtime.
#[derive(Debug, Clone)]
pub struct RawMessage {
    meta: MessageMeta,
    payload: Vec<u8>,
}

impl RawMessage {
    /// Create an empty message for a (category, id) pair.
    #[must_use]
    pub fn new(category: Category, id: MessageId) -> Self {
        Self { meta: MessageMeta::new(category, id), payload: Vec::new() }
    }

    /// Create a message carrying raw payload bytes.
    #[must_use]
    pub fn with_payload(category: Category, id: MessageId, payload: Vec<u8>) -> Self {
        Self { meta: MessageMeta::new(category, id), payload }
    }

    /// Raw payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl Message for RawMessage {
    fn meta(&self) -> &MessageMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut MessageMeta {
        &mut self.meta
    }

    fn name(&self) -> &str {
        "RawMessage"
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        Ok(self.payload.clone())
    }

    fn deserialize(&mut self, data: &[u8]) -> Result<()> {
        self.payload = data.to_vec();
        Ok(())
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
