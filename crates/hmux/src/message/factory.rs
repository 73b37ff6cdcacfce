// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-wide message factory.
//!
//! Transports that decode a wire frame only know the (category, id) pair;
//! this registry maps the pair to a zero-arg constructor for the concrete
//! message type so the body can be deserialized into the right shape.
//!
//! Registration happens at startup (one call per concrete type). Lookup
//! for an unregistered pair falls back to [`RawMessage`], which carries
//! the body as opaque bytes.

use std::sync::OnceLock;

use dashmap::DashMap;

use super::{handler_key, Category, HandlerKey, Message, MessageId, MessageTag, RawMessage};

type Constructor = fn() -> Box<dyn Message>;

static REGISTRY: OnceLock<DashMap<HandlerKey, Constructor>> = OnceLock::new();

fn registry() -> &'static DashMap<HandlerKey, Constructor> {
    REGISTRY.get_or_init(DashMap::new)
}

/// Register the constructor for a concrete message type.
///
/// Idempotent: re-registering the same pair replaces the constructor,
/// which lets tests and hot-reload paths re-run startup registration.
pub fn register_message<T>()
where
    T: MessageTag + Default + 'static,
{
    registry().insert(handler_key(T::CATEGORY, T::ID), || Box::new(T::default()));
}

/// Construct an empty message for a (category, id) pair.
///
/// Returns the registered concrete type when known, otherwise a
/// [`RawMessage`] with the same coordinates.
#[must_use]
pub fn create_message(category: Category, id: MessageId) -> Box<dyn Message> {
    match registry().get(&handler_key(category, id)) {
        Some(ctor) => (*ctor)(),
        None => Box::new(RawMessage::new(category, id)),
    }
}

/// Number of registered concrete types.
#[must_use]
pub fn registered_count() -> usize {
    registry().len()
}
