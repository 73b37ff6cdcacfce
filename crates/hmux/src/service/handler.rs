// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed message handler table.
//!
//! Maps a 32-bit handler key to an erased dispatcher. The typed
//! registration path wraps a `Fn(&T)` closure in a dispatcher that
//! downcasts the incoming message; since the key already determines the
//! concrete type, a failed downcast means the producer lied about its
//! coordinates and the call is silently dropped.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::message::{handler_key, Category, HandlerKey, Message, MessageId, MessageTag};

/// Erased handler invoked by the dispatcher.
pub type RawHandler = dyn Fn(&dyn Message) + Send + Sync;

/// Registry of (category, id) -> handler.
///
/// Registration happens during setup from arbitrary threads; lookup
/// happens on the service worker. Entries are `Arc`ed so a handler can be
/// invoked with the table lock released (handlers may register further
/// handlers).
#[derive(Default)]
pub(crate) struct HandlerTable {
    entries: RwLock<HashMap<HandlerKey, Arc<RawHandler>>>,
}

impl HandlerTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register an erased handler for explicit coordinates.
    pub(crate) fn register_raw<F>(&self, category: Category, id: MessageId, handler: F) -> Result<()>
    where
        F: Fn(&dyn Message) + Send + Sync + 'static,
    {
        let key = handler_key(category, id);
        let mut entries = self.entries.write();
        if entries.contains_key(&key) {
            return Err(Error::HandlerAlreadyRegistered { category, id });
        }
        entries.insert(key, Arc::new(handler));
        log::debug!("registered handler for category {} id {}", category, id);
        Ok(())
    }

    /// Register a typed handler at `T`'s coordinates.
    pub(crate) fn register<T, F>(&self, handler: F) -> Result<()>
    where
        T: MessageTag + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.register_raw(T::CATEGORY, T::ID, move |msg: &dyn Message| {
            // The key determines the type; a mismatch is a producer bug
            // and the call is dropped.
            if let Some(typed) = msg.as_any().downcast_ref::<T>() {
                handler(typed);
            }
        })
    }

    /// Look up the handler for a key, if any.
    pub(crate) fn get(&self, key: HandlerKey) -> Option<Arc<RawHandler>> {
        self.entries.read().get(&key).cloned()
    }

    /// Number of registered handlers.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }
}
