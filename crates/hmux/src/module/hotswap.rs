// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Module hot-swap.
//!
//! Replaces a registered module with a freshly constructed instance while
//! the service keeps running, carrying state across as an opaque byte
//! string:
//!
//! 1. capture the old module's state via its registered state getter,
//! 2. stop and remove the old module,
//! 3. build the replacement and register it (which re-initializes it and
//!    starts it if the service is running),
//! 4. restore the captured state via the state setter.
//!
//! State transformers are registered per module *name* in a process-wide
//! registry; modules without transformers swap with empty state.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::service::Service;

use super::{Module, ServiceRef};

/// Captures a module's state as opaque bytes.
pub type StateGetter = Box<dyn Fn(&dyn Module) -> Vec<u8> + Send + Sync>;

/// Restores a module's state from opaque bytes.
pub type StateSetter = Box<dyn Fn(&dyn Module, &[u8]) + Send + Sync>;

struct Transformer {
    get: StateGetter,
    set: StateSetter,
}

static TRANSFORMERS: OnceLock<DashMap<String, Transformer>> = OnceLock::new();

fn transformers() -> &'static DashMap<String, Transformer> {
    TRANSFORMERS.get_or_init(DashMap::new)
}

/// Register the state getter/setter pair for a module name.
///
/// Replaces any previous pair for the same name.
pub fn register_state_transformer<G, S>(module_name: impl Into<String>, get: G, set: S)
where
    G: Fn(&dyn Module) -> Vec<u8> + Send + Sync + 'static,
    S: Fn(&dyn Module, &[u8]) + Send + Sync + 'static,
{
    transformers().insert(
        module_name.into(),
        Transformer { get: Box::new(get), set: Box::new(set) },
    );
}

/// Capture a module's state, or empty bytes without a transformer.
#[must_use]
pub fn capture_state(module: &dyn Module) -> Vec<u8> {
    match transformers().get(module.name()) {
        Some(t) => (t.get)(module),
        None => Vec::new(),
    }
}

/// Restore a module's state; no-op without a transformer or with empty
/// state.
pub fn restore_state(module: &dyn Module, state: &[u8]) {
    if state.is_empty() {
        return;
    }
    if let Some(t) = transformers().get(module.name()) {
        (t.set)(module, state);
    }
}

/// Swap the named module for a new instance, carrying state across.
///
/// The factory receives a [`ServiceRef`] for the target service. On
/// failure to register the replacement, the old module is already gone;
/// the caller decides whether to re-install it.
pub fn hot_swap<F>(service: &Service, name: &str, factory: F) -> Result<Arc<dyn Module>>
where
    F: FnOnce(ServiceRef) -> Arc<dyn Module>,
{
    let old = service
        .get_module(name)
        .ok_or_else(|| Error::ModuleNotFound(name.to_string()))?;

    let state = capture_state(old.as_ref());

    // remove_module stops the old instance when the service is running.
    service.remove_module(name)?;
    drop(old);

    let replacement = factory(service.downgrade());
    service.register_module(Arc::clone(&replacement))?;
    restore_state(replacement.as_ref(), &state);

    log::info!("hot-swapped module: {}", name);
    Ok(replacement)
}
