// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pluggable service modules.
//!
//! A [`Module`] is a named unit of functionality registered with a
//! service. The service owns its modules strongly; a module reaches back
//! through a [`ServiceRef`], a non-owning reference that must be upgraded
//! before use and fails cleanly once the service is gone. This breaks the
//! service <-> module ownership cycle.
//!
//! ```no_run
//! use hmux::{install_module, Module, Result, Service, ServiceRef};
//! use std::any::Any;
//!
//! struct Heartbeat {
//!     service: ServiceRef,
//! }
//!
//! impl Module for Heartbeat {
//!     fn name(&self) -> &str {
//!         "heartbeat"
//!     }
//!     fn update(&self, _elapsed_ms: u64) -> Result<()> {
//!         // self.service.post(...)?
//!         Ok(())
//!     }
//!     fn as_any(&self) -> &dyn Any {
//!         self
//!     }
//! }
//!
//! let service = Service::new("game");
//! let _hb = install_module(&service, |service| Heartbeat { service }).unwrap();
//! ```

pub mod hotswap;

use std::any::Any;
use std::sync::{Arc, Weak};

use crate::error::{Error, Result};
use crate::message::{Message, MessageTag};
use crate::service::{Service, ServiceInner};

/// A unit of functionality registered into a service.
///
/// Lifecycle methods default to no-ops; `update` is driven from the
/// service worker's periodic tick.
pub trait Module: Send + Sync {
    /// Stable module name; the registry key.
    fn name(&self) -> &str;

    /// Called once when the module is registered.
    fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Called when the owning service starts (or on registration into a
    /// running service).
    fn start(&self) -> Result<()> {
        Ok(())
    }

    /// Called when the owning service stops or the module is removed.
    fn stop(&self) -> Result<()> {
        Ok(())
    }

    /// Periodic tick from the service worker.
    fn update(&self, _elapsed_ms: u64) -> Result<()> {
        Ok(())
    }

    /// `Any` bridge; lets embedders and the hot-swap state transformers
    /// recover the concrete type.
    fn as_any(&self) -> &dyn Any;
}

/// Non-owning reference from a module back to its service.
///
/// Every operation upgrades on use; once the service has been dropped the
/// operations fail with [`Error::Module`] instead of touching freed
/// state.
#[derive(Clone, Debug)]
pub struct ServiceRef {
    inner: Weak<ServiceInner>,
}

impl ServiceRef {
    pub(crate) fn new(inner: Weak<ServiceInner>) -> Self {
        Self { inner }
    }

    /// Upgrade to a strong service handle.
    pub fn service(&self) -> Result<Service> {
        self.inner
            .upgrade()
            .map(Service::from_inner)
            .ok_or_else(|| Error::Module("service is no longer available".into()))
    }

    /// Post a message to the owning service.
    pub fn post(&self, msg: Box<dyn Message>) -> Result<()> {
        self.service()?.post(msg)
    }

    /// Register a typed handler on the owning service.
    pub fn register_handler<T, F>(&self, handler: F) -> Result<()>
    where
        T: MessageTag + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.service()?.register_handler::<T, F>(handler)
    }

    /// Declare a dependency of `module` on `dependency`.
    pub fn add_dependency(&self, module: &str, dependency: &str) -> Result<()> {
        self.service()?.add_dependency(module, dependency)
    }
}

/// Build, register, and initialize a module in one step.
///
/// The constructor receives a [`ServiceRef`] for the target service. If
/// registration (or the module's `init`) fails, the freshly built module
/// is dropped and the error returned; nothing stays registered.
pub fn install_module<M, F>(service: &Service, build: F) -> Result<Arc<M>>
where
    M: Module + 'static,
    F: FnOnce(ServiceRef) -> M,
{
    let module = Arc::new(build(service.downgrade()));
    service.register_module(Arc::clone(&module) as Arc<dyn Module>)?;
    Ok(module)
}
