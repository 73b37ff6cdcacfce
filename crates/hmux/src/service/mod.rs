// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service runtime.
//!
//! A [`Service`] owns one inbound message queue, one worker thread, a
//! typed handler table, and a registry of modules. The worker drains the
//! queue one message at a time, dispatches into the handler table, and
//! drives the periodic update tick:
//!
//! ```text
//! transports / timers / modules
//!        |  post(msg)
//!        v
//! +-------------+     +----------------------------------+
//! |  queue      | --> | worker: wait_and_pop(100 ms)     |
//! | (any queue  |     |   on_message -> dispatch(key)    |
//! |  variant)   |     |   on_update(elapsed)             |
//! +-------------+     +----------------------------------+
//! ```
//!
//! # Lifecycle
//!
//! `Created -> Initialized -> Running -> Stopped`, driven by [`init`],
//! [`start`], [`stop`]. `stop` is idempotent; restarting a stopped
//! service is not supported (create a new one).
//!
//! [`init`]: Service::init
//! [`start`]: Service::start
//! [`stop`]: Service::stop
//!
//! # Threading
//!
//! `post` and the registration APIs are safe from any thread.
//! [`Service::dispatch`] bypasses the queue and is intended for the
//! worker thread (and tests) only. Handlers run on the worker, one at a
//! time; a handler invocation happens-before the next one on the same
//! service.
//!
//! Handler closures that need the service back (to post follow-up
//! messages) should capture a [`ServiceRef`](crate::module::ServiceRef)
//! obtained from [`Service::downgrade`]; capturing a strong `Service`
//! inside a handler would keep the service alive forever.

mod dependency;
mod handler;

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, RwLock};

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::message::{Category, Message, MessageId, MessageTag};
use crate::module::{Module, ServiceRef};
use crate::queue::{create_queue, MessageQueue};

use dependency::DependencyGraph;
use handler::HandlerTable;

// Lifecycle states.
const STATE_CREATED: u8 = 0;
const STATE_INITIALIZED: u8 = 1;
const STATE_RUNNING: u8 = 2;
const STATE_STOPPED: u8 = 3;

/// Milliseconds since the Unix epoch; used for message timestamps.
fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Lifecycle and behavior hooks of a service.
///
/// All methods have defaults; implement only what the service needs. The
/// default `on_message` dispatches into the handler table and the default
/// `on_update` drives module updates, so overriding either replaces that
/// behavior.
pub trait ServiceListener: Send + Sync {
    /// Called from `init()` before the service becomes Initialized.
    fn on_init(&self, service: &Service) -> Result<()> {
        let _ = service;
        Ok(())
    }

    /// Called from `start()` after the worker thread is up.
    fn on_start(&self, service: &Service) -> Result<()> {
        let _ = service;
        Ok(())
    }

    /// Called from `stop()` after the queue is shut down.
    fn on_stop(&self, service: &Service) -> Result<()> {
        let _ = service;
        Ok(())
    }

    /// Called on the worker for every dequeued message.
    fn on_message(&self, service: &Service, msg: &dyn Message) -> Result<()> {
        service.dispatch(msg)
    }

    /// Called on the worker whenever wall time has advanced.
    fn on_update(&self, service: &Service, elapsed_ms: u64) -> Result<()> {
        service.update_modules(elapsed_ms);
        Ok(())
    }
}

/// Listener with all-default behavior.
pub struct DefaultServiceListener;

impl ServiceListener for DefaultServiceListener {}

/// Counters updated by the worker loop and the posting paths.
///
/// Relaxed atomics; consumers only need monotonic snapshots for
/// observability.
#[derive(Debug, Default)]
pub struct ServiceMetrics {
    /// Messages accepted by `post`.
    pub messages_posted: AtomicU64,
    /// Messages the worker handed to `on_message`.
    pub messages_processed: AtomicU64,
    /// Dispatches that found no handler.
    pub messages_unhandled: AtomicU64,
    /// Handler invocations that panicked (caught by the worker).
    pub handler_panics: AtomicU64,
    /// Update ticks executed.
    pub update_ticks: AtomicU64,
}

impl ServiceMetrics {
    /// Current counter values.
    #[must_use]
    pub fn snapshot(&self) -> ServiceMetricsSnapshot {
        ServiceMetricsSnapshot {
            messages_posted: self.messages_posted.load(Ordering::Relaxed),
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            messages_unhandled: self.messages_unhandled.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
            update_ticks: self.update_ticks.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ServiceMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceMetricsSnapshot {
    /// Messages accepted by `post`.
    pub messages_posted: u64,
    /// Messages the worker handed to `on_message`.
    pub messages_processed: u64,
    /// Dispatches that found no handler.
    pub messages_unhandled: u64,
    /// Handler invocations that panicked.
    pub handler_panics: u64,
    /// Update ticks executed.
    pub update_ticks: u64,
}

pub(crate) struct ServiceInner {
    name: String,
    config: ServiceConfig,
    state: AtomicU8,
    queue: Arc<dyn MessageQueue>,
    handlers: HandlerTable,
    modules: RwLock<HashMap<String, Arc<dyn Module>>>,
    deps: Mutex<DependencyGraph>,
    listener: Arc<dyn ServiceListener>,
    worker: Mutex<Option<JoinHandle<()>>>,
    metrics: ServiceMetrics,
}

/// Handle to a service; cheap to clone.
///
/// The last strong handle going away (without an explicit [`stop`]) lets
/// the worker wind down on its next wake: the worker itself only holds a
/// weak reference.
///
/// [`stop`]: Service::stop
#[derive(Clone)]
pub struct Service {
    inner: Arc<ServiceInner>,
}

/// Configures and creates a [`Service`].
pub struct ServiceBuilder {
    name: String,
    config: ServiceConfig,
    queue: Option<Arc<dyn MessageQueue>>,
    listener: Arc<dyn ServiceListener>,
}

impl ServiceBuilder {
    /// Override the whole config block.
    #[must_use]
    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the queue bound (0 = unbounded).
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Override the queue variant.
    #[must_use]
    pub fn queue_kind(mut self, kind: crate::queue::QueueKind) -> Self {
        self.config.queue_kind = kind;
        self
    }

    /// Supply a pre-built queue instead of constructing one from the
    /// config.
    #[must_use]
    pub fn queue(mut self, queue: Arc<dyn MessageQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Install lifecycle/behavior hooks.
    #[must_use]
    pub fn listener<L: ServiceListener + 'static>(mut self, listener: L) -> Self {
        self.listener = Arc::new(listener);
        self
    }

    /// Create the service in the Created state.
    #[must_use]
    pub fn build(self) -> Service {
        let queue = self
            .queue
            .unwrap_or_else(|| create_queue(self.config.queue_kind, self.config.queue_capacity));
        Service {
            inner: Arc::new(ServiceInner {
                name: self.name,
                config: self.config,
                state: AtomicU8::new(STATE_CREATED),
                queue,
                handlers: HandlerTable::new(),
                modules: RwLock::new(HashMap::new()),
                deps: Mutex::new(DependencyGraph::new()),
                listener: self.listener,
                worker: Mutex::new(None),
                metrics: ServiceMetrics::default(),
            }),
        }
    }
}

impl Service {
    /// Start configuring a service.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ServiceBuilder {
        ServiceBuilder {
            name: name.into(),
            config: ServiceConfig::default(),
            queue: None,
            listener: Arc::new(DefaultServiceListener),
        }
    }

    /// Create a service with default configuration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::builder(name).build()
    }

    // ====================================================================
    // Lifecycle
    // ====================================================================

    /// Initialize the service (Created -> Initialized).
    ///
    /// Runs the listener's `on_init`; on failure the service remains
    /// Created.
    pub fn init(&self) -> Result<()> {
        log::info!("initializing service: {}", self.inner.name);

        if self
            .inner
            .state
            .compare_exchange(STATE_CREATED, STATE_INITIALIZED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::Service(format!(
                "service {} is not in the Created state",
                self.inner.name
            )));
        }

        if self.inner.queue.is_shutdown() {
            self.inner.state.store(STATE_CREATED, Ordering::Release);
            return Err(Error::Service("message queue is shut down".into()));
        }

        if let Err(e) = self.inner.listener.on_init(self) {
            log::error!("failed to initialize service {}: {}", self.inner.name, e);
            self.inner.state.store(STATE_CREATED, Ordering::Release);
            return Err(e);
        }

        log::info!("service initialized: {}", self.inner.name);
        Ok(())
    }

    /// Start the worker thread (Initialized -> Running).
    ///
    /// Runs `on_start` after the worker is up, then starts every
    /// registered module (individual failures are logged, not fatal).
    /// If `on_start` fails the worker is joined again and the service
    /// ends up Stopped.
    pub fn start(&self) -> Result<()> {
        log::info!("starting service: {}", self.inner.name);

        if let Err(current) = self.inner.state.compare_exchange(
            STATE_INITIALIZED,
            STATE_RUNNING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return Err(match current {
                STATE_RUNNING => Error::ServiceAlreadyStarted,
                STATE_CREATED => Error::Service(format!(
                    "service {} has not been initialized",
                    self.inner.name
                )),
                _ => Error::Service(format!(
                    "service {} was stopped and cannot be restarted",
                    self.inner.name
                )),
            });
        }

        let weak = Arc::downgrade(&self.inner);
        let name = self.inner.name.clone();
        let handle = thread::Builder::new()
            .name(format!("hmux-svc-{name}"))
            .spawn(move || worker_main(weak))
            .expect("failed to spawn service worker thread");
        *self.inner.worker.lock() = Some(handle);

        if let Err(e) = self.inner.listener.on_start(self) {
            log::error!("failed to start service {}: {}", self.inner.name, e);
            self.inner.state.store(STATE_STOPPED, Ordering::Release);
            self.inner.queue.shutdown();
            self.join_worker();
            return Err(e);
        }

        self.start_modules();

        log::info!("service started: {}", self.inner.name);
        Ok(())
    }

    /// Stop the service (Running -> Stopped).
    ///
    /// Shuts the queue down, runs `on_stop`, joins the worker, and stops
    /// every module. Idempotent: only the first call has effect; calling
    /// before `start` is an error.
    pub fn stop(&self) -> Result<()> {
        if let Err(current) = self.inner.state.compare_exchange(
            STATE_RUNNING,
            STATE_STOPPED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return match current {
                STATE_STOPPED => Ok(()),
                _ => Err(Error::ServiceNotStarted),
            };
        }

        log::info!("stopping service: {}", self.inner.name);
        self.inner.queue.shutdown();

        let result = self.inner.listener.on_stop(self);
        if let Err(e) = &result {
            log::error!("error stopping service {}: {}", self.inner.name, e);
        }

        self.join_worker();
        self.stop_modules();

        log::info!("service stopped: {}", self.inner.name);
        result
    }

    /// Join the worker thread without initiating a stop.
    ///
    /// Returns once the worker has exited (typically after some handler
    /// called [`stop`](Service::stop)). No-op when called on the worker
    /// itself or when the service never started.
    pub fn wait(&self) {
        self.join_worker();
    }

    /// Service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether the worker loop is (supposed to be) running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == STATE_RUNNING
    }

    /// Service configuration.
    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    /// Worker-side counters.
    #[must_use]
    pub fn metrics(&self) -> &ServiceMetrics {
        &self.inner.metrics
    }

    /// Number of messages waiting in the inbound queue.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.inner.queue.len()
    }

    /// Non-owning reference for modules and handler closures.
    #[must_use]
    pub fn downgrade(&self) -> ServiceRef {
        ServiceRef::new(Arc::downgrade(&self.inner))
    }

    fn join_worker(&self) {
        let handle = {
            let mut guard = self.inner.worker.lock();
            match guard.take() {
                Some(h) if h.thread().id() == thread::current().id() => {
                    // stop() from inside a handler: the worker exits on
                    // its own once it observes the state change; joining
                    // here would deadlock on ourselves.
                    *guard = Some(h);
                    None
                }
                other => other,
            }
        };
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    // ====================================================================
    // Messages
    // ====================================================================

    /// Enqueue a message for the worker.
    ///
    /// Stamps the message timestamp. Fails with
    /// [`Error::ServiceNotStarted`] unless the service is Running.
    pub fn post(&self, mut msg: Box<dyn Message>) -> Result<()> {
        if !self.is_running() {
            return Err(Error::ServiceNotStarted);
        }

        msg.set_timestamp(epoch_ms());
        self.inner.queue.push(msg);
        self.inner.metrics.messages_posted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Dispatch a message into the handler table, bypassing the queue.
    ///
    /// Invoked by the worker for every dequeued message; also callable
    /// from tests. Production code outside the worker should `post`
    /// instead.
    pub fn dispatch(&self, msg: &dyn Message) -> Result<()> {
        match self.inner.handlers.get(msg.key()) {
            Some(handler) => {
                (*handler)(msg);
                Ok(())
            }
            None => {
                log::warn!(
                    "no handler for message: category={} id={}",
                    msg.category(),
                    msg.id()
                );
                self.inner.metrics.messages_unhandled.fetch_add(1, Ordering::Relaxed);
                Err(Error::Message(format!(
                    "no handler for category {} id {}",
                    msg.category(),
                    msg.id()
                )))
            }
        }
    }

    /// Register a typed handler at `T`'s coordinates.
    ///
    /// Rejects duplicate registration for the same (category, id).
    pub fn register_handler<T, F>(&self, handler: F) -> Result<()>
    where
        T: MessageTag + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.handlers.register::<T, F>(handler)
    }

    /// Register an erased handler for explicit coordinates.
    pub fn register_raw_handler<F>(&self, category: Category, id: MessageId, handler: F) -> Result<()>
    where
        F: Fn(&dyn Message) + Send + Sync + 'static,
    {
        self.inner.handlers.register_raw(category, id, handler)
    }

    // ====================================================================
    // Modules
    // ====================================================================

    /// Register a module under its own name.
    ///
    /// Calls the module's `init()`; on failure the module is removed
    /// again and the error surfaced. If the service is already running,
    /// `start()` is also invoked (failure stops and removes the module).
    pub fn register_module(&self, module: Arc<dyn Module>) -> Result<()> {
        let name = module.name().to_string();
        if name.is_empty() {
            return Err(Error::InvalidArgument("module name cannot be empty".into()));
        }

        {
            let mut modules = self.inner.modules.write();
            if modules.contains_key(&name) {
                return Err(Error::ModuleAlreadyExists(name));
            }
            modules.insert(name.clone(), Arc::clone(&module));
        }
        log::info!("registered module: {}", name);

        if let Err(e) = module.init() {
            self.inner.modules.write().remove(&name);
            return Err(Error::ModuleInitializationFailed(format!("{name}: {e}")));
        }

        if self.is_running() {
            if let Err(e) = module.start() {
                if let Err(stop_err) = module.stop() {
                    log::warn!("error stopping module {} after failed start: {}", name, stop_err);
                }
                self.inner.modules.write().remove(&name);
                return Err(Error::Module(format!("failed to start module {name}: {e}")));
            }
        }

        Ok(())
    }

    /// Fetch a module by name.
    #[must_use]
    pub fn get_module(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.inner.modules.read().get(name).cloned()
    }

    /// Whether a module with this name is registered.
    #[must_use]
    pub fn has_module(&self, name: &str) -> bool {
        self.inner.modules.read().contains_key(name)
    }

    /// Names of all registered modules.
    #[must_use]
    pub fn module_names(&self) -> Vec<String> {
        self.inner.modules.read().keys().cloned().collect()
    }

    /// Remove a module, stopping it first if the service is running.
    ///
    /// Also drops the module's declared dependencies.
    pub fn remove_module(&self, name: &str) -> Result<()> {
        let module = self
            .inner
            .modules
            .write()
            .remove(name)
            .ok_or_else(|| Error::ModuleNotFound(name.to_string()))?;

        if self.is_running() {
            if let Err(e) = module.stop() {
                log::warn!("error stopping module {}: {}", name, e);
            }
        }
        self.inner.deps.lock().remove(name);

        log::info!("removed module: {}", name);
        Ok(())
    }

    /// Declare that `module` depends on `dependency`.
    ///
    /// Both modules must be registered. Rejects insertions that would
    /// close a cycle with [`Error::CircularDependency`].
    pub fn add_dependency(&self, module: &str, dependency: &str) -> Result<()> {
        {
            let modules = self.inner.modules.read();
            if !modules.contains_key(module) {
                return Err(Error::ModuleNotFound(module.to_string()));
            }
            if !modules.contains_key(dependency) {
                return Err(Error::ModuleNotFound(dependency.to_string()));
            }
        }
        self.inner.deps.lock().add(module, dependency)
    }

    /// Direct dependencies declared by a module.
    #[must_use]
    pub fn dependencies_of(&self, module: &str) -> Vec<String> {
        self.inner.deps.lock().dependencies_of(module)
    }

    /// Whether `module` transitively depends on `other`.
    #[must_use]
    pub fn depends_on(&self, module: &str, other: &str) -> bool {
        self.inner.deps.lock().depends_on(module, other)
    }

    /// Run `update` on every module, logging failures.
    ///
    /// The default [`ServiceListener::on_update`] calls this on each
    /// worker tick.
    pub fn update_modules(&self, elapsed_ms: u64) {
        for (name, module) in self.module_snapshot() {
            if let Err(e) = module.update(elapsed_ms) {
                log::warn!("error updating module {}: {}", name, e);
            }
        }
    }

    fn start_modules(&self) {
        for (name, module) in self.module_snapshot() {
            if let Err(e) = module.start() {
                log::error!("failed to start module {}: {}", name, e);
            }
        }
    }

    fn stop_modules(&self) {
        for (name, module) in self.module_snapshot() {
            if let Err(e) = module.stop() {
                log::error!("failed to stop module {}: {}", name, e);
            }
        }
    }

    fn module_snapshot(&self) -> Vec<(String, Arc<dyn Module>)> {
        self.inner
            .modules
            .read()
            .iter()
            .map(|(name, module)| (name.clone(), Arc::clone(module)))
            .collect()
    }

    pub(crate) fn from_inner(inner: Arc<ServiceInner>) -> Self {
        Self { inner }
    }
}

/// Worker loop. Holds only a weak reference so that dropping every
/// external handle lets the service wind down.
fn worker_main(weak: Weak<ServiceInner>) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let name = inner.name.clone();
    let wake = Duration::from_millis(inner.config.wake_interval_ms.max(1));
    drop(inner);

    log::info!("service worker thread started: {}", name);
    let mut last_update = Instant::now();

    loop {
        let Some(inner) = weak.upgrade() else {
            break;
        };
        if inner.state.load(Ordering::Acquire) != STATE_RUNNING {
            break;
        }
        let service = Service::from_inner(inner);

        if let Some(msg) = service.inner.queue.wait_and_pop(wake) {
            service.inner.metrics.messages_processed.fetch_add(1, Ordering::Relaxed);
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                service.inner.listener.on_message(&service, msg.as_ref())
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    // Dispatch already logged the interesting cases
                    // (unknown key); keep the worker loop quiet.
                    log::debug!("message handling returned error: {}", e);
                }
                Err(_) => {
                    service.inner.metrics.handler_panics.fetch_add(1, Ordering::Relaxed);
                    log::error!(
                        "panic while handling message: category={} id={}",
                        msg.category(),
                        msg.id()
                    );
                }
            }
        }

        let now = Instant::now();
        let elapsed = now.duration_since(last_update).as_millis() as u64;
        if elapsed > 0 {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                service.inner.listener.on_update(&service, elapsed)
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::error!("error in service update: {}", e),
                Err(_) => log::error!("panic in service update"),
            }
            service.inner.metrics.update_ticks.fetch_add(1, Ordering::Relaxed);
            last_update = now;
        }
    }

    log::info!("service worker thread stopped: {}", name);
}

impl Drop for ServiceInner {
    fn drop(&mut self) {
        // Last handle gone; make sure a still-running worker wakes and
        // exits promptly. The worker only holds a weak reference, so it
        // cannot be the one running this drop.
        self.queue.shutdown();
    }
}
