// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Timer scheduler.
//!
//! One background thread drives a min-heap of one-shot and repeating
//! tasks. The `tasks` map is authoritative; the heap may contain stale
//! entries left behind by `cancel` and `modify`, which the worker skips
//! when it pops them:
//!
//! - an id missing from `tasks` was cancelled;
//! - an entry whose `next_run` differs from the map's was superseded by
//!   `modify` (which pushed a fresh entry).
//!
//! This keeps `cancel`/`modify` O(log n) with no heap surgery. Callbacks
//! run with the scheduler lock released; a callback that needs to touch
//! service state should `post` a message instead of reaching in directly.
//!
//! A process-wide scheduler is available through the free functions
//! ([`once`], [`repeat`], [`cancel`], ...); independent instances can be
//! created for tests or embedding.
//!
//! # Cancellation caveat
//!
//! Cancellation is asynchronous with respect to the worker: a task that
//! was already dequeued for execution when `cancel` was called may fire
//! one final time.

use std::collections::{BinaryHeap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Timer identifier; 0 is reserved as invalid.
pub type TimerId = u32;

/// Timer group identifier; 0 is reserved as invalid.
pub type TimerGroupId = u32;

type Callback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Monotonic milliseconds since first use.
fn now_ms() -> u64 {
    static ORIGIN: OnceLock<Instant> = OnceLock::new();
    ORIGIN.get_or_init(Instant::now).elapsed().as_millis() as u64
}

struct TimerTask {
    next_run: u64,
    interval: u64,
    repeat: bool,
    callback: Callback,
}

/// Heap entry ordered so the earliest `next_run` pops first.
#[derive(PartialEq, Eq)]
struct HeapEntry {
    next_run: u64,
    id: TimerId,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the soonest first.
        other
            .next_run
            .cmp(&self.next_run)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

struct State {
    tasks: HashMap<TimerId, TimerTask>,
    heap: BinaryHeap<HeapEntry>,
    groups: HashMap<TimerGroupId, Vec<TimerId>>,
    task_to_group: HashMap<TimerId, TimerGroupId>,
    running: bool,
}

impl State {
    fn detach_from_group(&mut self, id: TimerId) {
        if let Some(group_id) = self.task_to_group.remove(&id) {
            if let Some(members) = self.groups.get_mut(&group_id) {
                members.retain(|&m| m != id);
                if members.is_empty() {
                    self.groups.remove(&group_id);
                }
            }
        }
    }
}

/// Min-heap timer scheduler with a single worker thread.
pub struct TimerScheduler {
    state: Mutex<State>,
    cv: Condvar,
    next_id: AtomicU32,
    next_group_id: AtomicU32,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TimerScheduler {
    /// Create a scheduler and start its worker thread.
    #[must_use]
    pub fn new() -> Arc<Self> {
        let scheduler = Arc::new(Self {
            state: Mutex::new(State {
                tasks: HashMap::new(),
                heap: BinaryHeap::new(),
                groups: HashMap::new(),
                task_to_group: HashMap::new(),
                running: true,
            }),
            cv: Condvar::new(),
            next_id: AtomicU32::new(1),
            next_group_id: AtomicU32::new(1),
            worker: Mutex::new(None),
        });

        let for_worker = Arc::clone(&scheduler);
        let handle = thread::Builder::new()
            .name("hmux-timer".into())
            .spawn(move || for_worker.run())
            .expect("failed to spawn timer worker thread");
        *scheduler.worker.lock() = Some(handle);

        log::info!("timer scheduler started");
        scheduler
    }

    /// The process-wide scheduler, started on first use.
    pub fn global() -> &'static Arc<TimerScheduler> {
        static GLOBAL: OnceLock<Arc<TimerScheduler>> = OnceLock::new();
        GLOBAL.get_or_init(TimerScheduler::new)
    }

    // ====================================================================
    // Task API
    // ====================================================================

    /// Schedule a one-shot callback after `delay_ms`.
    pub fn create_once<F>(&self, delay_ms: u64, callback: F) -> TimerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.create_timer(delay_ms, 0, false, Arc::new(callback))
    }

    /// Schedule a repeating callback: first fire after `delay_ms`, then
    /// every `interval_ms`.
    pub fn create_repeat<F>(&self, delay_ms: u64, interval_ms: u64, callback: F) -> TimerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.create_timer(delay_ms, interval_ms, true, Arc::new(callback))
    }

    fn create_timer(&self, delay_ms: u64, interval_ms: u64, repeat: bool, callback: Callback) -> TimerId {
        let mut id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if id == 0 {
            // Wrapped; 0 stays reserved as the invalid id.
            id = self.next_id.fetch_add(1, Ordering::Relaxed);
        }

        let next_run = now_ms() + delay_ms;
        let mut state = self.state.lock();
        state.tasks.insert(id, TimerTask { next_run, interval: interval_ms, repeat, callback });
        state.heap.push(HeapEntry { next_run, id });
        drop(state);

        self.cv.notify_one();
        id
    }

    /// Cancel a timer. Returns `false` for an unknown (or already fired)
    /// id.
    pub fn cancel(&self, id: TimerId) -> bool {
        if id == 0 {
            return false;
        }

        let mut state = self.state.lock();
        if state.tasks.remove(&id).is_none() {
            return false;
        }
        state.detach_from_group(id);
        // The heap entry stays behind; the worker skips it as stale.
        drop(state);

        self.cv.notify_one();
        true
    }

    /// Reschedule a timer relative to now. Returns `false` for an unknown
    /// id.
    pub fn modify(&self, id: TimerId, delay_ms: u64, interval_ms: u64, repeat: bool) -> bool {
        if id == 0 {
            return false;
        }

        let next_run = now_ms() + delay_ms;
        let mut state = self.state.lock();
        let Some(task) = state.tasks.get_mut(&id) else {
            return false;
        };
        task.next_run = next_run;
        task.interval = interval_ms;
        task.repeat = repeat;
        // Fresh entry; the worker discards the old one on next_run
        // mismatch.
        state.heap.push(HeapEntry { next_run, id });
        drop(state);

        self.cv.notify_one();
        true
    }

    /// Whether a timer is still scheduled.
    #[must_use]
    pub fn exists(&self, id: TimerId) -> bool {
        id != 0 && self.state.lock().tasks.contains_key(&id)
    }

    /// Number of live timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    /// Whether no timers are scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every timer and group.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.tasks.clear();
        state.heap.clear();
        state.groups.clear();
        state.task_to_group.clear();
        drop(state);

        self.cv.notify_one();
        log::info!("all timers cleared");
    }

    // ====================================================================
    // Group API
    // ====================================================================

    /// Create an empty timer group.
    pub fn create_group(&self) -> TimerGroupId {
        let mut id = self.next_group_id.fetch_add(1, Ordering::Relaxed);
        if id == 0 {
            id = self.next_group_id.fetch_add(1, Ordering::Relaxed);
        }
        self.state.lock().groups.insert(id, Vec::new());
        id
    }

    /// Add a timer to a group. A timer belongs to at most one group; it
    /// is moved if already grouped. Returns `false` when the timer or
    /// group does not exist.
    pub fn add_to_group(&self, group_id: TimerGroupId, timer_id: TimerId) -> bool {
        if group_id == 0 || timer_id == 0 {
            return false;
        }

        let mut state = self.state.lock();
        if !state.tasks.contains_key(&timer_id) || !state.groups.contains_key(&group_id) {
            return false;
        }

        if state.task_to_group.get(&timer_id) == Some(&group_id) {
            return true;
        }
        state.detach_from_group(timer_id);

        if let Some(members) = state.groups.get_mut(&group_id) {
            members.push(timer_id);
        }
        state.task_to_group.insert(timer_id, group_id);
        true
    }

    /// Remove a timer from a group without cancelling it.
    pub fn remove_from_group(&self, group_id: TimerGroupId, timer_id: TimerId) -> bool {
        if group_id == 0 || timer_id == 0 {
            return false;
        }

        let mut state = self.state.lock();
        if state.task_to_group.get(&timer_id) != Some(&group_id) {
            return false;
        }
        state.detach_from_group(timer_id);
        true
    }

    /// Cancel every timer in a group and drop the group.
    pub fn cancel_group(&self, group_id: TimerGroupId) -> bool {
        if group_id == 0 {
            return false;
        }

        let mut state = self.state.lock();
        let Some(members) = state.groups.remove(&group_id) else {
            return false;
        };
        for timer_id in members {
            state.tasks.remove(&timer_id);
            state.task_to_group.remove(&timer_id);
        }
        drop(state);

        self.cv.notify_one();
        true
    }

    /// Ids currently in a group.
    #[must_use]
    pub fn group_timers(&self, group_id: TimerGroupId) -> Vec<TimerId> {
        if group_id == 0 {
            return Vec::new();
        }
        self.state
            .lock()
            .groups
            .get(&group_id)
            .cloned()
            .unwrap_or_default()
    }

    // ====================================================================
    // Worker
    // ====================================================================

    /// Stop the worker and drop all state. Used by tests and embedders;
    /// the global scheduler lives for the whole process.
    pub fn shutdown(&self) {
        {
            let mut state = self.state.lock();
            if !state.running {
                return;
            }
            state.running = false;
        }
        self.cv.notify_all();

        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }

        self.clear();
        log::info!("timer scheduler stopped");
    }

    fn run(&self) {
        log::info!("timer worker thread started");

        loop {
            let mut state = self.state.lock();
            if !state.running {
                break;
            }

            let next_due = match state.heap.peek() {
                Some(top) => top.next_run,
                None => {
                    self.cv.wait(&mut state);
                    continue;
                }
            };

            let now = now_ms();
            if next_due > now {
                self.cv.wait_for(&mut state, Duration::from_millis(next_due - now));
                // Re-evaluate: the heap top may have changed, or the
                // deadline may have arrived.
                continue;
            }

            let Some(entry) = state.heap.pop() else {
                continue;
            };

            let Some(task) = state.tasks.get_mut(&entry.id) else {
                continue; // cancelled, stale entry
            };
            if task.next_run != entry.next_run {
                continue; // modified, stale entry
            }

            let callback = Arc::clone(&task.callback);
            if task.repeat && task.interval > 0 {
                let next_run = now + task.interval;
                task.next_run = next_run;
                state.heap.push(HeapEntry { next_run, id: entry.id });
            } else {
                state.tasks.remove(&entry.id);
                state.detach_from_group(entry.id);
            }
            drop(state);

            if catch_unwind(AssertUnwindSafe(|| (*callback)())).is_err() {
                log::error!("panic in timer callback (id {})", entry.id);
            }
        }

        log::info!("timer worker thread stopped");
    }
}

// ========================================================================
// Process-wide convenience functions
// ========================================================================

/// Schedule a one-shot callback on the global scheduler.
pub fn once<F>(delay_ms: u64, callback: F) -> TimerId
where
    F: Fn() + Send + Sync + 'static,
{
    TimerScheduler::global().create_once(delay_ms, callback)
}

/// Schedule a repeating callback on the global scheduler.
pub fn repeat<F>(delay_ms: u64, interval_ms: u64, callback: F) -> TimerId
where
    F: Fn() + Send + Sync + 'static,
{
    TimerScheduler::global().create_repeat(delay_ms, interval_ms, callback)
}

/// Cancel a timer on the global scheduler.
pub fn cancel(id: TimerId) -> bool {
    TimerScheduler::global().cancel(id)
}

/// Reschedule a timer on the global scheduler.
pub fn modify(id: TimerId, delay_ms: u64, interval_ms: u64, repeat: bool) -> bool {
    TimerScheduler::global().modify(id, delay_ms, interval_ms, repeat)
}

/// Whether a timer is still scheduled on the global scheduler.
#[must_use]
pub fn exists(id: TimerId) -> bool {
    TimerScheduler::global().exists(id)
}

/// Create a group on the global scheduler.
pub fn create_group() -> TimerGroupId {
    TimerScheduler::global().create_group()
}

/// Add a timer to a group on the global scheduler.
pub fn add_to_group(group_id: TimerGroupId, timer_id: TimerId) -> bool {
    TimerScheduler::global().add_to_group(group_id, timer_id)
}

/// Remove a timer from a group on the global scheduler.
pub fn remove_from_group(group_id: TimerGroupId, timer_id: TimerId) -> bool {
    TimerScheduler::global().remove_from_group(group_id, timer_id)
}

/// Cancel a whole group on the global scheduler.
pub fn cancel_group(group_id: TimerGroupId) -> bool {
    TimerScheduler::global().cancel_group(group_id)
}

/// Ids currently in a group on the global scheduler.
#[must_use]
pub fn group_timers(group_id: TimerGroupId) -> Vec<TimerId> {
    TimerScheduler::global().group_timers(group_id)
}
