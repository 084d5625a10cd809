//! Cancellable periodic tasks on the host's event loop.
//!
//! Tasks are `!Send` closures: they run on the same single thread as editor
//! and engine callbacks, never concurrently with them.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

/// Returned by a periodic task to keep or stop its timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Stop,
}

/// A periodic task.
pub type RepeatingTask = Box<dyn FnMut() -> TickControl>;

/// Cancels a scheduled task. Cancelling is idempotent.
#[derive(Clone, Debug, Default)]
pub struct TimerHandle {
    cancelled: Rc<Cell<bool>>,
}

impl TimerHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// Something that can run a task every `period`.
pub trait Scheduler {
    fn schedule_repeating(&self, period: Duration, task: RepeatingTask) -> TimerHandle;
}

struct ManualTask {
    period: Duration,
    next_due: Duration,
    handle: TimerHandle,
    task: RepeatingTask,
}

/// Deterministic scheduler driven by [`ManualScheduler::advance`].
///
/// Time only moves when the caller says so, which makes tick-by-tick
/// behavior testable without a runtime.
#[derive(Default)]
pub struct ManualScheduler {
    now: Cell<Duration>,
    tasks: RefCell<Vec<ManualTask>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now.get()
    }

    /// Number of live (uncancelled) tasks.
    pub fn active_tasks(&self) -> usize {
        self.tasks
            .borrow()
            .iter()
            .filter(|t| !t.handle.is_cancelled())
            .count()
    }

    /// Move time forward by `by`, running every tick that falls due, in
    /// deadline order.
    pub fn advance(&self, by: Duration) {
        let target = self.now.get() + by;
        loop {
            // Tasks are taken out while they run so a task may schedule or
            // cancel others without a double borrow.
            let next = {
                let mut tasks = self.tasks.borrow_mut();
                tasks.retain(|t| !t.handle.is_cancelled());
                let due = tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.next_due <= target)
                    .min_by_key(|(_, t)| t.next_due)
                    .map(|(i, _)| i);
                due.map(|i| tasks.remove(i))
            };

            let Some(mut entry) = next else { break };
            self.now.set(entry.next_due);
            if entry.handle.is_cancelled() {
                continue;
            }
            match (entry.task)() {
                TickControl::Continue if !entry.handle.is_cancelled() => {
                    entry.next_due += entry.period;
                    self.tasks.borrow_mut().push(entry);
                }
                _ => entry.handle.cancel(),
            }
        }
        self.now.set(target);
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&self, period: Duration, task: RepeatingTask) -> TimerHandle {
        let handle = TimerHandle::new();
        self.tasks.borrow_mut().push(ManualTask {
            period,
            next_due: self.now.get() + period,
            handle: handle.clone(),
            task,
        });
        handle
    }
}

/// Tokio-backed scheduler for single-threaded hosts.
///
/// Tasks are spawned with [`tokio::task::spawn_local`], so scheduling must
/// happen inside a [`tokio::task::LocalSet`].
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalScheduler;

impl Scheduler for LocalScheduler {
    fn schedule_repeating(&self, period: Duration, mut task: RepeatingTask) -> TimerHandle {
        let handle = TimerHandle::new();
        let cancelled = handle.clone();
        tokio::task::spawn_local(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                if cancelled.is_cancelled() {
                    break;
                }
                if task() == TickControl::Stop {
                    cancelled.cancel();
                    break;
                }
            }
        });
        handle
    }
}
