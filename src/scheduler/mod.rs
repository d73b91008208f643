//! Task scheduler
//!
//! A cooperative, single-threaded task queue. All deferred-value callback
//! dispatch goes through this queue rather than executing inline, which is
//! what gives the primitive its asynchronous-delivery guarantee. Tests drive
//! the queue deterministically with [`Scheduler::run_to_completion`] instead
//! of relying on wall-clock delay.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::trace;

/// A unit of deferred work
pub type Task = Box<dyn FnOnce()>;

/// Result of running the scheduler to completion via `run_to_completion()`
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    /// Total number of tasks that were dequeued and processed
    pub tasks_processed: usize,
    /// Number of ticks (each tick = drain up to the task budget)
    pub ticks: usize,
}

/// Runtime statistics for the scheduler
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Total tasks processed across all ticks
    pub total_tasks: u64,
    /// Total number of ticks
    pub total_ticks: u64,
    /// Maximum tasks drained in a single tick
    pub max_tasks_per_tick: u64,
}

struct TaskQueue {
    tasks: VecDeque<Task>,
    /// Maximum tasks to drain per tick (starvation protection)
    max_tasks_per_tick: usize,
    stats: SchedulerStats,
}

/// A clonable handle to a single-threaded task queue
///
/// Cloning the handle shares the underlying queue; a deferred value and the
/// code that drains its callbacks hold clones of the same scheduler.
#[derive(Clone)]
pub struct Scheduler {
    queue: Rc<RefCell<TaskQueue>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Create a new empty scheduler
    pub fn new() -> Self {
        Self {
            queue: Rc::new(RefCell::new(TaskQueue {
                tasks: VecDeque::new(),
                max_tasks_per_tick: 10_000,
                stats: SchedulerStats::default(),
            })),
        }
    }

    /// Enqueue a task at the back of the queue
    pub fn schedule(&self, task: impl FnOnce() + 'static) {
        let mut queue = self.queue.borrow_mut();
        queue.tasks.push_back(Box::new(task));
        trace!(pending = queue.tasks.len(), "task scheduled");
    }

    /// Check if there are pending tasks
    pub fn has_pending_tasks(&self) -> bool {
        !self.queue.borrow().tasks.is_empty()
    }

    /// Number of tasks currently queued
    pub fn pending_count(&self) -> usize {
        self.queue.borrow().tasks.len()
    }

    /// Run one tick: drain tasks up to the per-tick budget.
    ///
    /// Returns the number of tasks processed. Tasks scheduled by running
    /// tasks land at the back of the queue and count against the same
    /// budget within this tick.
    pub fn run_tick(&self) -> usize {
        let budget = self.queue.borrow().max_tasks_per_tick;
        let mut count = 0usize;

        while count < budget {
            // Pop under the borrow, run outside it: a task may schedule
            // more tasks or settle other deferreds.
            let task = self.queue.borrow_mut().tasks.pop_front();
            match task {
                Some(task) => {
                    task();
                    count += 1;
                }
                None => break,
            }
        }

        let mut queue = self.queue.borrow_mut();
        queue.stats.total_ticks += 1;
        queue.stats.total_tasks += count as u64;
        if count as u64 > queue.stats.max_tasks_per_tick {
            queue.stats.max_tasks_per_tick = count as u64;
        }
        trace!(processed = count, remaining = queue.tasks.len(), "tick complete");
        count
    }

    /// Run ticks until the queue is empty.
    ///
    /// Tasks scheduled while draining (including re-entrantly from inside
    /// running tasks) are processed before this returns.
    pub fn run_to_completion(&self) -> RunResult {
        let mut result = RunResult::default();
        while self.has_pending_tasks() {
            result.tasks_processed += self.run_tick();
            result.ticks += 1;
        }
        result
    }

    /// Set the maximum number of tasks to drain per tick (starvation protection)
    pub fn set_task_budget(&self, limit: usize) {
        self.queue.borrow_mut().max_tasks_per_tick = limit;
    }

    /// Get the current per-tick task budget
    pub fn task_budget(&self) -> usize {
        self.queue.borrow().max_tasks_per_tick
    }

    /// Get a snapshot of the current scheduler statistics
    pub fn stats(&self) -> SchedulerStats {
        self.queue.borrow().stats.clone()
    }

    /// Reset all scheduler statistics to zero
    pub fn reset_stats(&self) {
        self.queue.borrow_mut().stats = SchedulerStats::default();
    }
}
