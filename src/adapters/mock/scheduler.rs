//! Fake-clock scheduler for deterministic timer tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::Instant;

use crate::traits::{Scheduler, TimerHandle};

/// Upper bound on tasks run by one `run_until_idle` call.
const MAX_IDLE_STEPS: usize = 100_000;

struct Queue {
    now: Instant,
    seq: u64,
    tasks: BTreeMap<(Instant, u64), BoxFuture<'static, ()>>,
}

/// Scheduler whose time only moves through [`advance`](Self::advance) and
/// [`run_until_idle`](Self::run_until_idle).
///
/// Due tasks run in deadline order (then scheduling order) on the caller's
/// task. A task may schedule further tasks; those run in the same call if
/// they fall due.
#[derive(Clone)]
pub struct ManualScheduler {
    queue: Arc<Mutex<Queue>>,
}

fn lock(queue: &Mutex<Queue>) -> MutexGuard<'_, Queue> {
    queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(Queue {
                now: Instant::now(),
                seq: 0,
                tasks: BTreeMap::new(),
            })),
        }
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        lock(&self.queue).tasks.len()
    }

    /// Time elapsed on this scheduler's clock since `since`.
    pub fn elapsed_since(&self, since: Instant) -> Duration {
        lock(&self.queue).now.saturating_duration_since(since)
    }

    /// Move time forward by `by`, running every task that falls due.
    /// Returns the number of tasks run.
    pub async fn advance(&self, by: Duration) -> usize {
        let target = lock(&self.queue).now + by;
        let mut ran = 0;
        while let Some(task) = self.pop_due(Some(target)) {
            task.await;
            ran += 1;
        }
        lock(&self.queue).now = target;
        ran
    }

    /// Run tasks, jumping time to each deadline, until none remain.
    /// Returns the number of tasks run.
    pub async fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while ran < MAX_IDLE_STEPS {
            match self.pop_due(None) {
                Some(task) => {
                    task.await;
                    ran += 1;
                }
                None => break,
            }
        }
        ran
    }

    fn pop_due(&self, until: Option<Instant>) -> Option<BoxFuture<'static, ()>> {
        let mut queue = lock(&self.queue);
        let key = *queue.tasks.keys().next()?;
        if until.is_some_and(|limit| key.0 > limit) {
            return None;
        }
        let task = queue.tasks.remove(&key)?;
        if key.0 > queue.now {
            queue.now = key.0;
        }
        Some(task)
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Instant {
        lock(&self.queue).now
    }

    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) -> TimerHandle {
        let key = {
            let mut queue = lock(&self.queue);
            queue.seq += 1;
            let key = (queue.now + delay, queue.seq);
            queue.tasks.insert(key, task);
            key
        };
        let weak: Weak<Mutex<Queue>> = Arc::downgrade(&self.queue);
        TimerHandle::new(move || {
            if let Some(queue) = weak.upgrade() {
                lock(&queue).tasks.remove(&key);
            }
        })
    }
}
