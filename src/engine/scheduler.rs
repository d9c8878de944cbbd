//! Update Scheduler - coalesces update requests into one microtask flush.
//!
//! Setters and instance handles only ever call [`Scheduler::enqueue`]. The
//! first request of a synchronous turn asks the caller to spawn a flush on
//! the executor; later requests in the same turn just join the pending set.
//! The flush takes the whole set at once, so everything requested before it
//! runs is handled by that single flush.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::future::Future;

use futures::executor::LocalSpawner;
use futures::task::LocalSpawnExt;
use tracing::{trace, warn};

use crate::types::FiberId;

pub(crate) struct Scheduler {
    pending: RefCell<BTreeSet<FiberId>>,
    /// A flush task is spawned and has not started yet.
    scheduled: Cell<bool>,
    spawner: LocalSpawner,
}

impl Scheduler {
    pub fn new(spawner: LocalSpawner) -> Self {
        Self {
            pending: RefCell::new(BTreeSet::new()),
            scheduled: Cell::new(false),
            spawner,
        }
    }

    /// Add `instance` to the pending set.
    ///
    /// Returns true when no flush is scheduled yet and the caller must spawn
    /// one.
    pub fn enqueue(&self, instance: FiberId) -> bool {
        let inserted = self.pending.borrow_mut().insert(instance);
        trace!(%instance, inserted, "update requested");
        !self.scheduled.replace(true)
    }

    /// Take every pending instance, allowing the next request to schedule a
    /// new flush.
    pub fn take(&self) -> Vec<FiberId> {
        self.scheduled.set(false);
        std::mem::take(&mut *self.pending.borrow_mut())
            .into_iter()
            .collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.borrow().is_empty()
    }

    /// Run `task` on the renderer's executor.
    pub fn spawn(&self, task: impl Future<Output = ()> + 'static) {
        if let Err(error) = self.spawner.spawn_local(task) {
            warn!(%error, "executor is shut down, task dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::LocalPool;
    use std::rc::Rc;

    #[test]
    fn test_one_flush_per_turn() {
        let pool = LocalPool::new();
        let scheduler = Scheduler::new(pool.spawner());

        assert!(scheduler.enqueue(FiberId(3)));
        assert!(!scheduler.enqueue(FiberId(1)));
        assert!(!scheduler.enqueue(FiberId(3)));

        assert_eq!(scheduler.take(), vec![FiberId(1), FiberId(3)]);
        assert!(!scheduler.has_pending());
        assert!(scheduler.enqueue(FiberId(2)));
    }

    #[test]
    fn test_spawned_tasks_run_on_drain() {
        let mut pool = LocalPool::new();
        let scheduler = Scheduler::new(pool.spawner());
        let ran = Rc::new(Cell::new(false));

        let flag = ran.clone();
        scheduler.spawn(async move { flag.set(true) });
        assert!(!ran.get());

        pool.run_until_stalled();
        assert!(ran.get());
    }
}
