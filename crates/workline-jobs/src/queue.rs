//! Job submission and completion barriers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use workline_core::invariant;

use crate::job::{Job, JobName};
use crate::pool::Shared;

/// Count of jobs submitted to a queue that have not finished running.
///
/// Incremented before a job is enqueued and decremented only after its call
/// has returned, so zero means every submitted job has fully completed.
pub(crate) struct PendingCounter {
    count: AtomicUsize,
    lock: Mutex<()>,
    drained: Condvar,
}

impl PendingCounter {
    pub(crate) const fn new() -> Self {
        Self {
            count: AtomicUsize::new(0),
            lock: Mutex::new(()),
            drained: Condvar::new(),
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub(crate) fn increment(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn complete(&self) {
        let previous = self.count.fetch_sub(1, Ordering::AcqRel);
        invariant!(previous > 0, "job completed on a queue with nothing pending");
        if previous == 1 {
            let _guard = self.lock.lock();
            self.drained.notify_all();
        }
    }

    /// Park until the count may have reached zero, or `timeout` passes.
    pub(crate) fn wait_for(&self, timeout: Duration) {
        let mut guard = self.lock.lock();
        if self.count() != 0 {
            self.drained.wait_for(&mut guard, timeout);
        }
    }
}

/// Handle for submitting jobs and waiting on them.
///
/// Clones share the same outstanding count. Jobs from every queue created by
/// a [`JobSystem`](crate::JobSystem) are drained by the same workers.
#[derive(Clone)]
pub struct JobQueue {
    pending: Arc<PendingCounter>,
    shared: Arc<Shared>,
}

impl JobQueue {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            pending: Arc::new(PendingCounter::new()),
            shared,
        }
    }

    /// Create a queue with its own outstanding count on the same workers.
    ///
    /// A job cannot wait on the queue it was submitted to, because it counts
    /// itself as outstanding. Jobs that fan out and wait should submit to a
    /// sibling queue instead.
    #[must_use]
    pub fn sibling(&self) -> Self {
        Self::new(Arc::clone(&self.shared))
    }

    /// Submit a job. Never blocks; callable from any thread, including workers.
    pub fn submit<F>(&self, name: impl Into<JobName>, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pending.increment();
        let job = Job::new(name.into(), Box::new(task), Arc::clone(&self.pending));
        self.shared.push(job);
    }

    /// Submit a function together with the argument it will be called with.
    ///
    /// Ownership of `args` moves into the job and is released after the call.
    pub fn submit_with<A, F>(&self, name: impl Into<JobName>, task: F, args: A)
    where
        A: Send + 'static,
        F: FnOnce(A) + Send + 'static,
    {
        self.submit(name, move || task(args));
    }

    /// Block until every job submitted to this queue has finished.
    ///
    /// The caller helps while it waits: queued jobs are popped and run on the
    /// calling thread, so a worker waiting here still makes progress even when
    /// every other worker is busy. When nothing is queued it parks briefly and
    /// polls again, since jobs may keep arriving from other producers.
    pub fn wait_all(&self) {
        while !self.is_idle() {
            if let Some(job) = self.shared.pop() {
                self.shared.run(job);
                continue;
            }
            self.pending.wait_for(self.shared.idle_wait());
        }
    }

    /// Snapshot of whether nothing is outstanding. May be stale immediately.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending.count() == 0
    }

    /// Snapshot of the number of outstanding jobs.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.count()
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn counter_tracks_completion() {
        let counter = PendingCounter::new();
        counter.increment();
        counter.increment();
        assert_eq!(counter.count(), 2);
        counter.complete();
        assert_eq!(counter.count(), 1);
        counter.complete();
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn wait_returns_immediately_when_drained() {
        let counter = PendingCounter::new();
        // Would block for an hour if the zero check were skipped.
        counter.wait_for(Duration::from_secs(3600));
    }

    #[test]
    fn completion_wakes_waiter() {
        let counter = Arc::new(PendingCounter::new());
        counter.increment();

        let completer = {
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                counter.complete();
            })
        };

        while counter.count() != 0 {
            counter.wait_for(Duration::from_secs(5));
        }
        completer.join().unwrap();
    }
}
