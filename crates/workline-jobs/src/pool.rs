//! Fixed pool of worker threads.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::deque::{Injector, Steal};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info};
use workline_core::{Error, Result};

use crate::job::Job;
use crate::queue::JobQueue;
use crate::stats::ThreadStats;

static NEXT_SYSTEM_ID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    /// (system id, worker index) when the current thread is a pool worker.
    static WORKER_SLOT: Cell<Option<(usize, usize)>> = const { Cell::new(None) };
}

/// Configuration for a [`JobSystem`].
#[derive(Debug, Clone)]
pub struct JobSystemConfig {
    /// Number of dedicated worker threads. Zero is allowed: jobs then only run
    /// on threads that wait on a queue.
    pub worker_count: usize,
    /// Prefix for worker thread names; the worker index is appended.
    pub thread_name: String,
    /// Upper bound on how long an idle worker or a waiting caller parks
    /// before polling the queue again.
    pub idle_wait: Duration,
}

impl Default for JobSystemConfig {
    fn default() -> Self {
        let cores = thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        Self {
            // Leave one core for the thread that submits work.
            worker_count: cores.saturating_sub(1).max(1),
            thread_name: "job-worker".to_string(),
            idle_wait: Duration::from_millis(1),
        }
    }
}

/// State shared by the workers and every queue of one job system.
pub(crate) struct Shared {
    id: usize,
    injector: Injector<Job>,
    sleep_lock: Mutex<()>,
    work_available: Condvar,
    shutdown: AtomicBool,
    stats: ThreadStats,
    idle_wait: Duration,
}

impl Shared {
    pub(crate) fn push(&self, job: Job) {
        self.injector.push(job);
        let _guard = self.sleep_lock.lock();
        self.work_available.notify_one();
    }

    pub(crate) fn pop(&self) -> Option<Job> {
        loop {
            match self.injector.steal() {
                Steal::Success(job) => return Some(job),
                Steal::Empty => return None,
                Steal::Retry => continue,
            }
        }
    }

    /// Run a job on the current thread, recording its timing if this thread
    /// is one of our workers.
    pub(crate) fn run(&self, job: Job) {
        let worker = WORKER_SLOT
            .with(Cell::get)
            .and_then(|(system, index)| (system == self.id).then_some(index));
        job.execute(|stat| {
            if let Some(index) = worker {
                self.stats.record(index, stat);
            }
        });
    }

    pub(crate) const fn idle_wait(&self) -> Duration {
        self.idle_wait
    }

    fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Park until work may be available or shutdown is signaled.
    fn wait_for_work(&self) {
        let mut guard = self.sleep_lock.lock();
        if self.injector.is_empty() && !self.is_shutting_down() {
            self.work_available.wait_for(&mut guard, self.idle_wait);
        }
    }
}

/// A fixed set of worker threads draining job queues.
///
/// Stopping drains: workers exit only once the shared queue is empty, so
/// every job submitted before [`stop`](Self::stop) runs.
pub struct JobSystem {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    stopped: bool,
}

impl JobSystem {
    /// Spawn the worker threads.
    pub fn start(config: JobSystemConfig) -> Result<Self> {
        let shared = Arc::new(Shared {
            id: NEXT_SYSTEM_ID.fetch_add(1, Ordering::Relaxed),
            injector: Injector::new(),
            sleep_lock: Mutex::new(()),
            work_available: Condvar::new(),
            shutdown: AtomicBool::new(false),
            stats: ThreadStats::new(config.worker_count),
            idle_wait: config.idle_wait,
        });

        let mut system = Self {
            shared,
            workers: Vec::with_capacity(config.worker_count),
            stopped: false,
        };

        for index in 0..config.worker_count {
            let name = format!("{}-{index}", config.thread_name);
            let shared = Arc::clone(&system.shared);
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || Self::worker_loop(&shared, index))
                // Dropping `system` joins the workers spawned so far.
                .map_err(|source| Error::Spawn { name, source })?;
            system.workers.push(handle);
        }

        info!(workers = config.worker_count, "Job system started");
        Ok(system)
    }

    /// Start with `worker_count` workers and default settings otherwise.
    pub fn with_workers(worker_count: usize) -> Result<Self> {
        Self::start(JobSystemConfig {
            worker_count,
            ..JobSystemConfig::default()
        })
    }

    fn worker_loop(shared: &Shared, index: usize) {
        WORKER_SLOT.with(|slot| slot.set(Some((shared.id, index))));
        debug!(worker = index, "Worker started");

        loop {
            if let Some(job) = shared.pop() {
                shared.run(job);
                continue;
            }
            if shared.is_shutting_down() {
                break;
            }
            shared.wait_for_work();
        }

        WORKER_SLOT.with(|slot| slot.set(None));
        debug!(worker = index, "Worker stopped");
    }

    /// Create a new queue with its own outstanding count.
    #[must_use]
    pub fn queue(&self) -> JobQueue {
        JobQueue::new(Arc::clone(&self.shared))
    }

    /// Number of worker threads.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Per-worker timing log.
    #[must_use]
    pub fn thread_stats(&self) -> &ThreadStats {
        &self.shared.stats
    }

    /// Drain remaining jobs, then join every worker.
    ///
    /// Call once no other thread is still submitting.
    pub fn stop(mut self) {
        self.shutdown_workers();
    }

    fn shutdown_workers(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        self.shared.shutdown.store(true, Ordering::Release);
        {
            let _guard = self.shared.sleep_lock.lock();
            self.shared.work_available.notify_all();
        }

        for (index, handle) in self.workers.drain(..).enumerate() {
            if handle.join().is_err() {
                error!(worker = index, "Worker thread panicked");
            }
        }

        // Anything the workers left behind, or everything when there are none.
        let mut leftover = 0usize;
        while let Some(job) = self.shared.pop() {
            self.shared.run(job);
            leftover += 1;
        }
        if leftover > 0 {
            debug!(jobs = leftover, "Ran queued jobs on the stopping thread");
        }

        info!("Job system stopped");
    }
}

impl Drop for JobSystem {
    fn drop(&mut self) {
        self.shutdown_workers();
    }
}

impl std::fmt::Debug for JobSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSystem")
            .field("workers", &self.workers.len())
            .field("stats", &self.shared.stats)
            .finish()
    }
}
