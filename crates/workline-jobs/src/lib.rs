//! Job dispatch across a fixed pool of worker threads.
//!
//! A [`JobSystem`] owns the worker threads. Work is submitted through
//! [`JobQueue`]s, each of which tracks how many of its jobs are still
//! outstanding so callers can block until everything they submitted has run.
//!
//! # Usage
//!
//! ```ignore
//! let jobs = workline_jobs::JobSystem::start(JobSystemConfig::default())?;
//! let queue = jobs.queue();
//!
//! for chunk in chunks {
//!     queue.submit("compress", move || compress(chunk));
//! }
//! queue.wait_all();
//!
//! jobs.stop();
//! ```
//!
//! A job that panics aborts the process. Workers are never restarted, and
//! there is no per-job isolation.

mod job;
mod pool;
mod queue;
mod stats;

pub use job::JobName;
pub use pool::{JobSystem, JobSystemConfig};
pub use queue::JobQueue;
pub use stats::{ThreadStats, WorkStat, WorkerSummary};
