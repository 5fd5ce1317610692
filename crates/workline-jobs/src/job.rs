//! Units of deferred work.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use workline_core::fatal;
use workline_core::HighResClock;

use crate::queue::PendingCounter;
use crate::stats::WorkStat;

/// Name attached to a job. Static strings are not copied.
pub type JobName = Cow<'static, str>;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// A named deferred call.
///
/// The job owns its closure and everything the closure captured. Running it
/// consumes the job, so the captured state is released once the call returns.
pub(crate) struct Job {
    name: JobName,
    task: Task,
    pending: Arc<PendingCounter>,
}

impl Job {
    pub(crate) fn new(name: JobName, task: Task, pending: Arc<PendingCounter>) -> Self {
        Self {
            name,
            task,
            pending,
        }
    }

    /// Name the job was submitted with.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the job, hand its timing to `record`, then mark it complete.
    ///
    /// The stat is recorded before the owning queue's counter drops, so a
    /// barrier that has returned always sees the stats of the jobs it waited on.
    pub(crate) fn execute(self, record: impl FnOnce(WorkStat)) {
        let Self {
            name,
            task,
            pending,
        } = self;

        let start_tick = HighResClock::ticks();
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
            job_panicked(&name, payload.as_ref());
        }
        let end_tick = HighResClock::ticks();

        record(WorkStat {
            name,
            start_tick,
            end_tick,
        });
        pending.complete();
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name())
            .field("task", &"<closure>")
            .finish()
    }
}

fn job_panicked(name: &str, payload: &(dyn Any + Send)) -> ! {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "<non-string panic payload>".to_string());
    fatal::abort_with(&format!("Job '{name}' panicked\nMessage: {message}"))
}
