//! Per-worker job timing.

use parking_lot::Mutex;
use workline_core::HighResClock;

use crate::job::JobName;

/// Timing of a single job execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkStat {
    /// Name the job was submitted with.
    pub name: JobName,
    /// Clock tick taken just before the job ran.
    pub start_tick: u64,
    /// Clock tick taken just after the job returned.
    pub end_tick: u64,
}

impl WorkStat {
    /// Duration in clock ticks.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.end_tick.saturating_sub(self.start_tick)
    }

    /// Duration in milliseconds.
    #[must_use]
    pub fn millis(&self) -> f64 {
        HighResClock::millis(self.start_tick, self.end_tick)
    }
}

/// Aggregate of one worker's stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Worker index.
    pub worker: usize,
    /// Jobs executed.
    pub jobs: usize,
    /// Sum of job durations in ticks.
    pub busy_ticks: u64,
}

impl WorkerSummary {
    /// Total busy time in milliseconds.
    #[must_use]
    pub fn busy_millis(&self) -> f64 {
        HighResClock::millis(0, self.busy_ticks)
    }
}

/// Append-only timing log, one slot per worker.
///
/// Each worker appends only to its own slot, so the slot locks are never
/// contended while jobs run. Reads and resets are only meaningful while the
/// pool is quiesced (after a `wait_all`); otherwise they observe a moving
/// target.
pub struct ThreadStats {
    slots: Vec<Mutex<Vec<WorkStat>>>,
}

impl ThreadStats {
    pub(crate) fn new(workers: usize) -> Self {
        Self {
            slots: (0..workers).map(|_| Mutex::new(Vec::new())).collect(),
        }
    }

    pub(crate) fn record(&self, worker: usize, stat: WorkStat) {
        if let Some(slot) = self.slots.get(worker) {
            slot.lock().push(stat);
        }
    }

    /// Number of worker slots.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.slots.len()
    }

    /// Clear every worker's log.
    pub fn reset(&self) {
        for slot in &self.slots {
            slot.lock().clear();
        }
    }

    /// Copy of every worker's log, indexed by worker.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Vec<WorkStat>> {
        self.slots.iter().map(|slot| slot.lock().clone()).collect()
    }

    /// Job count and busy time per worker.
    #[must_use]
    pub fn summaries(&self) -> Vec<WorkerSummary> {
        self.slots
            .iter()
            .enumerate()
            .map(|(worker, slot)| {
                let stats = slot.lock();
                WorkerSummary {
                    worker,
                    jobs: stats.len(),
                    busy_ticks: stats.iter().map(WorkStat::ticks).sum(),
                }
            })
            .collect()
    }

    /// Total jobs recorded across all workers.
    #[must_use]
    pub fn total_jobs(&self) -> usize {
        self.slots.iter().map(|slot| slot.lock().len()).sum()
    }
}

impl std::fmt::Debug for ThreadStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadStats")
            .field("workers", &self.workers())
            .field("total_jobs", &self.total_jobs())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(name: &'static str, start_tick: u64, end_tick: u64) -> WorkStat {
        WorkStat {
            name: name.into(),
            start_tick,
            end_tick,
        }
    }

    #[test]
    fn record_and_summarize() {
        let stats = ThreadStats::new(2);
        stats.record(0, stat("a", 10, 30));
        stats.record(0, stat("b", 30, 35));
        stats.record(1, stat("c", 0, 100));

        let summaries = stats.summaries();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].jobs, 2);
        assert_eq!(summaries[0].busy_ticks, 25);
        assert_eq!(summaries[1].jobs, 1);
        assert_eq!(summaries[1].busy_ticks, 100);
        assert_eq!(stats.total_jobs(), 3);
    }

    #[test]
    fn snapshot_preserves_order() {
        let stats = ThreadStats::new(1);
        stats.record(0, stat("first", 0, 1));
        stats.record(0, stat("second", 1, 2));

        let snapshot = stats.snapshot();
        let names: Vec<&str> = snapshot[0].iter().map(|s| &*s.name).collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[test]
    fn reset_clears_every_slot() {
        let stats = ThreadStats::new(3);
        for worker in 0..3 {
            stats.record(worker, stat("job", 0, 1));
        }
        stats.reset();

        assert_eq!(stats.total_jobs(), 0);
        assert_eq!(stats.workers(), 3);
    }

    #[test]
    fn duration_never_underflows() {
        assert_eq!(stat("x", 50, 20).ticks(), 0);
    }
}
