//! Profiler entry types.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

/// Stable unsigned id of the calling thread, assigned on first use.
#[must_use]
pub fn current_thread_id() -> u64 {
    THREAD_ID.with(|id| *id)
}

/// A single timed, named interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileEntry {
    /// Interval name.
    pub name: String,
    /// Clock tick at the start of the interval.
    pub begin_tick: u64,
    /// Clock tick at the end of the interval.
    pub end_tick: u64,
    /// Id of the thread that recorded the interval.
    pub thread_id: u64,
}

impl ProfileEntry {
    /// Create an entry attributed to the calling thread.
    #[must_use]
    pub fn new(name: impl Into<String>, begin_tick: u64, end_tick: u64) -> Self {
        Self {
            name: name.into(),
            begin_tick,
            end_tick,
            thread_id: current_thread_id(),
        }
    }

    /// Create an entry attributed to an explicit thread id.
    #[must_use]
    pub fn on_thread(name: impl Into<String>, begin_tick: u64, end_tick: u64, thread_id: u64) -> Self {
        Self {
            name: name.into(),
            begin_tick,
            end_tick,
            thread_id,
        }
    }

    /// Duration in clock ticks.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.end_tick.saturating_sub(self.begin_tick)
    }
}

/// Result of a completed export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    /// Number of entries written to the trace.
    pub entries_written: u64,
    /// Trace file.
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_id_is_stable_per_thread() {
        let here = current_thread_id();
        assert_eq!(here, current_thread_id());

        let there = std::thread::spawn(current_thread_id).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn entry_captures_calling_thread() {
        let entry = ProfileEntry::new("load", 10, 25);
        assert_eq!(entry.thread_id, current_thread_id());
        assert_eq!(entry.ticks(), 15);
    }
}
