//! Per-frame scope statistics.
//!
//! A [`FrameProfiler`] aggregates nested scopes by name between two calls to
//! [`reset`](FrameProfiler::reset). Each scope contributes its full duration
//! to `total_ticks` and its duration minus that of the scopes nested directly
//! inside it to `self_ticks`. Nothing is written to disk.

use std::collections::HashMap;

use parking_lot::Mutex;
use workline_core::{ticks_to_micros, HighResClock};

use crate::events::current_thread_id;

/// Aggregated timing of every scope sharing one name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeStats {
    /// Scope name.
    pub name: String,
    /// Tick at which the first scope with this name began this frame.
    pub first_start_tick: u64,
    /// Times the scope was closed.
    pub calls: u64,
    /// Sum of scope durations, nested scopes included.
    pub total_ticks: u64,
    /// Sum of scope durations with directly nested scopes subtracted.
    pub self_ticks: u64,
}

/// Snapshot of one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Scopes in the order they were first closed.
    pub entries: Vec<ScopeStats>,
    /// Tick of the last reset.
    pub frame_start_tick: u64,
    /// Ticks elapsed since the last reset.
    pub total_ticks: u64,
    /// `total_ticks` in whole microseconds.
    pub total_micros: u64,
}

impl FrameStats {
    /// Entry for `name`, if a scope with that name closed this frame.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&ScopeStats> {
        self.entries.iter().find(|entry| entry.name == name)
    }
}

struct OpenScope {
    name: String,
    start_tick: u64,
    child_ticks: u64,
}

#[derive(Default)]
struct FrameState {
    frame_start_tick: u64,
    /// Open scopes per recording thread, innermost last.
    open: HashMap<u64, Vec<OpenScope>>,
    entries: Vec<ScopeStats>,
    index: HashMap<String, usize>,
}

impl FrameState {
    fn close(&mut self, thread_id: u64, end_tick: u64) -> bool {
        let Some(stack) = self.open.get_mut(&thread_id) else {
            return false;
        };
        let Some(scope) = stack.pop() else {
            return false;
        };

        let total = end_tick.saturating_sub(scope.start_tick);
        if let Some(parent) = stack.last_mut() {
            parent.child_ticks = parent.child_ticks.saturating_add(total);
        }
        if stack.is_empty() {
            self.open.remove(&thread_id);
        }

        let self_ticks = total.saturating_sub(scope.child_ticks);
        if let Some(&i) = self.index.get(&scope.name) {
            let entry = &mut self.entries[i];
            entry.calls += 1;
            entry.total_ticks = entry.total_ticks.saturating_add(total);
            entry.self_ticks = entry.self_ticks.saturating_add(self_ticks);
        } else {
            self.index.insert(scope.name.clone(), self.entries.len());
            self.entries.push(ScopeStats {
                name: scope.name,
                first_start_tick: scope.start_tick,
                calls: 1,
                total_ticks: total,
                self_ticks,
            });
        }
        true
    }
}

/// Collects nested scope timings for the current frame.
///
/// Scopes nest per thread: a scope opened on one thread is only ever the
/// parent of scopes opened later on that same thread.
pub struct FrameProfiler {
    state: Mutex<FrameState>,
}

impl Default for FrameProfiler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameProfiler {
    /// Create a profiler whose first frame starts now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FrameState {
                frame_start_tick: HighResClock::ticks(),
                ..FrameState::default()
            }),
        }
    }

    /// Open a scope on the calling thread.
    pub fn begin(&self, name: impl Into<String>) {
        self.begin_at(current_thread_id(), name.into(), HighResClock::ticks());
    }

    /// Close the innermost open scope on the calling thread.
    ///
    /// An unmatched call is logged and ignored.
    pub fn end(&self) {
        self.end_at(current_thread_id(), HighResClock::ticks());
    }

    /// Open a scope that closes when the guard drops.
    #[must_use]
    pub fn scope(&self, name: impl Into<String>) -> FrameScope<'_> {
        self.begin(name);
        FrameScope { profiler: self }
    }

    pub(crate) fn begin_at(&self, thread_id: u64, name: String, tick: u64) {
        self.state
            .lock()
            .open
            .entry(thread_id)
            .or_default()
            .push(OpenScope {
                name,
                start_tick: tick,
                child_ticks: 0,
            });
    }

    pub(crate) fn end_at(&self, thread_id: u64, tick: u64) {
        if !self.state.lock().close(thread_id, tick) {
            tracing::warn!(thread_id, "Frame scope ended without a matching begin");
        }
    }

    /// Aggregate of every scope closed since the last reset.
    #[must_use]
    pub fn stats(&self) -> FrameStats {
        self.stats_at(HighResClock::ticks())
    }

    pub(crate) fn stats_at(&self, now: u64) -> FrameStats {
        let state = self.state.lock();
        let total_ticks = now.saturating_sub(state.frame_start_tick);
        FrameStats {
            entries: state.entries.clone(),
            frame_start_tick: state.frame_start_tick,
            total_ticks,
            total_micros: ticks_to_micros(total_ticks, HighResClock::frequency()),
        }
    }

    /// Drop the closed scopes and start a new frame now.
    ///
    /// Scopes still open keep running and land in the new frame when closed.
    pub fn reset(&self) {
        self.reset_at(HighResClock::ticks());
    }

    pub(crate) fn reset_at(&self, tick: u64) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.index.clear();
        state.frame_start_tick = tick;
    }
}

impl std::fmt::Debug for FrameProfiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FrameProfiler")
            .field("frame_start_tick", &state.frame_start_tick)
            .field("entries", &state.entries.len())
            .finish_non_exhaustive()
    }
}

/// Guard returned by [`FrameProfiler::scope`].
#[must_use = "the scope closes as soon as the guard is dropped"]
pub struct FrameScope<'a> {
    profiler: &'a FrameProfiler,
}

impl Drop for FrameScope<'_> {
    fn drop(&mut self) {
        self.profiler.end();
    }
}
