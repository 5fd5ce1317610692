//! Profiler context object.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use workline_core::HighResClock;

use crate::error::{ProfilerError, Result};
use crate::events::{ExportSummary, ProfileEntry};
use crate::exporter::TraceExporter;
use crate::macros::ScopeGuard;
use crate::ring_buffer::{self, Producer};

/// Default ring buffer capacity.
pub const DEFAULT_CAPACITY: usize = 256;

/// Default trace file.
pub const DEFAULT_OUTPUT_PATH: &str = "profile.json";

/// How often a blocked push checks that the exporter is still alive.
const LIVENESS_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for a [`Profiler`].
#[derive(Debug, Clone)]
pub struct ProfilerConfig {
    /// Trace file, created or truncated on init.
    pub output_path: PathBuf,
    /// Ring buffer capacity (rounded up to a power of two).
    pub capacity: usize,
    /// How long the exporter sleeps when the buffer is empty.
    pub idle_sleep: Duration,
    /// How long a recording thread backs off on a full buffer before the
    /// entry is reported as dropped.
    pub push_timeout: Duration,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            capacity: DEFAULT_CAPACITY,
            idle_sleep: Duration::from_millis(1),
            push_timeout: Duration::from_secs(1),
        }
    }
}

/// Records timed intervals and exports them to a trace file.
///
/// Any number of threads may record through a shared reference. They are
/// funneled into the ring buffer's single producer by a mutex; the exporter
/// thread is the single consumer.
pub struct Profiler {
    /// `None` once shut down.
    producer: Mutex<Option<Producer<ProfileEntry>>>,
    exporter: Mutex<Option<TraceExporter>>,
    output_path: PathBuf,
    push_timeout: Duration,
}

impl Profiler {
    /// Create the trace file and start the exporter thread.
    pub fn init(config: ProfilerConfig) -> Result<Self> {
        let (producer, consumer) = ring_buffer::channel(config.capacity);
        let exporter = TraceExporter::start(
            &config.output_path,
            consumer,
            HighResClock::frequency(),
            config.idle_sleep,
        )?;

        Ok(Self {
            producer: Mutex::new(Some(producer)),
            exporter: Mutex::new(Some(exporter)),
            output_path: config.output_path,
            push_timeout: config.push_timeout,
        })
    }

    /// Record a named interval measured on the calling thread.
    pub fn record(&self, name: impl Into<String>, begin_tick: u64, end_tick: u64) -> Result<()> {
        self.push(ProfileEntry::new(name, begin_tick, end_tick))
    }

    /// Queue an entry for export.
    ///
    /// Blocks with backoff while the buffer is full; gives up after the
    /// configured push timeout, or as soon as the exporter thread is found
    /// to have exited.
    pub fn push(&self, mut entry: ProfileEntry) -> Result<()> {
        let mut guard = self.producer.lock();
        let Some(producer) = guard.as_mut() else {
            return Err(ProfilerError::Stopped);
        };

        let deadline = Instant::now() + self.push_timeout;
        loop {
            match producer.try_push(entry) {
                Ok(()) => return Ok(()),
                Err(rejected) => entry = rejected,
            }

            if !self.exporter_running() {
                return Err(ProfilerError::ExporterStopped { name: entry.name });
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(name = %entry.name, "Profile queue full, entry dropped");
                return Err(ProfilerError::QueueFull { name: entry.name });
            }

            match producer.push_timeout(entry, (deadline - now).min(LIVENESS_INTERVAL)) {
                Ok(()) => return Ok(()),
                Err(rejected) => entry = rejected,
            }
        }
    }

    fn exporter_running(&self) -> bool {
        self.exporter
            .lock()
            .as_ref()
            .is_some_and(TraceExporter::is_running)
    }

    /// Start timing a scope. The interval is recorded when the guard drops.
    #[inline]
    #[must_use]
    pub fn scope(&self, name: impl Into<String>) -> ScopeGuard<'_> {
        ScopeGuard::new(self, name.into())
    }

    /// Trace file being written.
    #[must_use]
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Check if entries are still accepted.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.producer.lock().is_some()
    }

    /// Stop accepting entries, flush everything buffered and close the trace.
    ///
    /// Call after every thread that records has finished (stop the job
    /// system first); later records return [`ProfilerError::Stopped`].
    pub fn shutdown(&self) -> Result<ExportSummary> {
        self.producer.lock().take();
        let exporter = self
            .exporter
            .lock()
            .take()
            .ok_or(ProfilerError::Stopped)?;

        let entries_written = exporter.stop()?;
        Ok(ExportSummary {
            entries_written,
            path: self.output_path.clone(),
        })
    }
}

impl Drop for Profiler {
    fn drop(&mut self) {
        if self.exporter.get_mut().is_some() {
            if let Err(e) = self.shutdown() {
                tracing::warn!("Profiler shutdown failed: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for Profiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profiler")
            .field("output_path", &self.output_path)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ProfilerConfig::default();
        assert_eq!(config.output_path, PathBuf::from("profile.json"));
        assert_eq!(config.capacity, 256);
    }

    #[test]
    fn record_after_shutdown_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let profiler = Profiler::init(ProfilerConfig {
            output_path: dir.path().join("after.json"),
            ..ProfilerConfig::default()
        })
        .unwrap();

        profiler.record("before", 0, 10).unwrap();
        let summary = profiler.shutdown().unwrap();
        assert_eq!(summary.entries_written, 1);
        assert!(!profiler.is_running());

        assert!(matches!(profiler.record("after", 10, 20), Err(ProfilerError::Stopped)));
        assert!(matches!(profiler.shutdown(), Err(ProfilerError::Stopped)));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn dead_exporter_fails_fast() {
        // Every write to /dev/full fails, so the exporter dies on its first flush.
        let profiler = Profiler::init(ProfilerConfig {
            output_path: PathBuf::from("/dev/full"),
            capacity: 4,
            idle_sleep: Duration::from_millis(1),
            push_timeout: Duration::from_secs(60),
        })
        .unwrap();

        let started = Instant::now();
        let err = loop {
            if let Err(e) = profiler.record("x".repeat(256), 0, 1) {
                break e;
            }
        };
        assert!(matches!(err, ProfilerError::ExporterStopped { .. }), "{err}");
        assert!(started.elapsed() < Duration::from_secs(30));

        assert!(matches!(profiler.shutdown(), Err(ProfilerError::Export { .. })));
    }
}
