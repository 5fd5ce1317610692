//! Background thread that writes profile entries to a trace file.

use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use workline_core::{Error, FileHandle};

use crate::error::{ProfilerError, Result};
use crate::events::ProfileEntry;
use crate::ring_buffer::Consumer;
use crate::trace::TraceWriter;

const THREAD_NAME: &str = "profiler-export";

/// Drains a ring buffer into a trace file on a dedicated thread.
pub struct TraceExporter {
    /// Flag to signal shutdown.
    stop: Arc<AtomicBool>,
    /// Exporter thread handle.
    thread: Option<JoinHandle<io::Result<u64>>>,
    path: PathBuf,
}

impl TraceExporter {
    /// Create the trace file, write its header and start the exporter thread.
    ///
    /// `frequency` is the tick rate of the entries' timestamps and is fixed
    /// for the life of the exporter.
    pub fn start(
        path: impl AsRef<Path>,
        consumer: Consumer<ProfileEntry>,
        frequency: u64,
        idle_sleep: Duration,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = FileHandle::create_write(&path)?;
        let writer = TraceWriter::begin(BufWriter::new(file), frequency)
            .map_err(|e| ProfilerError::export(&path, e))?;

        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);

        let thread = thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || Self::export_loop(writer, consumer, &stop_clone, idle_sleep))
            .map_err(|source| Error::Spawn {
                name: THREAD_NAME.to_string(),
                source,
            })?;

        tracing::info!(path = %path.display(), "Profiler exporter started");

        Ok(Self {
            stop,
            thread: Some(thread),
            path,
        })
    }

    /// Exporter loop. Runs until stopped and the buffer is empty.
    fn export_loop(
        mut writer: TraceWriter<BufWriter<FileHandle>>,
        mut consumer: Consumer<ProfileEntry>,
        stop: &AtomicBool,
        idle_sleep: Duration,
    ) -> io::Result<u64> {
        loop {
            if let Some(entry) = consumer.pop() {
                writer.write_entry(&entry)?;
                continue;
            }

            if stop.load(Ordering::Acquire) {
                // Entries pushed before the stop flag was raised.
                while let Some(entry) = consumer.pop() {
                    writer.write_entry(&entry)?;
                }
                break;
            }

            thread::sleep(idle_sleep);
        }

        let (_, records) = writer.finish()?;
        Ok(records)
    }

    /// Trace file being written.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the exporter thread is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Flush every buffered entry, close the trace and join the thread.
    ///
    /// Returns the number of entries written.
    pub fn stop(mut self) -> Result<u64> {
        self.join()
    }

    fn join(&mut self) -> Result<u64> {
        self.stop.store(true, Ordering::Release);

        let Some(thread) = self.thread.take() else {
            return Err(ProfilerError::Stopped);
        };

        match thread.join() {
            Ok(result) => {
                let records = result.map_err(|e| ProfilerError::export(&self.path, e))?;
                tracing::info!(path = %self.path.display(), records, "Profiler exporter stopped");
                Ok(records)
            }
            Err(_) => Err(ProfilerError::ExporterPanicked),
        }
    }
}

impl Drop for TraceExporter {
    fn drop(&mut self) {
        if self.thread.is_some() {
            if let Err(e) = self.join() {
                tracing::warn!("Profiler exporter did not shut down cleanly: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for TraceExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceExporter")
            .field("path", &self.path)
            .field("running", &self.is_running())
            .finish()
    }
}
