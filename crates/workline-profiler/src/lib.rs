//! Trace-event profiling for Workline.
//!
//! Timed, named intervals are recorded from any thread into a fixed-capacity
//! ring buffer. A background exporter thread drains the buffer and writes the
//! entries as a trace-event JSON file that trace viewers can open.
//!
//! # Feature Flags
//!
//! - `profiling`: Enable the `profile_scope!` and `profile_function!` macros.
//!   When disabled, they expand to nothing.
//!
//! # Usage
//!
//! Start the profiler once and share it with the threads that record:
//!
//! ```ignore
//! let profiler = Arc::new(Profiler::init(ProfilerConfig::default())?);
//! ```
//!
//! Instrument code with a scope guard:
//!
//! ```ignore
//! fn build_mesh(profiler: &Profiler) {
//!     workline_profiler::profile_scope!(profiler, "build_mesh");
//!     // ... timed work
//! }
//! ```
//!
//! For in-process per-frame numbers without a trace file, use a
//! [`FrameProfiler`]: it aggregates total and self time per scope name until
//! the next `reset`.
//!
//! Shut down after every recording thread is done, so the file is complete:
//!
//! ```ignore
//! let summary = profiler.shutdown()?;
//! ```

mod context;
mod error;
mod events;
mod exporter;
mod frame;
mod macros;
pub mod ring_buffer;
pub mod trace;

// Re-export public API
pub use context::{Profiler, ProfilerConfig, DEFAULT_CAPACITY, DEFAULT_OUTPUT_PATH};
pub use error::{ProfilerError, Result};
pub use events::{current_thread_id, ExportSummary, ProfileEntry};
pub use exporter::TraceExporter;
pub use frame::{FrameProfiler, FrameScope, FrameStats, ScopeStats};
#[doc(hidden)]
pub use macros::type_name_of;
pub use macros::ScopeGuard;
