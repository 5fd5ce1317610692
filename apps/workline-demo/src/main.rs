//! Workline demo
//!
//! Runs a few frames of fan-out work on the job system, records every job as
//! a profile scope, and writes the trace to `profile.json`.
//!
//! Environment overrides:
//! - `WORKLINE_WORKERS`: worker thread count
//! - `WORKLINE_TRACE`: trace file path
//! - `RUST_LOG`: log filter (default `info`)

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;
use workline_core::{HighResClock, Stopwatch};
use workline_jobs::{JobQueue, JobSystem, JobSystemConfig};
use workline_profiler::{profile_function, profile_scope, FrameProfiler, Profiler, ProfilerConfig};

const FRAMES: u64 = 4;
const TILES_PER_FRAME: u64 = 16;
const SAMPLES_PER_TILE: u64 = 8;

/// Settings read from the environment.
struct Settings {
    jobs: JobSystemConfig,
    profiler: ProfilerConfig,
}

impl Settings {
    fn from_env() -> anyhow::Result<Self> {
        let mut jobs = JobSystemConfig::default();
        if let Ok(value) = std::env::var("WORKLINE_WORKERS") {
            jobs.worker_count = value
                .parse()
                .with_context(|| format!("WORKLINE_WORKERS must be a number, got {value:?}"))?;
        }

        let mut profiler = ProfilerConfig::default();
        if let Ok(value) = std::env::var("WORKLINE_TRACE") {
            profiler.output_path = PathBuf::from(value);
        }

        Ok(Self { jobs, profiler })
    }
}

/// Deterministic busy work standing in for a real sample.
fn shade(frame: u64, tile: u64, sample: u64) -> u64 {
    let mut x = frame
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(tile << 16)
        .wrapping_add(sample);
    for _ in 0..20_000 {
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
    }
    x
}

/// Submit one frame: each tile job fans its samples out to a sibling queue
/// and waits on them from inside the worker.
fn submit_frame(
    queue: &JobQueue,
    profiler: &Arc<Profiler>,
    frames: &FrameProfiler,
    checksum: &Arc<AtomicU64>,
    frame: u64,
) {
    profile_function!(frames);
    for tile in 0..TILES_PER_FRAME {
        let samples = queue.sibling();
        let profiler = Arc::clone(profiler);
        let checksum = Arc::clone(checksum);

        queue.submit(format!("tile-{tile}"), move || {
            profile_scope!(profiler, format!("frame {frame} tile {tile}"));

            for sample in 0..SAMPLES_PER_TILE {
                let profiler = Arc::clone(&profiler);
                let checksum = Arc::clone(&checksum);
                samples.submit("sample", move || {
                    profile_scope!(profiler, "sample");
                    checksum.fetch_xor(shade(frame, tile, sample), Ordering::Relaxed);
                });
            }
            samples.wait_all();
        });
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;

    // The profiler outlives the job system so every scope a job records is exported.
    let profiler = Arc::new(Profiler::init(settings.profiler).context("Failed to start profiler")?);
    let jobs = JobSystem::start(settings.jobs).context("Failed to start job system")?;
    info!(workers = jobs.worker_count(), "Workline demo");

    let queue = jobs.queue();
    let checksum = Arc::new(AtomicU64::new(0));
    let frames = FrameProfiler::new();

    for frame in 0..FRAMES {
        let watch = Stopwatch::start();
        frames.reset();
        {
            profile_scope!(profiler, format!("frame {frame}"));
            let _frame_scope = frames.scope("frame");
            submit_frame(&queue, &profiler, &frames, &checksum, frame);
            let _wait_scope = frames.scope("wait_all");
            queue.wait_all();
        }

        let frame_stats = frames.stats();
        for scope in &frame_stats.entries {
            info!(
                frame,
                scope = %scope.name,
                calls = scope.calls,
                total_ms = HighResClock::millis(0, scope.total_ticks),
                self_ms = HighResClock::millis(0, scope.self_ticks),
                "Frame scope"
            );
        }

        // Quiesced: safe to read and clear the per-worker stats.
        let stats = jobs.thread_stats();
        for summary in stats.summaries() {
            info!(
                frame,
                worker = summary.worker,
                jobs = summary.jobs,
                busy_ms = summary.busy_millis(),
                "Worker stats"
            );
        }
        info!(frame, ms = watch.elapsed_millis(), "Frame complete");
        stats.reset();
    }

    info!(checksum = checksum.load(Ordering::Relaxed), "All frames complete");

    jobs.stop();
    let summary = profiler.shutdown().context("Failed to write trace")?;
    info!(
        entries = summary.entries_written,
        path = %summary.path.display(),
        "Trace written"
    );

    Ok(())
}
