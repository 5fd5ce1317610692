//! Submit/wait throughput of the job system.

use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use workline_jobs::JobSystem;

fn bench_submit_and_wait(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_and_wait");

    for &job_count in &[64u64, 1024, 16_384] {
        group.throughput(Throughput::Elements(job_count));
        group.bench_with_input(
            BenchmarkId::from_parameter(job_count),
            &job_count,
            |b, &job_count| {
                let jobs = JobSystem::with_workers(4).expect("job system");
                let queue = jobs.queue();
                let sink = Arc::new(AtomicU64::new(0));

                b.iter(|| {
                    for i in 0..job_count {
                        let sink = Arc::clone(&sink);
                        queue.submit("bench", move || {
                            sink.fetch_add(black_box(i), Ordering::Relaxed);
                        });
                    }
                    queue.wait_all();
                });

                jobs.stop();
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_submit_and_wait);
criterion_main!(benches);
