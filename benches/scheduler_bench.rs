use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use pipeline_scheduler::Scheduler;

// ---------------------------------------------------------------------------
// Scheduling overhead: pure schedule generation (no I/O).
// ---------------------------------------------------------------------------

fn bench_scheduling_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduling");

    for &(stages, batches) in &[(2, 4), (4, 16), (8, 64), (16, 128)] {
        group.bench_with_input(
            BenchmarkId::new("construct", format!("{stages}s_{batches}mb")),
            &(stages, batches),
            |b, &(stages, batches)| {
                b.iter(|| {
                    let schedule = Scheduler::new(batches, stages).unwrap();
                    black_box(schedule);
                })
            },
        );
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Query overhead: round-trip lookups against an already-built schedule.
// ---------------------------------------------------------------------------

fn bench_query_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");

    let schedule = Scheduler::new(64, 8).unwrap();

    group.bench_function("forward_compute_waited_event", |b| {
        b.iter(|| {
            for batch in 0..64u32 {
                black_box(schedule.forward_compute_waited_event(batch, 4));
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_scheduling_overhead, bench_query_overhead);
criterion_main!(benches);
