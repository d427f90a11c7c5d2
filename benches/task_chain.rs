//! Await-chain benchmarks for cotask.
//!
//! Benchmarks:
//! - Creating, awaiting and destroying nested task chains of varying depth
//! - Capturing a suspension trace at the bottom of a chain
//! - Detached roots that hop through the ready queue
//!
//! Run:
//!   cargo bench --bench task_chain

#![allow(missing_docs)]
#![allow(clippy::semicolon_if_nothing_returned)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use cotask::{DetachedTask, Runtime, Task, current_trace, yield_now};

// =============================================================================
// HELPERS
// =============================================================================

fn chain(depth: u64) -> Task<u64> {
    Task::named("chain", async move {
        if depth == 0 {
            Ok(0)
        } else {
            Ok(chain(depth - 1).await? + 1)
        }
    })
}

fn traced_chain(depth: u64) -> Task<usize> {
    Task::named("traced_chain", async move {
        if depth == 0 {
            Ok(current_trace().await.len())
        } else {
            traced_chain(depth - 1).await
        }
    })
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_await_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("await_chain");
    for depth in [1_u64, 100, 10_000] {
        group.throughput(Throughput::Elements(depth));
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let runtime = Runtime::new();
            b.iter(|| {
                let v = runtime.block_on(chain(black_box(depth))).expect("chain");
                black_box(v)
            });
        });
    }
    group.finish();
}

fn bench_trace_capture(c: &mut Criterion) {
    let mut group = c.benchmark_group("trace_capture");
    for depth in [4_u64, 64, 512] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let runtime = Runtime::new();
            b.iter(|| {
                let len = runtime
                    .block_on(traced_chain(black_box(depth)))
                    .expect("trace");
                black_box(len)
            });
        });
    }
    group.finish();
}

fn bench_ready_queue(c: &mut Criterion) {
    c.bench_function("ready_queue/256_roots_x4_yields", |b| {
        let runtime = Runtime::new();
        b.iter(|| {
            for _ in 0..256 {
                runtime
                    .start(DetachedTask::named("hopper", async {
                        for _ in 0..4 {
                            yield_now().await;
                        }
                        Ok(())
                    }))
                    .expect("start");
            }
            while runtime.live_frames() > 0 {
                black_box(runtime.run().expect("run"));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_await_chain,
    bench_trace_capture,
    bench_ready_queue
);
criterion_main!(benches);
