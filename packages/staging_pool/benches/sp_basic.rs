//! Basic benchmarks for the `staging_pool` crate.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::iter;
use std::time::Instant;

use alloc_tracker::Allocator;
use criterion::{Criterion, criterion_group, criterion_main};
use staging_pool::{RegionPool, RegionWriter};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

#[global_allocator]
static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();

const BLOCK_SIZE: usize = 4096;
const ALLOCATION_AMOUNT: usize = 16;
const PAYLOAD: [u8; 1024] = [0xA5; 1024];

fn entrypoint(c: &mut Criterion) {
    let allocs = alloc_tracker::Session::new();

    let mut group = c.benchmark_group("staging_basic");

    let allocs_op = allocs.operation("build");
    group.bench_function("build", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                drop(black_box(RegionPool::new(BLOCK_SIZE, ALLOCATION_AMOUNT)));
            }

            start.elapsed()
        });
    });

    // Steady state: the pool already has free regions, so no allocation is expected.
    let allocs_op = allocs.operation("acquire_release_warm");
    group.bench_function("acquire_release_warm", |b| {
        let mut pool = RegionPool::new(BLOCK_SIZE, ALLOCATION_AMOUNT);

        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let region = black_box(pool.acquire());
                pool.release(region);
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("acquire_write_release_warm");
    group.bench_function("acquire_write_release_warm", |b| {
        let mut pool = RegionPool::new(BLOCK_SIZE, ALLOCATION_AMOUNT);

        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let region = pool.acquire();

                // SAFETY: The region was just acquired from a live pool and is not used elsewhere.
                let mut writer = unsafe { RegionWriter::from_region(region) };
                while writer.write_bytes(black_box(&PAYLOAD)) {}
                black_box(writer.bytes_written());

                pool.release(region);
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("acquire_many_cold");
    group.bench_function("acquire_many_cold", |b| {
        b.iter_custom(|iters| {
            let mut pools = iter::repeat_with(|| RegionPool::new(BLOCK_SIZE, 1))
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for pool in &mut pools {
                _ = black_box(pool.acquire_many(black_box(ALLOCATION_AMOUNT)));
            }

            start.elapsed()
        });
    });

    // Baseline: what the pool replaces.
    let allocs_op = allocs.operation("vec_alloc_baseline");
    group.bench_function("vec_alloc_baseline", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let mut buffer = Vec::with_capacity(BLOCK_SIZE);
                buffer.extend_from_slice(black_box(&PAYLOAD));
                drop(black_box(buffer));
            }

            start.elapsed()
        });
    });

    group.finish();

    allocs.print_to_stdout();
}
