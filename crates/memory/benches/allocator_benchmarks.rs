//! Pool allocator benchmarks
//!
//! Compares the pool against the system allocator on small-block churn

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use cairn_memory::allocator::{Allocator, PoolAllocator, PoolConfig, SystemAllocator};
use std::alloc::Layout;
use std::hint::black_box;

/// Benchmark single allocation/deallocation cycle
fn bench_single_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_allocation");

    for size in [8usize, 32, 64, 128] {
        let layout = Layout::from_size_align(size, 8).unwrap();

        group.bench_with_input(BenchmarkId::new("pool", size), &layout, |b, &layout| {
            let allocator = PoolAllocator::with_config(PoolConfig::performance()).unwrap();
            b.iter(|| unsafe {
                let ptr = allocator.allocate(layout).unwrap();
                allocator.deallocate(ptr.cast(), layout);
                black_box(ptr);
            });
        });

        group.bench_with_input(BenchmarkId::new("system", size), &layout, |b, &layout| {
            let allocator = SystemAllocator::new();
            b.iter(|| unsafe {
                let ptr = allocator.allocate(layout).unwrap();
                allocator.deallocate(ptr.cast(), layout);
                black_box(ptr);
            });
        });
    }

    group.finish();
}

/// Benchmark batch allocations, the shape of a container filling up
fn bench_batch_allocations(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_allocations");
    group.throughput(Throughput::Elements(1_000));
    let layout = Layout::from_size_align(40, 8).unwrap();

    group.bench_function("pool_1000x40b", |b| {
        let allocator = PoolAllocator::with_config(PoolConfig::production()).unwrap();
        let mut ptrs = Vec::with_capacity(1_000);
        b.iter(|| unsafe {
            for _ in 0..1_000 {
                ptrs.push(allocator.allocate(layout).unwrap());
            }
            for ptr in ptrs.drain(..) {
                allocator.deallocate(ptr.cast(), layout);
            }
        });
    });

    group.bench_function("system_1000x40b", |b| {
        let allocator = SystemAllocator::new();
        let mut ptrs = Vec::with_capacity(1_000);
        b.iter(|| unsafe {
            for _ in 0..1_000 {
                ptrs.push(allocator.allocate(layout).unwrap());
            }
            for ptr in ptrs.drain(..) {
                allocator.deallocate(ptr.cast(), layout);
            }
        });
    });

    group.finish();
}

/// Cold pool: every iteration pays for arena growth
fn bench_cold_pool(c: &mut Criterion) {
    c.bench_function("cold_pool_first_refill", |b| {
        b.iter(|| {
            let pool = PoolAllocator::with_config(PoolConfig::production()).unwrap();
            let ptr = pool.allocate_bytes(black_box(24)).unwrap();
            unsafe { pool.deallocate_bytes(ptr, 24) };
            black_box(pool.heap_size())
        });
    });
}

criterion_group!(
    benches,
    bench_single_allocation,
    bench_batch_allocations,
    bench_cold_pool
);
criterion_main!(benches);
