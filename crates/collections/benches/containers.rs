//! Container benchmarks
//!
//! Pool-backed tree and hash table against the standard library containers

use cairn_collections::function::{Identity, Less};
use cairn_collections::tree::RbTree;
use cairn_collections::{HashMap, Map};
use cairn_memory::allocator::{PoolAllocator, SystemAllocator};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::rc::Rc;

/// Scrambled but deterministic key order
fn keys(n: u32) -> Vec<u32> {
    (0..n).map(|i| i.wrapping_mul(2_654_435_761) % (n * 4)).collect()
}

/// Ordered inserts: pooled Map vs BTreeMap
fn bench_ordered_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("ordered_insert");

    for n in [100u32, 1_000, 10_000] {
        let input = keys(n);
        group.throughput(Throughput::Elements(u64::from(n)));

        group.bench_with_input(BenchmarkId::new("cairn_map", n), &input, |b, input| {
            b.iter(|| {
                let mut map = Map::new();
                for &k in input {
                    map.insert(k, k).unwrap();
                }
                black_box(map.len())
            });
        });

        group.bench_with_input(BenchmarkId::new("std_btreemap", n), &input, |b, input| {
            b.iter(|| {
                let mut map = std::collections::BTreeMap::new();
                for &k in input {
                    map.insert(k, k);
                }
                black_box(map.len())
            });
        });
    }

    group.finish();
}

/// Unordered inserts and lookups: pooled HashMap vs std HashMap
fn bench_unordered(c: &mut Criterion) {
    let mut group = c.benchmark_group("unordered_insert_lookup");
    let input = keys(10_000);
    group.throughput(Throughput::Elements(10_000));

    group.bench_function("cairn_hashmap", |b| {
        b.iter(|| {
            let mut map = HashMap::new();
            for &k in &input {
                map.insert(k, k).unwrap();
            }
            black_box(input.iter().filter(|k| map.contains_key(k)).count())
        });
    });

    group.bench_function("std_hashmap", |b| {
        b.iter(|| {
            let mut map = std::collections::HashMap::new();
            for &k in &input {
                map.insert(k, k);
            }
            black_box(input.iter().filter(|k| map.contains_key(*k)).count())
        });
    });

    group.finish();
}

/// Insert/erase churn on one tree: nodes from the pool vs straight from the heap
fn bench_tree_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_churn");
    let input = keys(5_000);
    group.throughput(Throughput::Elements(5_000));

    group.bench_function("pool", |b| {
        let mut tree: RbTree<u32, Identity, Less, Rc<PoolAllocator>> =
            RbTree::new_in(Identity, Less, Rc::new(PoolAllocator::new()));
        b.iter(|| {
            tree.insert_equal_iter(input.iter().copied()).unwrap();
            for k in &input {
                tree.remove_one(k);
            }
            black_box(tree.len())
        });
    });

    group.bench_function("system", |b| {
        let mut tree: RbTree<u32, Identity, Less, SystemAllocator> =
            RbTree::new_in(Identity, Less, SystemAllocator);
        b.iter(|| {
            tree.insert_equal_iter(input.iter().copied()).unwrap();
            for k in &input {
                tree.remove_one(k);
            }
            black_box(tree.len())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_ordered_insert, bench_unordered, bench_tree_churn);
criterion_main!(benches);
