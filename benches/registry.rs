//! Benchmarks for path normalization and registry lookups.
//!
//! Run with: `cargo bench --bench registry`

use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use rest_kit::{normalize, Resource, ServiceRegistry};

fn make_registry(groups: usize, resources: usize) -> ServiceRegistry {
    let mut registry = ServiceRegistry::new();
    for g in 0..groups {
        for r in 0..resources {
            registry.add_group_resource(
                &format!("/v{g}"),
                Resource::new(format!("res{r}"), "GET", format!("/res{r}/:id")),
            );
        }
    }
    registry
}

/// Benchmark normalization of clean and messy paths.
fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");

    for (label, path) in [
        ("clean", "/api/v0/resource/:id"),
        ("duplicates", "//api//v0///resource//:id/"),
        ("long", "/a/b/c/d/e/f/g/h/i/j/k/l/m/n/o/p/q/r/s/t/u/v/w/x/y/z"),
    ] {
        group.throughput(Throughput::Bytes(path.len() as u64));
        group.bench_with_input(BenchmarkId::new("path", label), path, |b, path| {
            b.iter(|| normalize(black_box(path)))
        });
    }

    group.finish();
}

/// Benchmark group lookups, which canonicalize the query on every call.
fn bench_group_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("group_lookup");

    for groups in [1, 16, 256] {
        let registry = make_registry(groups, 8);
        let query = format!("//v{}/", groups / 2);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("groups", groups), &registry, |b, registry| {
            b.iter(|| {
                let found = registry.list_group_resources(black_box(&query));
                assert!(found.is_some());
                found.map(|g| g.resources.len())
            })
        });
    }

    group.finish();
}

/// Benchmark concurrent discovery reads behind the shared lock.
fn bench_shared_reads(c: &mut Criterion) {
    let registry = Arc::new(parking_lot::RwLock::new(make_registry(64, 8)));

    let mut group = c.benchmark_group("shared_reads");

    for threads in [1, 4, 8] {
        group.throughput(Throughput::Elements(threads as u64 * 100));
        group.bench_with_input(BenchmarkId::new("threads", threads), &threads, |b, &threads| {
            b.iter(|| {
                let handles: Vec<_> = (0..threads)
                    .map(|t| {
                        let registry = Arc::clone(&registry);
                        thread::spawn(move || {
                            for i in 0..100 {
                                let guard = registry.read();
                                black_box(guard.list_group_resources(&format!("v{}", (t + i) % 64)));
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_normalize, bench_group_lookup, bench_shared_reads);
criterion_main!(benches);
