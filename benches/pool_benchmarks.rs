//! Benchmarks for pool construction and the `select` hot path.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use jrpc_gateway::pool::{Pool, PoolOptions};
use jrpc_gateway::EndpointConfig;
use std::sync::Arc;
use std::thread;

fn endpoint_configs(count: usize) -> Vec<EndpointConfig> {
    (0..count)
        .map(|i| EndpointConfig::new(format!("https://rpc{i}.example.com")))
        .collect()
}

fn bench_pool_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_construction");

    for endpoint_count in [1, 5, 20, 100] {
        let configs = endpoint_configs(endpoint_count);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("new", endpoint_count),
            &configs,
            |b, configs| {
                b.iter(|| black_box(Pool::new(configs, PoolOptions::default(), None, None).unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_select");

    for endpoint_count in [1, 5, 20, 100] {
        let configs = endpoint_configs(endpoint_count);
        let pool = Pool::new(&configs, PoolOptions::default(), None, None).unwrap();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("unfiltered", endpoint_count),
            &pool,
            |b, pool| {
                b.iter(|| black_box(pool.select(&[])));
            },
        );

        let methods = vec!["getSlot".to_string()];
        group.bench_with_input(
            BenchmarkId::new("method_filtered", endpoint_count),
            &pool,
            |b, pool| {
                b.iter(|| black_box(pool.select(&methods)));
            },
        );
    }

    group.finish();
}

/// `select` is the only hot path invoked from many request handlers
/// concurrently; the round-robin cursor must stay correct under contention.
fn bench_select_under_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_select_contended");

    for thread_count in [2, 4, 8] {
        let pool = Arc::new(Pool::new(&endpoint_configs(10), PoolOptions::default(), None, None).unwrap());

        group.throughput(Throughput::Elements(thread_count as u64));
        group.bench_with_input(
            BenchmarkId::new("threads", thread_count),
            &thread_count,
            |b, &thread_count| {
                b.iter(|| {
                    thread::scope(|scope| {
                        for _ in 0..thread_count {
                            let pool = Arc::clone(&pool);
                            scope.spawn(move || {
                                for _ in 0..100 {
                                    black_box(pool.select(&[]));
                                }
                            });
                        }
                    });
                });
            },
        );
    }

    group.finish();
}

fn bench_status(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_status");

    for endpoint_count in [5, 20, 100] {
        let configs = endpoint_configs(endpoint_count);
        let pool = Pool::new(&configs, PoolOptions::default(), None, None).unwrap();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("snapshot", endpoint_count),
            &pool,
            |b, pool| {
                b.iter(|| black_box(pool.status()));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_pool_construction,
    bench_select,
    bench_select_under_contention,
    bench_status,
);
criterion_main!(benches);
