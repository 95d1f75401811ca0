// SafeHashMap put/get throughput under contention and across resize
// boundaries.

use coherence_rs::map::safe_hash_map::{SafeHashMap, SafeHashMapConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::thread;

fn bench_single_threaded_put_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("safe_hash_map_single_threaded");

    for size in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("put", size), &size, |b, &size| {
            b.iter(|| {
                let map: SafeHashMap<usize, usize> = SafeHashMap::new();
                for i in 0..size {
                    map.put(black_box(i), black_box(i * 2));
                }
                black_box(map.len());
            });
        });

        group.bench_with_input(BenchmarkId::new("get", size), &size, |b, &size| {
            let map: SafeHashMap<usize, usize> = SafeHashMap::new();
            for i in 0..size {
                map.put(i, i * 2);
            }
            b.iter(|| {
                for i in 0..size {
                    black_box(map.get(&black_box(i)));
                }
            });
        });
    }

    group.finish();
}

fn bench_concurrent_readers_during_resize(c: &mut Criterion) {
    let mut group = c.benchmark_group("safe_hash_map_resize_contention");

    group.bench_function("4_readers_during_growth", |b| {
        b.iter(|| {
            let map: Arc<SafeHashMap<usize, usize>> = Arc::new(SafeHashMap::with_config(
                SafeHashMapConfig {
                    initial_buckets: 17,
                    load_factor: 1.0,
                    growth_rate: 3.0,
                },
            ));
            for i in 0..16 {
                map.put(i, i);
            }

            let readers: Vec<_> = (0..4)
                .map(|_| {
                    let map = Arc::clone(&map);
                    thread::spawn(move || {
                        for i in 0..16 {
                            black_box(map.get(&i));
                        }
                    })
                })
                .collect();

            for i in 16..200 {
                map.put(black_box(i), black_box(i));
            }
            for reader in readers {
                reader.join().unwrap();
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_single_threaded_put_get, bench_concurrent_readers_during_resize);
criterion_main!(benches);
