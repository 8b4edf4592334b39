//! Engine benchmark suite
//!
//! Benchmarks for the append path, rotation, and end-to-end throughput.
//!
//! Run with: `cargo bench -p tickline-engine`

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use tickline_engine::{AppendError, Engine, EngineConfig, Line, Record, WaitStrategy};

#[derive(Clone, Copy)]
struct Tick {
    timestamp: u64,
    price: f64,
}

impl Record for Tick {
    const NAME: &'static str = "tick";
}

fn tick(i: u64) -> Tick {
    Tick {
        timestamp: i,
        price: 100.0 + i as f64 * 0.01,
    }
}

fn config(capacity: usize, flush_workers: usize) -> EngineConfig {
    EngineConfig {
        default_capacity: capacity,
        min_rotation_interval: Duration::ZERO,
        flush_workers,
        wait_strategy: WaitStrategy::Yield,
        ..Default::default()
    }
}

/// Counting consumer
fn counter() -> (Arc<AtomicU64>, impl Fn(&[Tick]) + Send + Sync + 'static) {
    let count = Arc::new(AtomicU64::new(0));
    let sink = Arc::clone(&count);
    (count, move |ticks: &[Tick]| {
        let sum: f64 = ticks.iter().map(|t| t.timestamp as f64 * t.price).sum();
        black_box(sum);
        sink.fetch_add(ticks.len() as u64, Ordering::Relaxed);
    })
}

/// Benchmark raw slot claims on a single line
fn bench_line_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_push");

    for capacity in [1024usize, 16384] {
        group.throughput(Throughput::Elements(capacity as u64));
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &cap| {
            let mut line = Line::new(cap).unwrap();
            b.iter(|| {
                for i in 0..cap as u64 {
                    let _ = black_box(line.push(tick(i)));
                }
                black_box(line.drain());
            });
        });
    }

    group.finish();
}

/// Benchmark append + rotate on one thread
fn bench_append_rotate(c: &mut Criterion) {
    let mut group = c.benchmark_group("append_rotate");

    for batch in [64u64, 1024, 4096] {
        group.throughput(Throughput::Elements(batch));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            let (_, consumer) = counter();
            let engine = Engine::builder(config(4096, 0))
                .register::<Tick, _>(consumer)
                .build()
                .unwrap();

            b.iter(|| {
                for i in 0..batch {
                    let _ = black_box(engine.append(tick(i)));
                }
                black_box(engine.rotate_and_drain().unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark many producers against a running flush driver
fn bench_producers_with_driver(c: &mut Criterion) {
    const PER_PRODUCER: u64 = 50_000;

    let mut group = c.benchmark_group("producers_with_driver");
    group.sample_size(10);

    for (producers, workers) in [(1u64, 0usize), (4, 0), (4, 2)] {
        let id = format!("{producers}p_{workers}w");
        group.throughput(Throughput::Elements(producers * PER_PRODUCER));
        group.bench_function(BenchmarkId::from_parameter(id), |b| {
            b.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for _ in 0..iters {
                    let (count, consumer) = counter();
                    let engine = Engine::builder(config(4096, workers))
                        .register::<Tick, _>(consumer)
                        .build()
                        .unwrap();
                    engine.start().unwrap();

                    let started = Instant::now();
                    let handles: Vec<_> = (0..producers)
                        .map(|_| {
                            let producer = engine.producer();
                            thread::spawn(move || {
                                for i in 0..PER_PRODUCER {
                                    let mut record = tick(i);
                                    loop {
                                        match producer.append(record) {
                                            Ok(_) => break,
                                            Err(AppendError::Full { record: back, .. }) => {
                                                record = back;
                                                thread::yield_now();
                                            }
                                            Err(_) => return,
                                        }
                                    }
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                    engine.stop().unwrap();
                    total += started.elapsed();

                    assert_eq!(count.load(Ordering::Relaxed), producers * PER_PRODUCER);
                }
                total
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_line_push,
    bench_append_rotate,
    bench_producers_with_driver
);
criterion_main!(benches);
