use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use firehose_core::{Firehose, FirehoseConfig};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const MSG_PER_RUN: u64 = 100_000;

fn bench_single_consumer(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_consumer");
    group.throughput(Throughput::Elements(MSG_PER_RUN));

    group.bench_function("notify_drain", |b| {
        b.iter(|| {
            let config: FirehoseConfig<u32> =
                FirehoseConfig::new().with_workers(1).with_ring_capacity(4096);
            let hose: Firehose<u32, u64> = Firehose::new(config);
            let count = Arc::new(AtomicU64::new(0));
            let count2 = Arc::clone(&count);
            hose.on(
                0,
                Arc::new(move |_k: &u32, v: &u64| {
                    black_box(*v);
                    count2.fetch_add(1, Ordering::Relaxed);
                }),
            );

            for i in 0..MSG_PER_RUN {
                hose.notify(0, i);
            }
            while count.load(Ordering::Relaxed) < MSG_PER_RUN {
                std::hint::spin_loop();
            }
            hose.shutdown();
        });
    });

    group.finish();
}

fn bench_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout");

    for consumers in [2, 4, 8].iter() {
        group.throughput(Throughput::Elements(MSG_PER_RUN * *consumers as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(consumers),
            consumers,
            |b, &n| {
                b.iter(|| {
                    let config: FirehoseConfig<u32> = FirehoseConfig::new()
                        .with_workers(4)
                        .with_ring_capacity(4096);
                    let hose: Firehose<u32, u64> = Firehose::new(config);
                    let count = Arc::new(AtomicU64::new(0));
                    for _ in 0..n {
                        let count = Arc::clone(&count);
                        hose.on(
                            0,
                            Arc::new(move |_k: &u32, v: &u64| {
                                black_box(*v);
                                count.fetch_add(1, Ordering::Relaxed);
                            }),
                        );
                    }

                    for i in 0..MSG_PER_RUN {
                        hose.notify(0, i);
                    }
                    while count.load(Ordering::Relaxed) < MSG_PER_RUN * n as u64 {
                        std::hint::spin_loop();
                    }
                    hose.shutdown();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_single_consumer, bench_fanout);
criterion_main!(benches);
