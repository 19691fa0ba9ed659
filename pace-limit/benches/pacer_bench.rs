use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::Barrier;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;

use pace_limit::Pacer;

fn bench_single(group_name: &str, c: &mut Criterion, pacer: Arc<Pacer>) {
    let mut group = c.benchmark_group(group_name);

    group.bench_function("reserve", |b| {
        b.iter(|| black_box(pacer.as_ref()).reserve())
    });

    group.bench_function("process", |b| {
        b.iter(|| {
            let _ = black_box(pacer.as_ref()).process();
        })
    });

    group.finish();
}

fn bench_parallel_reserve(group_name: &str, c: &mut Criterion, pacer: Arc<Pacer>) {
    let mut group = c.benchmark_group(group_name);

    for threads in [2, 4, 8].iter() {
        let num_threads = *threads;
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}-threads", num_threads)),
            &num_threads,
            |b, &n| {
                b.iter_custom(|iters| {
                    let barrier = Arc::new(Barrier::new(n + 1));
                    let mut handles = Vec::with_capacity(n);

                    for _ in 0..n {
                        let p = Arc::clone(&pacer);
                        let bar = Arc::clone(&barrier);
                        let iters_per_thread = iters / n as u64;

                        handles.push(thread::spawn(move || {
                            bar.wait();
                            for _ in 0..iters_per_thread {
                                let _ = black_box(p.reserve());
                            }
                        }));
                    }

                    barrier.wait();
                    let start = Instant::now();

                    for handle in handles {
                        let _ = handle.join();
                    }

                    start.elapsed()
                });
            },
        );
    }
    group.finish();
}

fn run_all_benches(c: &mut Criterion) {
    let limit = NonZeroUsize::new(1_000_000).unwrap();
    let period = Duration::from_secs(60);

    let single = Arc::new(Pacer::new(limit, period));
    bench_single("Pacer-Burst1", c, single.clone());
    bench_parallel_reserve("Pacer-Burst1", c, single);

    let bursty = Arc::new(Pacer::new(limit, period).with_burst(limit));
    bench_single("Pacer-BurstFull", c, bursty.clone());
    bench_parallel_reserve("Pacer-BurstFull", c, bursty);
}

criterion_group!(benches, run_all_benches);
criterion_main!(benches);
