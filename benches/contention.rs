use criterion::*;
use mpsc_ring::channel;
use rayon::{current_num_threads, scope};
use std::num::NonZeroUsize;

fn contention(c: &mut Criterion) {
    let cardinality = 10000;
    let concurrency = current_num_threads();

    c.bench_function("contention/handles", move |b| {
        b.iter_batched_ref(
            || channel::<usize>(NonZeroUsize::new(1).unwrap()),
            |(tx, _rx)| {
                scope(|s| {
                    for _ in 0..concurrency {
                        s.spawn(|_| {
                            for _ in 0..cardinality / concurrency {
                                drop(tx.clone());
                            }
                        });
                    }
                });
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, contention);
criterion_main!(benches);
