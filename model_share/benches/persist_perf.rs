//! Persistence strategy benchmarks

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use model_share::{ScoreMatrix, persist_file, persist_shm};
use rand::Rng;
use std::hint::black_box;

fn random_matrix(n_users: usize, n_items: usize) -> ScoreMatrix {
    let mut rng = rand::thread_rng();
    let scores = (0..n_users * n_items).map(|_| rng.r#gen::<f32>()).collect();
    ScoreMatrix::from_scores(n_users, n_items, scores).expect("exact length")
}

/// Persist + materialize through the file-backed strategy
fn bench_file_strategy(c: &mut Criterion) {
    let model = random_matrix(256, 256); // 256 KiB payload

    c.bench_function("file_persist_get_256k", |b| {
        b.iter(|| {
            let mut handle = persist_file(&model, None).unwrap();
            black_box(handle.get().unwrap());
            handle.close(true);
        });
    });
}

/// Persist + materialize through the shared-memory strategy
#[cfg(unix)]
fn bench_shm_strategy(c: &mut Criterion) {
    let model = random_matrix(256, 256);

    c.bench_function("shm_persist_get_256k", |b| {
        b.iter(|| {
            let mut handle = persist_shm(&model).unwrap();
            black_box(handle.get().unwrap());
            handle.close(true);
        });
    });
}

/// Materialization alone, against one persisted artifact
fn bench_materialize_only(c: &mut Criterion) {
    let model = random_matrix(256, 256);

    c.bench_function("file_get_256k", |b| {
        b.iter_batched(
            || persist_file(&model, None).unwrap(),
            |mut handle| {
                black_box(handle.get().unwrap());
                handle.close(true);
            },
            BatchSize::SmallInput,
        );
    });
}

#[cfg(unix)]
criterion_group!(
    benches,
    bench_file_strategy,
    bench_shm_strategy,
    bench_materialize_only
);
#[cfg(not(unix))]
criterion_group!(benches, bench_file_strategy, bench_materialize_only);
criterion_main!(benches);
