//! Benchmark for TD target computation and a full train step

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;

use qtrainer::approximator::{train_step, QNetwork};
use qtrainer::batch::BatchSampler;
use qtrainer::config::NetworkConfig;
use qtrainer::replay_memory::{ReplayMemory, Transition};
use qtrainer::target::TargetComputer;

fn memory(size: usize) -> ReplayMemory {
    let mut memory = ReplayMemory::new(size);
    for i in 0..size {
        let x = (i as f32 * 0.37).sin();
        memory.insert(Transition {
            state: Array1::from_elem(5, x),
            action: i % 2,
            reward: if i % 10 == 0 { 100.0 } else { 1.0 },
            next_state: Array1::from_elem(5, x + 0.1),
            done: i % 25 == 0,
        });
    }
    memory
}

fn bench_compute_targets(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_targets");
    let memory = memory(4_096);
    let online = QNetwork::from_config(5, 2, &NetworkConfig::default()).unwrap();
    let target = online.clone();

    for double_dqn in [false, true] {
        group.bench_with_input(
            BenchmarkId::new("double_dqn", double_dqn),
            &double_dqn,
            |b, &double_dqn| {
                let computer = TargetComputer::new(0.99, double_dqn);
                let mut rng = StdRng::seed_from_u64(1);
                let batch = BatchSampler::new(32, 5, 2).sample(&memory, &mut rng).unwrap();

                b.iter(|| black_box(computer.compute(black_box(&batch), &online, &target)))
            },
        );
    }

    group.finish();
}

fn bench_train_step(c: &mut Criterion) {
    let memory = memory(4_096);
    let mut online = QNetwork::from_config(5, 2, &NetworkConfig::default()).unwrap();
    let target = online.clone();
    let computer = TargetComputer::new(0.99, true);
    let sampler = BatchSampler::new(32, 5, 2);
    let mut rng = StdRng::seed_from_u64(2);

    c.bench_function("train_step_batch_32", |b| {
        b.iter(|| {
            let batch = sampler.sample(&memory, &mut rng).unwrap();
            let targets = computer.compute(&batch, &online, &target).unwrap();
            black_box(train_step(&mut online, &batch, &targets))
        })
    });
}

criterion_group!(benches, bench_compute_targets, bench_train_step);
criterion_main!(benches);
