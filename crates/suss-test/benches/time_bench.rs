//! Benchmarks for Suss clock operations

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use suss_core::Timestamp;
use suss_time::{
    apply_sway_rule, compare_t, create_t, increment_base_idx, increment_round, ClockConfig,
    ClockEngine, ManualWallClock, DEFAULT_MAX_ROUNDS,
};

fn bench_increment_round(c: &mut Criterion) {
    let t = create_t(5, 1_000.0, 42.0, 10, DEFAULT_MAX_ROUNDS);

    c.bench_function("increment_round", |b| {
        b.iter(|| increment_round(black_box(&t), DEFAULT_MAX_ROUNDS))
    });
}

fn bench_increment_base_idx(c: &mut Criterion) {
    let t = create_t(5, 1_000.0, 42.0, 10, DEFAULT_MAX_ROUNDS);

    c.bench_function("increment_base_idx", |b| {
        b.iter(|| black_box(increment_base_idx(black_box(&t))))
    });
}

fn bench_compare_t(c: &mut Criterion) {
    let a = Timestamp::new(3, 1_000.0, 7.02);
    let b = Timestamp::new(3, 1_000.0, 7.03);

    c.bench_function("compare_t", |bench| {
        bench.iter(|| black_box(compare_t(black_box(&a), black_box(&b))))
    });
}

fn bench_sway_rule(c: &mut Criterion) {
    let local = Timestamp::new(3, 100.0, 5.0);
    let remote = Timestamp::new(7, 50.0, 1.0);

    c.bench_function("apply_sway_rule", |b| {
        b.iter(|| black_box(apply_sway_rule(black_box(&local), black_box(&remote))))
    });
}

fn bench_clock_engine_receive(c: &mut Criterion) {
    let mut clock = ClockEngine::with_wall(ClockConfig::default(), ManualWallClock::new(0.0));
    let remote = Timestamp::new(1, 10.0, 2.0);

    c.bench_function("clock_engine_tick_receive", |b| {
        b.iter(|| {
            clock.tick();
            black_box(clock.receive(black_box(&remote)))
        })
    });
}

criterion_group!(
    benches,
    bench_increment_round,
    bench_increment_base_idx,
    bench_compare_t,
    bench_sway_rule,
    bench_clock_engine_receive,
);
criterion_main!(benches);
