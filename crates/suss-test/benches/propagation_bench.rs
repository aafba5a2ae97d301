//! Benchmarks for the propagation engine

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

use suss_core::{NodeId, Value};
use suss_propagate::{PropagationConfig, PropagationEngine};
use suss_runtime::{Replica, ReplicaConfig};
use suss_test::{doubling_chain, temperature_network};

fn bench_temperature(c: &mut Criterion) {
    let net = temperature_network(25.0);
    let engine = PropagationEngine::default();

    c.bench_function("propagate_temperature", |b| {
        b.iter(|| engine.propagate_from(black_box(&net), [NodeId::new("celsius")]))
    });
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagate_chain");
    for len in [4usize, 16, 64] {
        let net = doubling_chain(len);
        let engine = PropagationEngine::new(PropagationConfig::bounded(len as u32 + 2));
        group.bench_with_input(BenchmarkId::from_parameter(len), &net, |b, net| {
            b.iter(|| engine.propagate_from(black_box(net), [NodeId::new("s0")]))
        });
    }
    group.finish();
}

fn bench_replica_observe(c: &mut Criterion) {
    let net = temperature_network(0.0);

    c.bench_function("replica_observe_local", |b| {
        b.iter_batched(
            || Replica::new(ReplicaConfig::solo(), net.clone()),
            |mut replica| {
                let outcome = replica.observe_local(
                    "celsius",
                    Value::number("c", 0.0),
                    Value::number("c", 25.0),
                );
                black_box((outcome, replica))
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_temperature, bench_chain, bench_replica_observe);
criterion_main!(benches);
