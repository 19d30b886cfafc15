//! Partition and Evaluation Benchmark
//!
//! Measures:
//! - Partitioning wide trees (one operation over many reads)
//! - Partitioning deep trees (nested operations, one read per level)
//! - A full evaluation pass with a solver that does nothing
//!
//! Reads are spread round-robin over three domains, one of them speculative,
//! so bubbling and collapsing both happen.

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use domainflow::{
    Domain, DomainRegistry, Engine, EngineConfig, Hint, NodeId, SolveError, SolveOutput,
    StaticOracle, Step, Workflow,
};

const SIZES: &[usize] = &[10, 100, 1_000];

// ============================================================================
// Data Generators
// ============================================================================

/// Engine whose oracle maps `v{i}` to one of three domains
fn engine(n: usize) -> Engine {
    let mut registry = DomainRegistry::new();
    let domains = [
        registry.register(Domain::new("store", 0)),
        registry.register(Domain::new("solver", 1)),
        registry.register(Domain::new("guess", -1).speculative()),
    ];
    let oracle = (0..n).fold(StaticOracle::new(), |oracle, i| {
        oracle.with_variable(format!("v{}", i), domains[i % domains.len()])
    });
    Engine::with_registry(registry, oracle, EngineConfig::default())
}

/// `(sum (get v0) ... (get vN))`
fn wide(n: usize) -> (Engine, NodeId) {
    let mut engine = engine(n);
    let arena = engine.arena_mut();
    let reads: Vec<NodeId> = (0..n).map(|i| arena.read(format!("v{}", i))).collect();
    let root = arena.composite("sum", reads);
    (engine, root)
}

/// `(+ (get v0) (+ (get v1) ... 1))`
fn deep(n: usize) -> (Engine, NodeId) {
    let mut engine = engine(n);
    let arena = engine.arena_mut();
    let mut inner = arena.literal(1);
    for i in (0..n).rev() {
        let read = arena.read(format!("v{}", i));
        inner = arena.composite("+", [read, inner]);
    }
    (engine, inner)
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition");

    for &n in SIZES {
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("wide", n), &n, |b, &n| {
            b.iter_batched(
                || wide(n),
                |(mut engine, root)| black_box(engine.partition(root, Hint::default())),
                BatchSize::SmallInput,
            )
        });

        group.bench_with_input(BenchmarkId::new("deep", n), &n, |b, &n| {
            b.iter_batched(
                || deep(n),
                |(mut engine, root)| black_box(engine.partition(root, Hint::default())),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");

    for &n in SIZES {
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("deep", n), &n, |b, &n| {
            b.iter_batched(
                || {
                    let (mut engine, root) = deep(n);
                    let workflow = engine.partition(root, Hint::default());
                    (engine, workflow)
                },
                |(mut engine, mut workflow)| {
                    let mut solve = |_: &mut Engine, _: &mut Workflow, step: Step| {
                        black_box(step.bucket.len());
                        Ok::<_, SolveError>(SolveOutput::Empty)
                    };
                    black_box(engine.evaluate(&mut workflow, &mut solve))
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_partition, bench_evaluate);
criterion_main!(benches);
