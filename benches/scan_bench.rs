use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rangescan::{
    Interval, MarkingMode, NestPolicy, PairSearch, RangeScanEngine, ScanConfig, Schedule,
};

fn bench_abundance_schedules(c: &mut Criterion) {
    let interval = Interval::new(1, 20_000).expect("interval should be valid");
    let mut group = c.benchmark_group("abundance_field_20k");
    group.sample_size(10);

    for schedule in [Schedule::Static, Schedule::Dynamic, Schedule::Guided] {
        for workers in [1_usize, 4, 8] {
            let engine = RangeScanEngine::new(ScanConfig::with_workers(workers).with_schedule(schedule))
                .expect("engine should build");
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", schedule), workers),
                &workers,
                |b, _| b.iter(|| black_box(engine.compute_abundance_field(interval).unwrap().len())),
            );
        }
    }

    group.finish();
}

fn bench_nested_policy(c: &mut Criterion) {
    let interval = Interval::new(1, 5_000).expect("interval should be valid");
    let mut group = c.benchmark_group("abundance_nested_5k");
    group.sample_size(10);

    for nested in [NestPolicy::Disabled, NestPolicy::SharedPool] {
        let engine = RangeScanEngine::new(ScanConfig::with_workers(4).with_nested(nested))
            .expect("engine should build");
        group.bench_function(format!("{:?}", nested), |b| {
            b.iter(|| black_box(engine.compute_abundance_field(interval).unwrap().len()))
        });
    }

    group.finish();
}

fn bench_pair_search(c: &mut Criterion) {
    let interval = Interval::new(1, 4_000).expect("interval should be valid");
    let mut group = c.benchmark_group("pair_search_4k");
    group.sample_size(10);

    for search in [PairSearch::Hashed, PairSearch::AllPairs] {
        let engine = RangeScanEngine::new(ScanConfig::with_workers(4).with_pair_search(search))
            .expect("engine should build");
        let field = engine
            .compute_abundance_field(interval)
            .expect("field should compute");
        group.bench_function(format!("{:?}", search), |b| {
            b.iter(|| {
                let sink = rangescan::Collector::new();
                black_box(engine.report_equal_pairs(&field, &sink).unwrap())
            })
        });
    }

    group.finish();
}

fn bench_sieve(c: &mut Criterion) {
    let mut group = c.benchmark_group("sieve_10m");
    group.sample_size(10);

    for marking in [MarkingMode::InnerOnly, MarkingMode::OuterIdempotent] {
        for workers in [1_usize, 4, 8] {
            let engine = RangeScanEngine::new(ScanConfig::with_workers(workers).with_marking(marking))
                .expect("engine should build");
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", marking), workers),
                &workers,
                |b, _| b.iter(|| black_box(engine.primes(10_000_000).unwrap().limit())),
            );
        }
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_abundance_schedules,
    bench_nested_policy,
    bench_pair_search,
    bench_sieve
);
criterion_main!(benches);
