use rangescan::{
    EqualityPolicy, Interval, MarkingMode, NestPolicy, PairSearch, RangeScanEngine, ScanConfig,
    ScanError, Schedule, SerializedWriter, sieve_of_eratosthenes,
};

const PAIRS_TO_300: [(u64, u64); 6] = [(6, 28), (12, 234), (30, 140), (40, 224), (80, 200), (84, 270)];

fn engine(config: ScanConfig) -> RangeScanEngine {
    RangeScanEngine::new(config).expect("engine should build")
}

#[test]
fn equal_abundance_pairs_to_300_under_every_configuration() {
    let interval = Interval::new(1, 300).unwrap();
    for workers in [1, 2, 5] {
        for schedule in [Schedule::Static, Schedule::Dynamic, Schedule::Guided] {
            for search in [PairSearch::Hashed, PairSearch::AllPairs] {
                for nested in [NestPolicy::Disabled, NestPolicy::SharedPool] {
                    let config = ScanConfig::with_workers(workers)
                        .with_schedule(schedule)
                        .with_pair_search(search)
                        .with_nested(nested);
                    let pairs = engine(config).find_equal_abundance_pairs(interval).unwrap();
                    assert_eq!(
                        pairs,
                        PAIRS_TO_300.to_vec(),
                        "workers={} {:?} {:?} {:?}",
                        workers,
                        schedule,
                        search,
                        nested
                    );
                }
            }
        }
    }
}

#[test]
fn interval_offsets_are_respected() {
    let engine = engine(ScanConfig::with_workers(3));
    let pairs = engine
        .find_equal_abundance_pairs(Interval::new(25, 150).unwrap())
        .unwrap();
    assert_eq!(pairs, vec![(30, 140)]);

    let field = engine
        .compute_abundance_field(Interval::new(25, 150).unwrap())
        .unwrap();
    assert_eq!(field.get(28), Some(&2.0));
    assert_eq!(field.get(24), None);
}

#[test]
fn tolerance_policy_is_a_superset_of_exact() {
    let interval = Interval::new(1, 300).unwrap();
    let config = ScanConfig::with_workers(2).with_equality(EqualityPolicy::Tolerance(1e-12));
    let pairs = engine(config).find_equal_abundance_pairs(interval).unwrap();
    for pair in PAIRS_TO_300 {
        assert!(pairs.contains(&pair));
    }
}

#[test]
fn sieve_is_independent_of_worker_count() {
    for limit in [0u64, 1, 2, 10, 100, 10007] {
        let expected = engine(ScanConfig::with_workers(1))
            .sieve_of_eratosthenes(limit)
            .unwrap();
        for workers in [2, 3, 8] {
            for marking in [MarkingMode::InnerOnly, MarkingMode::OuterIdempotent] {
                let config = ScanConfig::with_workers(workers).with_marking(marking);
                assert_eq!(
                    engine(config).sieve_of_eratosthenes(limit).unwrap(),
                    expected,
                    "limit={} workers={} {:?}",
                    limit,
                    workers,
                    marking
                );
            }
        }
    }
}

#[test]
fn sieve_edge_limits() {
    let engine = engine(ScanConfig::with_workers(2));
    assert!(engine.sieve_of_eratosthenes(0).unwrap().is_empty());
    assert!(engine.sieve_of_eratosthenes(1).unwrap().is_empty());
    assert_eq!(engine.sieve_of_eratosthenes(2).unwrap(), vec![2]);
    assert_eq!(engine.sieve_of_eratosthenes(10).unwrap(), vec![2, 3, 5, 7]);

    let primes = engine.sieve_of_eratosthenes(10007).unwrap();
    assert_eq!(primes.len(), 1230);
    assert_eq!(primes.last(), Some(&10007));
    assert!(primes.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn primes_are_restartable() {
    let engine = engine(ScanConfig::with_workers(2));
    let primes = engine.primes(100).unwrap();
    let first: Vec<_> = primes.iter().collect();
    let again: Vec<_> = primes.iter().collect();
    assert_eq!(first, again);
    assert_eq!(first.len(), 25);
    assert_eq!(engine.primes(100).unwrap(), primes);
}

#[test]
fn prime_report_lines_are_whole() {
    let engine = engine(ScanConfig::with_workers(4).with_schedule(Schedule::Dynamic));
    let writer = SerializedWriter::new(Vec::new());
    let stats = engine.report_primes(10_000, &writer).unwrap();
    assert_eq!(stats.results, 1229);
    assert_eq!(writer.records(), 1229);

    let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
    let mut printed: Vec<u64> = out.lines().map(|l| l.parse().unwrap()).collect();
    printed.sort_unstable();
    assert_eq!(printed, engine.sieve_of_eratosthenes(10_000).unwrap());
}

#[test]
fn preconditions_fail_fast() {
    assert!(Interval::new(0, 10).is_err());
    assert!(Interval::new(11, 10).is_err());

    let engine = engine(ScanConfig::with_workers(1));
    let huge = Interval::new(1 << 40, (1 << 40) + 5).unwrap();
    assert!(matches!(
        engine.find_equal_abundance_pairs(huge),
        Err(ScanError::Overflow { .. })
    ));
}

#[test]
fn unallocatable_sieve_limit_is_an_error() {
    for limit in [u64::MAX, u64::MAX - 1] {
        assert!(matches!(
            sieve_of_eratosthenes(limit, Some(1)),
            Err(ScanError::Overflow {
                what: "sieve limit",
                ..
            })
        ));
    }
}

#[test]
fn config_from_toml_drives_engine() {
    let config = ScanConfig::from_toml_str(
        r#"
        workers = 3
        schedule = "static"
        marking = "outer_idempotent"
        pair_search = "all_pairs"
        "#,
    )
    .unwrap();
    let engine = engine(config);
    assert_eq!(engine.workers(), 3);
    assert_eq!(engine.sieve_of_eratosthenes(30).unwrap().len(), 10);
    assert_eq!(
        engine
            .find_equal_abundance_pairs(Interval::new(1, 30).unwrap())
            .unwrap(),
        vec![(6, 28)]
    );
}
