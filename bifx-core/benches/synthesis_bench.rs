//! Criterion benchmarks for the synthesis hot paths.
//!
//! Benchmarks:
//! 1. Full synthesis (normalize, aggregate, smooth, clip) over six features
//! 2. Feature registry over a synthetic bundle

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use bifx_core::data::{DatasetBundle, DateRange, SyntheticProvider, SEARCH_INTEREST_SOURCE};
use bifx_core::features::{FeatureConfig, FeatureMatrix, FeatureRegistry};
use bifx_core::index::{default_weights, synthesize, IndexConfig};
use bifx_core::series::Series;

fn make_matrix(n: usize) -> FeatureMatrix {
    let base = chrono::NaiveDate::from_ymd_opt(2015, 1, 2).unwrap();
    let series = default_weights()
        .keys()
        .enumerate()
        .map(|(k, name)| {
            Series::from_values(
                name.as_str(),
                (0..n)
                    .filter(|i| (i + k) % 11 != 0)
                    .map(|i| {
                        let x = (i as f64 * 0.05 + k as f64).sin() * 10.0 + k as f64;
                        (base + chrono::Duration::days(i as i64), x)
                    }),
            )
            .unwrap()
        })
        .collect();
    FeatureMatrix::from_series(series)
}

fn make_bundle() -> DatasetBundle {
    let range = DateRange::new(
        chrono::NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
        chrono::NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
    );
    let provider = SyntheticProvider::new(42);
    let mut bundle = DatasetBundle::new();
    for (name, symbol) in [("XU100", "XU100.IS"), ("USDTRY", "TRY"), ("VIX", "^VIX"), ("SP500", "^GSPC")] {
        bundle.insert(name, provider.market_table(symbol, &range).unwrap());
    }
    let keywords = vec!["dolar".to_string(), "faiz".to_string()];
    bundle.insert(SEARCH_INTEREST_SOURCE, provider.keyword_table(&keywords, &range).unwrap());
    bundle
}

fn bench_synthesis(c: &mut Criterion) {
    let mut group = c.benchmark_group("synthesize");
    let config = IndexConfig::default();
    for n in [500usize, 2_500, 10_000] {
        let matrix = make_matrix(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &matrix, |b, m| {
            b.iter(|| synthesize(black_box(m), &config).unwrap())
        });
    }
    group.finish();
}

fn bench_registry(c: &mut Criterion) {
    let bundle = make_bundle();
    let sequential = FeatureRegistry::builtin(&FeatureConfig::default());
    let parallel = FeatureRegistry::builtin(&FeatureConfig::default()).with_parallelism(true);

    c.bench_function("compute_all_sequential", |b| {
        b.iter(|| sequential.compute_all(black_box(&bundle)))
    });
    c.bench_function("compute_all_parallel", |b| {
        b.iter(|| parallel.compute_all(black_box(&bundle)))
    });
}

criterion_group!(benches, bench_synthesis, bench_registry);
criterion_main!(benches);
