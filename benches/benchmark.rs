// Performance benchmarks for normalization, index build and query paths
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use equitx_core::{
    FeatureScheme, IndexConfig, IndexRecord, Parcel, ParcelId, ParcelIndex, QueryOptions, Scope,
};
use rand::prelude::*;

fn generate_parcel(i: usize, rng: &mut impl Rng) -> Parcel {
    let neighborhood = format!("{}", 8000 + (i % 10));
    Parcel {
        id: ParcelId::new(format!("{:013}", i)),
        district: "HCAD".to_string(),
        address: format!("{i} BENCH LN"),
        neighborhood_code: neighborhood,
        building_area: Some(rng.random_range(900.0..6000.0)),
        year_built: Some(rng.random_range(1900..2025)),
        building_grade: Some("B".to_string()),
        land_area: Some(rng.random_range(3000.0..20000.0)),
        appraised_value: rng.random_range(150_000.0..1_200_000.0),
        market_value: 0.0,
        valuation_history: Vec::new(),
        coordinates: None,
    }
}

fn build_records(n: usize) -> Vec<IndexRecord> {
    let scheme = FeatureScheme::v1();
    let mut rng = rand::rng();
    (0..n)
        .map(|i| {
            let parcel = generate_parcel(i, &mut rng);
            let vector = scheme.normalize(&parcel).unwrap();
            IndexRecord::from_parcel(&parcel, vector)
        })
        .collect()
}

fn benchmark_normalize(c: &mut Criterion) {
    let scheme = FeatureScheme::v1();
    let mut rng = rand::rng();
    let parcel = generate_parcel(42, &mut rng);

    c.bench_function("normalize", |b| {
        b.iter(|| scheme.normalize(black_box(&parcel)).unwrap())
    });
}

fn benchmark_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_build");
    group.sample_size(10);

    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::new("equitx", size), size, |b, &size| {
            let records = build_records(size);
            b.iter(|| {
                ParcelIndex::build(IndexConfig::default(), black_box(records.clone())).unwrap()
            });
        });
    }

    group.finish();
}

fn benchmark_query(c: &mut Criterion) {
    let records = build_records(10_000);
    let index = ParcelIndex::build(IndexConfig::default(), records).unwrap();
    let scheme = FeatureScheme::v1();
    let mut rng = rand::rng();
    let subject = generate_parcel(99_999, &mut rng);
    let vector = scheme.normalize(&subject).unwrap();

    c.bench_function("query_top50", |b| {
        b.iter(|| index.query(black_box(&vector), 50).unwrap())
    });

    let scope = Scope {
        district: "HCAD".to_string(),
        neighborhood_code: "8004".to_string(),
    };
    let opts = QueryOptions::default();
    c.bench_function("query_scoped", |b| {
        b.iter(|| index.query_scoped(black_box(&vector), &scope, &opts).unwrap())
    });
}

criterion_group!(benches, benchmark_normalize, benchmark_index_build, benchmark_query);
criterion_main!(benches);
