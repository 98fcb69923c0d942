//! Live Feed Benchmarks
//!
//! - Ingest throughput with fresh and duplicate-heavy batches
//! - Clustering and arc building over a full collection

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use threat_stream::geo::{attack_arcs, cluster, DEFAULT_REFERENCE_POINT};
use threat_stream::{GeoThreat, Severity, StreamReconciler};

/// Threats spread over a coarse grid
fn create_threats(start: i64, count: usize) -> Vec<GeoThreat> {
    (0..count as i64)
        .map(|i| {
            let id = start + i;
            let severity = Severity::RANKED[(id % 4) as usize];
            GeoThreat::new(id, severity).at((id % 120) as f64 - 60.0, (id % 340) as f64 - 170.0)
        })
        .collect()
}

/// Benchmark ingest of batches that are entirely new
fn bench_ingest_fresh(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest_fresh");

    for batch_size in [1, 10, 50, 200].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &size| {
                let mut rec = StreamReconciler::new(200);
                let mut next = 0i64;
                b.iter(|| {
                    let batch = create_threats(next, size);
                    next += size as i64;
                    black_box(rec.ingest(batch))
                });
            },
        );
    }

    group.finish();
}

/// Benchmark ingest where the stream replays what is already held
fn bench_ingest_duplicates(c: &mut Criterion) {
    let mut rec = StreamReconciler::new(200);
    rec.ingest(create_threats(0, 200));
    let replay = create_threats(150, 50);

    c.bench_function("ingest_duplicates", |b| {
        b.iter(|| black_box(rec.ingest(replay.clone())))
    });
}

/// Benchmark clustering plus arcs for a full collection
fn bench_clustering(c: &mut Criterion) {
    let threats = create_threats(0, 200);

    c.bench_function("cluster_200", |b| b.iter(|| black_box(cluster(&threats).len())));

    c.bench_function("attack_arcs_200", |b| {
        b.iter(|| black_box(attack_arcs(&cluster(&threats), DEFAULT_REFERENCE_POINT)))
    });
}

criterion_group!(benches, bench_ingest_fresh, bench_ingest_duplicates, bench_clustering);
criterion_main!(benches);
