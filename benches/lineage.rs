use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;

use simlineage::{
    BranchRequest, InMemoryRecordStore, LineageService, Payload, SimulationStatus,
    SimulationVersion,
};

/// A service holding `lineages` unrelated lineages of `depth` versions each.
fn seeded_service(lineages: usize, depth: usize) -> (LineageService, SimulationVersion) {
    let service = LineageService::with_defaults(Arc::new(InMemoryRecordStore::new())).unwrap();

    let mut payload = Payload::new();
    payload.insert("scenario".to_string(), json!("Regional outage during peak sales"));
    payload.insert("analysis_results".to_string(), json!({"score": 0.72}));

    let mut last_root = None;
    for _ in 0..lineages {
        let root = service
            .create_root(SimulationStatus::Completed, payload.clone(), None)
            .unwrap();
        for _ in 1..depth {
            service.create_branch(&root, BranchRequest::new()).unwrap();
        }
        last_root = Some(root);
    }

    (service, last_root.unwrap())
}

fn bench_resolve_lineage(c: &mut Criterion) {
    let mut group = c.benchmark_group("lineage/resolve");
    for depth in [1usize, 16, 256] {
        let (service, root) = seeded_service(32, depth);
        group.throughput(Throughput::Elements(depth as u64));
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| service.resolve_lineage(&root.id).unwrap());
        });
    }
    group.finish();
}

fn bench_create_branch(c: &mut Criterion) {
    c.bench_function("lineage/create_branch", |b| {
        b.iter_batched(
            || seeded_service(8, 16),
            |(service, root)| service.create_branch(&root, BranchRequest::labeled("bench")).unwrap(),
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_resolve_lineage, bench_create_branch);
criterion_main!(benches);
