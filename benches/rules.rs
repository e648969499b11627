use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use serde_json::json;

use refcache::{
    AccessPolicy, CacheConfig, CategoryReferenceId, InMemorySource, Metric, Reference, ReferenceCache, Rule,
    SegmentDefinition, SegmentDefinitionId, SegmentPolicy, SourceSnapshot,
};
use refcache::segment::{SegmentAssignment, SegmentDefinitionPayload};

const VEHICLES: usize = 1024;
const SEGMENTS: usize = 32;

fn make_cache() -> ReferenceCache {
    let mut snapshot = SourceSnapshot::default();
    for i in 0..VEHICLES {
        let id = CategoryReferenceId::new("VEHICLE", i.to_string());
        snapshot.references.push(Reference::new("VEHICLE", i.to_string(), format!("car-{i}")));
        snapshot.metrics.push(Metric::new(&id, "CREATED_DATE", 1_600_000_000_000.0 + i as f64));
        snapshot.metrics.push(Metric::new(&id, "SPEED", (i % 200) as f64));
        snapshot.metrics.push(Metric::new(&id, "COLOR", if i % 2 == 0 { "red" } else { "blue" }));
        // Every vehicle belongs to four segments.
        for s in 0..4 {
            snapshot
                .segments
                .push(SegmentAssignment::new("VEHICLE", i.to_string(), format!("seg-{}", (i + s) % SEGMENTS)));
        }
    }
    for s in 0..SEGMENTS {
        let policy = SegmentPolicy::with_access([format!("POLICY-{}", s % 8), "READ".to_string()]);
        snapshot.segment_definitions.push(SegmentDefinition::from_payload(
            SegmentDefinitionPayload::new(format!("seg-{s}"), "VEHICLE", policy),
            chrono::Utc::now(),
        ));
    }

    let config = CacheConfig {
        preload_categories: vec!["VEHICLE".to_string()],
        ..CacheConfig::default()
    };
    let cache = ReferenceCache::new(Arc::new(InMemorySource::new(snapshot)), config).unwrap();
    futures::executor::block_on(cache.init()).unwrap();
    cache
}

fn bench_metrics_logic(c: &mut Criterion) {
    let cache = make_cache();
    let simple = Rule::new(json!({">": [{"var": "CREATED_DATE"}, 1_600_000_000_500_i64]}));
    let compound = Rule::new(json!({"and": [
        {"<": [10, {"var": "SPEED"}, 150]},
        {"in": [{"var": "COLOR"}, ["red", "green"]]},
        {"if": [{"missing": ["OWNER"]}, true, false]}
    ]}));

    let mut group = c.benchmark_group("rules");
    group.throughput(Throughput::Elements(1));
    group.bench_function("apply_metrics_logic/simple", |b| {
        b.iter(|| cache.apply_metrics_logic(black_box("VEHICLE:700"), &simple).unwrap());
    });
    group.bench_function("apply_metrics_logic/compound", |b| {
        b.iter(|| cache.apply_metrics_condition(black_box("VEHICLE:700"), &compound).unwrap());
    });
    group.finish();
}

fn bench_policies(c: &mut Criterion) {
    let cache = make_cache();
    let ids: Vec<SegmentDefinitionId> = (0..SEGMENTS).map(|s| SegmentDefinitionId::new(format!("seg-{s}"))).collect();
    let missing = AccessPolicy::new("ADMIN");
    let present = AccessPolicy::new("POLICY-3");

    let mut group = c.benchmark_group("policy");
    group.bench_function("get_reference_access_policies", |b| {
        b.iter(|| cache.get_reference_access_policies(black_box("VEHICLE:17")));
    });
    group.bench_function("has_access_policy/hit", |b| {
        b.iter(|| cache.has_access_policy(black_box("VEHICLE:3"), &present));
    });
    group.bench_function("has_access_policy_in_segment_definitions/miss", |b| {
        b.iter(|| cache.has_access_policy_in_segment_definitions(&missing, black_box(&ids)));
    });
    group.finish();
}

criterion_group!(benches, bench_metrics_logic, bench_policies);
criterion_main!(benches);
