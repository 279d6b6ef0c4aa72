//! # Graph Benchmarks
//!
//! Performance benchmarks for trellis-core taxonomy and query operations.
//!
//! Run with: `cargo bench -p trellis-core`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use trellis_core::{
    ClassName, EdgeFilter, EdgeKindKey, EdgeStore, EdgeTypeDef, EdgeTypeId, EdgeTypeRegistry,
    MemoryStore, NewEdge, NodeId, SortOrder, TypeCode,
};

/// Build a registry with N types, a tenth of them parented under "ADM".
fn create_registry(size: usize) -> EdgeTypeRegistry {
    let mut registry = EdgeTypeRegistry::new();
    registry
        .define(EdgeTypeDef::new("ADM").between("Member", "Organisation"))
        .expect("define");
    for i in 0..size {
        let mut def = EdgeTypeDef::new(format!("T{:04}", i)).between("Member", "Organisation");
        if i % 10 == 0 {
            def = def.parent("ADM");
        }
        registry.define(def).expect("define");
    }
    registry
}

/// Build a store with N edges fanned out from a single hub node.
fn create_store(size: usize) -> MemoryStore {
    let mut store = MemoryStore::new();
    for i in 0..size {
        store
            .insert_edge(NewEdge {
                kind: EdgeKindKey::new("member-organisation"),
                node_a: NodeId(1),
                node_b: NodeId(i as u64 + 2),
                edge_type: EdgeTypeId((i % 8) as u64),
                variant: None,
            })
            .expect("insert");
    }
    store
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_hierarchy_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("hierarchy_resolution");

    for size in [100, 1000, 10000].iter() {
        let registry = create_registry(*size);
        let member = ClassName::new("Member");
        let organisation = ClassName::new("Organisation");
        let adm = vec![TypeCode::new("ADM")];

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                black_box(registry.get_hierarchy(Some(&member), Some(&organisation), &adm))
            });
        });
    }

    group.finish();
}

fn bench_exact_type_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("exact_type_lookup");

    for size in [100, 1000, 10000].iter() {
        let registry = create_registry(*size);
        let code = TypeCode::new(format!("T{:04}", size / 2));

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(registry.get_by_code(&code)));
        });
    }

    group.finish();
}

fn bench_edge_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("edge_selection");

    for size in [100, 1000, 10000].iter() {
        let store = create_store(*size);
        let filter = EdgeFilter {
            node_a: Some(NodeId(1)),
            edge_types: Some([EdgeTypeId(0)].into_iter().collect()),
            ..EdgeFilter::default()
        };

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(store.select(&filter, SortOrder::CreatedDesc)));
        });
    }

    group.finish();
}

fn bench_edge_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("edge_append");

    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| black_box(create_store(size)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_hierarchy_resolution,
    bench_exact_type_lookup,
    bench_edge_selection,
    bench_edge_append,
);

criterion_main!(benches);
