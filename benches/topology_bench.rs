use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;
use tempfile::TempDir;
use topomap::{
    attributes::{catalog, AttributeRegistry},
    export_topology, import_topology,
    serialize::estimate,
    topology::{CacheInfo, Component, ComponentData, ComponentId, DataPathType, Orientation, TopologyGraph},
};

/// One node with `sockets` chips, each holding an L3 and `cores` cores
fn build_machine(sockets: i32, cores: i32) -> (TopologyGraph, ComponentId) {
    let mut graph = TopologyGraph::new();
    let node = graph
        .add_component(None, Component::new(0, ComponentData::Node).with_name("bench"))
        .unwrap();

    let mut all_cores = Vec::new();
    for s in 0..sockets {
        let l3 = graph
            .add_component(
                Some(node),
                Component::new(
                    s,
                    ComponentData::Cache(CacheInfo {
                        level: 3,
                        cache_type: "Unified".into(),
                        size: 32 << 20,
                        associativity_ways: 16,
                        line_size: 64,
                    }),
                )
                .with_attribute(catalog::CAT_L3_MASK, 0xfffu64),
            )
            .unwrap();
        for c in 0..cores {
            let core = graph
                .add_component(
                    Some(l3),
                    Component::new(c, ComponentData::Core)
                        .with_attribute(catalog::FREQ_HISTORY, vec![(0i64, 2.0e9), (1, 3.1e9)]),
                )
                .unwrap();
            all_cores.push(core);
        }
    }

    // Cache-to-cache latency between neighbouring cores
    for pair in all_cores.windows(2) {
        graph
            .add_data_path(pair[0], pair[1], Orientation::Bidirectional, DataPathType::C2C, -1.0, 40.0)
            .unwrap();
    }

    (graph, node)
}

fn benchmark_estimate(c: &mut Criterion) {
    let mut group = c.benchmark_group("Estimate");
    let registry = AttributeRegistry::default();

    for cores in [8, 64, 256].iter() {
        let (graph, root) = build_machine(2, *cores);
        group.bench_with_input(BenchmarkId::new("cores_per_socket", cores), cores, |b, _| {
            b.iter(|| estimate(&graph, root, &registry).unwrap());
        });
    }

    group.finish();
}

fn benchmark_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("Export");
    group.measurement_time(Duration::from_secs(5));
    let temp_dir = TempDir::new().unwrap();

    for cores in [8, 64, 256].iter() {
        let (graph, root) = build_machine(2, *cores);
        let path = temp_dir.path().join(format!("export-{}", cores));
        group.bench_with_input(BenchmarkId::new("cores_per_socket", cores), cores, |b, _| {
            b.iter(|| export_topology(&path, &graph, root, None).unwrap());
        });
    }

    group.finish();
}

fn benchmark_import(c: &mut Criterion) {
    let mut group = c.benchmark_group("Import");
    let temp_dir = TempDir::new().unwrap();

    for cores in [8, 64, 256].iter() {
        let (graph, root) = build_machine(2, *cores);
        let path = temp_dir.path().join(format!("import-{}", cores));
        export_topology(&path, &graph, root, None).unwrap();

        group.bench_with_input(BenchmarkId::new("cores_per_socket", cores), cores, |b, _| {
            b.iter(|| import_topology(&path, None).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_estimate, benchmark_export, benchmark_import);
criterion_main!(benches);
