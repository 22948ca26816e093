//! Severity propagation benchmarks

use alarmtree::{AlarmTree, ConfigurationKind, NodeId, ProcessVariableBuilder, Severity, SubtreeBuilder, TreeNodeSource};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// `depth` levels of subtrees, `fanout` subtrees per level along one branch,
/// and `leaves` process variables below the deepest subtree
fn build_tree(depth: usize, fanout: usize, leaves: usize) -> (AlarmTree, Vec<NodeId>) {
    let mut tree = AlarmTree::new("root");
    let mut parent = tree.root();
    for level in 0..depth {
        let mut next = parent;
        for i in 0..fanout {
            let id = SubtreeBuilder::new(format!("L{}-{}", level, i), ConfigurationKind::Component, TreeNodeSource::Runtime)
                .parent(parent)
                .build(&mut tree)
                .unwrap();
            if i == 0 {
                next = id;
            }
        }
        parent = next;
    }

    let pvs = (0..leaves)
        .map(|i| {
            ProcessVariableBuilder::new(format!("pv{}", i), TreeNodeSource::Runtime)
                .severities(Severity::NoAlarm, Severity::NoAlarm)
                .parent(parent)
                .build(&mut tree)
                .unwrap()
        })
        .collect();
    (tree, pvs)
}

fn raise_and_clear_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("raise_and_clear");
    for &leaves in &[10usize, 100, 1000] {
        let (mut tree, pvs) = build_tree(8, 4, leaves);
        let pv = pvs[leaves / 2];
        group.bench_with_input(BenchmarkId::from_parameter(leaves), &leaves, |b, _| {
            b.iter(|| {
                tree.set_severities(pv, Severity::Major, Severity::Major, None).unwrap();
                tree.set_severities(pv, Severity::NoAlarm, Severity::NoAlarm, None).unwrap();
                black_box(tree.alarm_severity(tree.root()));
            });
        });
    }
    group.finish();
}

fn masked_update_benchmark(c: &mut Criterion) {
    // a second alarm higher up keeps the change from reaching the root
    let (mut tree, pvs) = build_tree(8, 4, 100);
    let masking = ProcessVariableBuilder::new("masking", TreeNodeSource::Runtime)
        .severities(Severity::Invalid, Severity::Invalid)
        .parent(tree.root())
        .build(&mut tree)
        .unwrap();
    black_box(masking);

    c.bench_function("masked_update", |b| {
        b.iter(|| {
            tree.set_severities(pvs[0], Severity::Minor, Severity::Minor, None).unwrap();
            tree.set_severities(pvs[0], Severity::NoAlarm, Severity::NoAlarm, None).unwrap();
        });
    });
}

fn query_benchmark(c: &mut Criterion) {
    let (mut tree, pvs) = build_tree(4, 8, 1000);
    for pv in pvs.iter().step_by(7) {
        tree.set_severities(*pv, Severity::Minor, Severity::Minor, None).unwrap();
    }

    c.bench_function("collect_unacknowledged", |b| {
        b.iter(|| black_box(tree.collect_unacknowledged_alarms(tree.root())));
    });
    c.bench_function("find_by_name", |b| {
        b.iter(|| black_box(tree.find_process_variable_nodes(tree.root(), "pv500")));
    });
}

criterion_group!(benches, raise_and_clear_benchmark, masked_update_benchmark, query_benchmark);
criterion_main!(benches);
