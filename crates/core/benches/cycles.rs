use std::hint::black_box;

use adya_core::anomaly::RelsExplainer;
use adya_core::graph::DepGraph;
use adya_core::history::TxnId;
use adya_core::rels::{Rel, RelSet};
use adya_core::{cycles, Analysis, AnomalyMap, CheckOptions};
use criterion::{criterion_group, criterion_main, Criterion};

/// Build a graph of `components` strongly connected rings of `size`
/// vertices each, bridged into a chain.
///
/// Each ring alternates ww and wr edges, closes with an rw edge, and has
/// one realtime chord, so most of the spec table has something to chew
/// on.
fn ring_chain(components: u64, size: u64) -> DepGraph {
    let mut g = DepGraph::default();
    for c in 0..components {
        let base = c * size;
        for i in 0..size {
            let from = TxnId(base + i);
            let to = TxnId(base + (i + 1) % size);
            let label = if i + 1 == size {
                RelSet::RW
            } else if i % 2 == 0 {
                RelSet::WW
            } else {
                RelSet::WR
            };
            g.add_edge(from, to, label);
        }
        g.add_edge(TxnId(base), TxnId(base + size / 2), RelSet::REALTIME);
        if c > 0 {
            // bridge from the previous ring; keeps components separate
            g.add_edge(TxnId(base - 1), TxnId(base), RelSet::of(&[Rel::Ww, Rel::Process]));
        }
    }
    g
}

fn bench_cycles(c: &mut Criterion) {
    let small = Analysis::from_graph(ring_chain(2, 4));
    let medium = Analysis::from_graph(ring_chain(8, 8));
    let large = Analysis::from_graph(ring_chain(32, 16));
    let options = CheckOptions::default();

    let mut group = c.benchmark_group("cycles");
    group.bench_function("2x4", |b| {
        b.iter(|| {
            let map: AnomalyMap<u64, u64> =
                cycles(black_box(&options), black_box(&small), &RelsExplainer);
            black_box(map)
        });
    });
    group.bench_function("8x8", |b| {
        b.iter(|| {
            let map: AnomalyMap<u64, u64> =
                cycles(black_box(&options), black_box(&medium), &RelsExplainer);
            black_box(map)
        });
    });
    group.bench_function("32x16", |b| {
        b.iter(|| {
            let map: AnomalyMap<u64, u64> =
                cycles(black_box(&options), black_box(&large), &RelsExplainer);
            black_box(map)
        });
    });
    group.finish();
}

criterion_group!(benches, bench_cycles);
criterion_main!(benches);
