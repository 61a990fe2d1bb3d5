use corelib::node::NodeId;
use corelib::ring::{ChordRing, RingBuilder};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn ring(bits: u32, nodes: u64) -> ChordRing {
    let step = (1u64 << bits) / nodes;
    RingBuilder::new()
        .with_bits(bits)
        .add_nodes((0..nodes).map(|i| i * step + 1))
        .build()
        .unwrap()
}

fn bench_find_successor(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_successor");
    for nodes in [8u64, 64, 256] {
        let ring = ring(16, nodes);
        group.bench_with_input(BenchmarkId::from_parameter(nodes), &ring, |b, ring| {
            let mut target = 0u64;
            b.iter(|| {
                target = (target + 7919) % (1 << 16);
                black_box(ring.find_successor(NodeId(1), target).unwrap())
            })
        });
    }
    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let ring = ring(16, 64);
    for i in 0..256 {
        let key = format!("key-{}", i);
        ring.put(NodeId(1), &key, "value").unwrap();
    }
    c.bench_function("get_64_nodes", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % 256;
            black_box(ring.get(NodeId(1), &format!("key-{}", i)).unwrap())
        })
    });
}

fn bench_join_leave(c: &mut Criterion) {
    c.bench_function("join_leave_64_nodes", |b| {
        let ring = ring(16, 64);
        b.iter(|| {
            ring.create_node(NodeId(2)).unwrap().join(NodeId(1)).unwrap();
            ring.leave(NodeId(2)).unwrap();
        })
    });
}

criterion_group!(benches, bench_find_successor, bench_get, bench_join_leave);
criterion_main!(benches);
