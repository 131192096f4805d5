#![forbid(unsafe_code)]

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lamina::advisor::{AdvisePolicy, Advisor, AdvisorOptions, MadviseHint, NoopMetrics};
use lamina::primitives::concurrency::{advise_channel, AdviseRequest, QueueConfig, QueueKind};
use lamina::storage::{Graph, LevelData};
use lamina::types::{Direction, NodeId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const NODE_COUNT: usize = 8_192;
const EDGES_PER_LEVEL: usize = 16_384;

fn micro_traversal(c: &mut Criterion) {
    let mut group = c.benchmark_group("micro/traversal");
    group.sample_size(40);
    group.throughput(Throughput::Elements(1));

    for levels in [1usize, 4, 16] {
        let mut harness = TraversalHarness::new(levels);
        group.bench_with_input(BenchmarkId::new("neighbors", levels), &levels, |b, _| {
            b.iter(|| black_box(harness.neighbors()));
        });
    }
    group.finish();
}

fn micro_advise(c: &mut Criterion) {
    let mut group = c.benchmark_group("micro/advise_queue");
    group.throughput(Throughput::Elements(1));
    for kind in [QueueKind::Block, QueueKind::Ring, QueueKind::Lru] {
        let config = QueueConfig {
            kind,
            ..QueueConfig::default()
        };
        let (mut tx, mut rx) = advise_channel(&config).expect("channel");
        let mut node = 0u64;
        group.bench_function(BenchmarkId::new("enqueue_dequeue", format!("{kind:?}")), |b| {
            b.iter(|| {
                node = (node + 1) % NODE_COUNT as u64;
                let epoch = tx.current_epoch();
                let request = AdviseRequest {
                    node: NodeId(node),
                    epoch,
                    direction: Direction::Out,
                };
                tx.enqueue(request).expect("enqueue");
                black_box(rx.dequeue())
            });
        });
    }

    let graph = TraversalHarness::new(4).graph;
    for policy in [AdvisePolicy::NodeOnly, AdvisePolicy::Complete] {
        let options = AdvisorOptions::new(policy, false);
        let mut advisor = Advisor::start(
            Arc::clone(&graph),
            options,
            Arc::new(MadviseHint),
            Arc::new(NoopMetrics),
        )
        .expect("advisor");
        let mut node = 0u64;
        group.bench_function(BenchmarkId::new("inline_advise", policy.as_str()), |b| {
            b.iter(|| {
                node = (node + 7) % NODE_COUNT as u64;
                advisor.advise_out(NodeId(node)).expect("advise");
            });
        });
        advisor.stop().expect("stop");
    }
    group.finish();
}

struct TraversalHarness {
    graph: Arc<Graph>,
    rng: ChaCha8Rng,
}

impl TraversalHarness {
    fn new(levels: usize) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(0x5eed_1a7e);
        let graph = Graph::new();
        for _ in 0..levels {
            let edges: Vec<(NodeId, NodeId)> = (0..EDGES_PER_LEVEL / levels)
                .map(|_| {
                    (
                        NodeId(rng.gen_range(0..NODE_COUNT as u64)),
                        NodeId(rng.gen_range(0..NODE_COUNT as u64)),
                    )
                })
                .collect();
            graph
                .seal_level(
                    LevelData::from_edges(NODE_COUNT, &edges, Direction::Out).expect("level data"),
                    LevelData::from_edges(NODE_COUNT, &edges, Direction::In).expect("level data"),
                )
                .expect("seal");
        }
        Self {
            graph: Arc::new(graph),
            rng,
        }
    }

    fn neighbors(&mut self) -> u64 {
        let node = NodeId(self.rng.gen_range(0..NODE_COUNT as u64));
        let snap = self.graph.snapshot();
        snap.begin_out(node)
            .map(|cursor| cursor.map(|n| n.0).sum())
            .unwrap_or(0)
    }
}

criterion_group!(benches, micro_traversal, micro_advise);
criterion_main!(benches);
