// Path search and link discovery benchmarks.
//
// `grid_store` builds a square lattice of nodes 64 units apart with
// 4-neighbor MOVE links, a few random JUMP shortcuts and a band of
// ladder-only links, which is roughly the shape of a generated level graph.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use waypoint_nav::config::NavConfig;
use waypoint_nav::grid::generate_grid;
use waypoint_nav::linking::link_nodes;
use waypoint_nav::pathfinding::{SearchContext, find_path, find_path_once};
use waypoint_nav::prng::NavRng;
use waypoint_nav::{BrushWorld, LinkType, NodeFlags, NodeId, NodeStore, Vec3};

fn grid_store(side: u32, seed: u64) -> NodeStore {
    let mut store = NodeStore::new();
    for y in 0..side {
        for x in 0..side {
            store.add_node(Vec3::new(x as f32 * 64.0, y as f32 * 64.0, 24.0), NodeFlags::empty());
        }
    }
    let id = |x: u32, y: u32| NodeId(y * side + x);
    for y in 0..side {
        for x in 0..side {
            let kind = if y == side / 2 { LinkType::LADDER } else { LinkType::MOVE };
            if x + 1 < side {
                store.add_link(id(x, y), id(x + 1, y), 64.0, kind);
                store.add_link(id(x + 1, y), id(x, y), 64.0, kind);
            }
            if y + 1 < side {
                store.add_link(id(x, y), id(x, y + 1), 64.0, LinkType::MOVE);
                store.add_link(id(x, y + 1), id(x, y), 64.0, LinkType::MOVE);
            }
        }
    }
    let mut rng = NavRng::new(seed);
    for _ in 0..side * 2 {
        let a = NodeId(rng.range_usize(0, store.len()) as u32);
        let b = NodeId(rng.range_usize(0, store.len()) as u32);
        let d = store.origin(a).distance(store.origin(b));
        store.add_link(a, b, d * 1.1, LinkType::JUMP);
    }
    store
}

fn bench_find_path(c: &mut Criterion) {
    let config = NavConfig::default();
    let mut group = c.benchmark_group("find_path");
    for side in [16u32, 32, 64] {
        let store = grid_store(side, 1);
        let goal = NodeId(side * side - 1);
        let mut unbounded = config.search.clone();
        unbounded.max_expansions = None;

        let mut ctx = SearchContext::new();
        group.bench_with_input(BenchmarkId::new("reused_context", side), &side, |b, _| {
            b.iter(|| {
                black_box(find_path(
                    &store,
                    &mut ctx,
                    NodeId(0),
                    goal,
                    LinkType::DEFAULT_MASK,
                    &unbounded,
                ))
            })
        });
        group.bench_with_input(BenchmarkId::new("fresh_context", side), &side, |b, _| {
            b.iter(|| black_box(find_path_once(&store, NodeId(0), goal, LinkType::DEFAULT_MASK, &unbounded)))
        });
    }
    group.finish();
}

fn bench_link_discovery(c: &mut Criterion) {
    let config = NavConfig::default();
    let mut world = BrushWorld::new();
    world.add_solid(Vec3::new(-64.0, -64.0, -16.0), Vec3::new(1088.0, 1088.0, 0.0));
    world.add_solid(Vec3::new(256.0, 128.0, 0.0), Vec3::new(272.0, 896.0, 128.0));
    world.add_solid(Vec3::new(640.0, 512.0, 0.0), Vec3::new(896.0, 768.0, 16.0));

    let mut base = NodeStore::new();
    generate_grid(&mut base, &world, &config, Vec3::new(0.0, 0.0, -64.0), Vec3::new(1024.0, 1024.0, 256.0));

    c.bench_function("link_nodes", |b| {
        b.iter(|| {
            let mut store = base.clone();
            black_box(link_nodes(&mut store, &world, &config))
        })
    });
}

criterion_group!(benches, bench_find_path, bench_link_discovery);
criterion_main!(benches);
