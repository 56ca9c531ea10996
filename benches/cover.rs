use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion, black_box};

use navcover::cover::{CoverCandidate, NavNodeRef};
use navcover::generation::{CoverPointGenerator, GeneratorConfig, scan_tiles};
use navcover::index::CoverOctree;
use navcover::math::Aabb;
use navcover::system::CoverSystem;
use navcover::world::{ActorId, BoxWorld};
use navcover::{CoverConfig, Stance, TileId};

use glam::Vec3;

fn bench_scan_crate_tile(c: &mut Criterion) {
    let world = BoxWorld::arena(2, 600.0);
    let config = GeneratorConfig::default();

    c.bench_function("scan_crate_tile", |b| {
        b.iter(|| {
            CoverPointGenerator::new(&config, &world).scan_tile(black_box(TileId(0)))
        });
    });
}

fn bench_scan_arena_parallel(c: &mut Criterion) {
    let world = BoxWorld::arena(6, 600.0);
    let tiles = world.tile_ids();
    let config = GeneratorConfig::default();

    c.bench_function("scan_arena_36_tiles", |b| {
        b.iter(|| scan_tiles(&config, &world, black_box(&tiles), None));
    });
}

fn scattered_candidates(count: u32) -> Vec<CoverCandidate> {
    (0..count)
        .map(|i| {
            // Low-discrepancy spread over a 10k x 10k floor
            let x = (i as f32 * 0.618_034).fract() * 10_000.0;
            let z = (i as f32 * 0.754_877).fract() * 10_000.0;
            CoverCandidate {
                owner: ActorId(1 + (i % 64) as u64),
                location: Vec3::new(x, 10.0, z),
                force_field: false,
                tile: TileId(i % 256),
                node: NavNodeRef(i as u64),
            }
        })
        .collect()
}

fn bench_octree_insert_10k(c: &mut Criterion) {
    let bounds = Aabb::new(Vec3::new(0.0, -100.0, 0.0), Vec3::new(10_000.0, 100.0, 10_000.0));
    let candidates = scattered_candidates(10_000);

    c.bench_function("octree_insert_10k", |b| {
        b.iter(|| {
            let mut octree = CoverOctree::new(bounds);
            for candidate in &candidates {
                octree.insert(black_box(candidate), 10.0);
            }
            black_box(octree.len())
        });
    });
}

fn bench_octree_query_sphere(c: &mut Criterion) {
    let bounds = Aabb::new(Vec3::new(0.0, -100.0, 0.0), Vec3::new(10_000.0, 100.0, 10_000.0));
    let mut octree = CoverOctree::new(bounds);
    for candidate in &scattered_candidates(10_000) {
        octree.insert(candidate, 10.0);
    }

    c.bench_function("octree_query_sphere_r500", |b| {
        let mut frame = 0u32;
        b.iter(|| {
            frame += 1;
            let center = Vec3::new(
                (frame as f32 * 0.1).sin() * 4000.0 + 5000.0,
                10.0,
                (frame as f32 * 0.1).cos() * 4000.0 + 5000.0,
            );
            let mut hits = 0usize;
            octree.query_sphere(black_box(center), 500.0, |_, _| hits += 1);
            black_box(hits)
        });
    });
}

fn bench_rank_cover(c: &mut Criterion) {
    let mut world = BoxWorld::arena(4, 600.0);
    let target = world.add_unit(
        Aabb::new(Vec3::new(130.0, 0.0, 130.0), Vec3::new(170.0, 180.0, 170.0)),
        Vec3::new(150.0, 160.0, 150.0),
    );
    let tiles = world.tile_ids();
    let system = match CoverSystem::new(Arc::new(world), CoverConfig::default()) {
        Ok(system) => system,
        Err(e) => panic!("bench setup failed: {}", e),
    };
    system.regenerate_tiles(&tiles);
    let targets = vec![target];
    let stance = Stance::default();

    c.bench_function("rank_cover_r600", |b| {
        b.iter(|| {
            system.rank_cover(
                black_box(Vec3::new(1200.0, 10.0, 1200.0)),
                600.0,
                &stance,
                &targets,
                &[target],
            )
        });
    });
}

criterion_group!(
    benches,
    bench_scan_crate_tile,
    bench_scan_arena_parallel,
    bench_octree_insert_10k,
    bench_octree_query_sphere,
    bench_rank_cover,
);
criterion_main!(benches);
