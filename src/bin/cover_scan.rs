//! Cover scan binary: generates cover for a test arena and ranks it against a target.
//!
//! Usage: cargo run --release --bin cover_scan -- [OPTIONS]
//!
//! Options:
//!   --tiles <N>          Tiles per arena side (default: 4)
//!   --tile-size <UNITS>  Tile width (default: 600)
//!   --jobs <N>           Max tiles regenerated at once (default: 4)
//!   --config <PATH>      Load cover config from JSON
//!   --save-config <PATH> Write the effective config as JSON and continue
//!   --report <PATH>      Write a JSON summary of the run
//!
//! The target stands in the arena corner; cover is ranked around the arena centre.

use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::{Vec2, Vec3};
use serde_json::json;

use navcover::core::Error;
use navcover::math::Aabb;
use navcover::system::{CoverSystem, TileOutcome, TileRegenerationWorker};
use navcover::world::{ActorId, BoxWorld, NavSurface};
use navcover::{CoverConfig, Stance};

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .init();

    if let Err(e) = run() {
        eprintln!("cover_scan failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Error> {
    let args: Vec<String> = std::env::args().collect();
    let tiles_per_side = parse_u32_arg(&args, "--tiles").unwrap_or(4);
    let tile_size = parse_f32_arg(&args, "--tile-size").unwrap_or(600.0);
    let jobs = parse_usize_arg(&args, "--jobs").unwrap_or(4);

    let config = match parse_str_arg(&args, "--config") {
        Some(path) => CoverConfig::load(&path)?,
        None => CoverConfig::default(),
    };
    if let Some(path) = parse_str_arg(&args, "--save-config") {
        config.save(&path)?;
        println!("Config written to {}", path);
    }

    println!("=== Navcover Cover Scan ===");
    println!("Arena:   {} x {} tiles of {} units", tiles_per_side, tiles_per_side, tile_size);
    println!("Spacing: {}", config.generator.spacing);
    println!("Jobs:    {} parallel", jobs);
    println!();

    let mut world = BoxWorld::arena(tiles_per_side, tile_size);
    let extent = tiles_per_side as f32 * tile_size;
    let corner = Vec2::splat(tile_size * 0.25);
    let target = world.add_unit(
        Aabb::new(Vec3::new(corner.x - 20.0, 0.0, corner.y - 20.0), Vec3::new(corner.x + 20.0, 180.0, corner.y + 20.0)),
        Vec3::new(corner.x, 160.0, corner.y),
    );
    let tiles = world.tile_ids();
    let world = Arc::new(world);

    let system = Arc::new(CoverSystem::new(world.clone(), config)?);

    let start = Instant::now();
    let mut worker = TileRegenerationWorker::new(system.clone(), jobs)?;
    for &tile in &tiles {
        worker.request(tile);
    }

    let reports = worker.wait_for_results(Duration::from_secs(300));
    let elapsed = start.elapsed();
    if worker.pending_count() > 0 {
        log::warn!("{} tiles still pending after timeout", worker.pending_count());
    }

    let mut inserted = 0;
    let mut duplicates = 0;
    let mut failed = 0;
    for report in &reports {
        match &report.outcome {
            TileOutcome::Updated(stats) => {
                inserted += stats.inserted;
                duplicates += stats.duplicates;
            }
            TileOutcome::Failed(reason) => {
                log::error!("Tile {:?} failed: {}", report.tile, reason);
                failed += 1;
            }
            other => log::warn!("Tile {:?}: {:?}", report.tile, other),
        }
    }

    println!("Generated {} cover points in {:.1}ms ({} duplicates, {} failed tiles)",
        system.index().len(), elapsed.as_secs_f64() * 1000.0, duplicates, failed);

    let center = Vec3::new(extent * 0.5, 0.0, extent * 0.5);
    let stance = Stance::default();
    let targets: Vec<ActorId> = vec![target];
    let ranked = system.rank_cover(center, extent * 0.5, &stance, &targets, &[target]);

    println!("Ranked {} usable points around ({:.0}, {:.0})", ranked.len(), center.x, center.z);
    for scored in ranked.iter().take(5) {
        let p = scored.point.location;
        println!("  score {:.2} at ({:.0}, {:.0}, {:.0})", scored.score, p.x, p.y, p.z);
    }

    if let Some(best) = ranked.first() {
        if system.hold_cover(best.point.id) {
            println!("Held best point; second hold refused: {}", !system.hold_cover(best.point.id));
        }
    }

    if let Some(path) = parse_str_arg(&args, "--report") {
        let surface = world.surface_bounds();
        let report = json!({
            "tiles": tiles.len(),
            "tile_size": tile_size,
            "surface_min": [surface.min.x, surface.min.y, surface.min.z],
            "surface_max": [surface.max.x, surface.max.y, surface.max.z],
            "points": system.index().len(),
            "inserted": inserted,
            "duplicates": duplicates,
            "failed_tiles": failed,
            "elapsed_ms": elapsed.as_secs_f64() * 1000.0,
            "ranked": ranked.iter().take(10).map(|s| json!({
                "score": s.score,
                "location": [s.point.location.x, s.point.location.y, s.point.location.z],
                "tile": s.point.tile.0,
            })).collect::<Vec<_>>(),
        });
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        println!("Report written to {}", path);
    }

    Ok(())
}

fn parse_f32_arg(args: &[String], flag: &str) -> Option<f32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
