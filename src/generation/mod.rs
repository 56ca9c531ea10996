//! Cover generation: turns navigable-surface boundaries into cover candidates.
//!
//! Tiles are independent, so batches are scanned in parallel with rayon.
//! Results are collected per tile and inserted into the index afterwards.

pub mod config;
pub mod cover_gen;

pub use config::GeneratorConfig;
pub use cover_gen::{sample_edge, CoverPointGenerator, EdgeSample, TileScan};

use rayon::prelude::*;

use crate::core::SharedDebugSink;
use crate::cover::TileId;
use crate::world::{GeometryTracer, NavSurface};

/// Scan a batch of tiles in parallel.
///
/// Tiles the surface does not know (no edges or no bounds) are dropped from
/// the result; their existing cover stays untouched.
pub fn scan_tiles<W>(
    config: &GeneratorConfig,
    world: &W,
    tiles: &[TileId],
    debug: Option<SharedDebugSink>,
) -> Vec<TileScan>
where
    W: NavSurface + GeometryTracer + ?Sized,
{
    log::info!("Scanning {} tiles for cover...", tiles.len());

    let start = std::time::Instant::now();
    let results: Vec<TileScan> = tiles
        .par_iter()
        .filter_map(|&tile| {
            let scan = CoverPointGenerator::new(config, world)
                .with_debug_sink(debug.clone())
                .scan_tile(tile);
            if scan.is_none() {
                log::warn!("Tile {:?} has no boundary data, skipping", tile);
            }
            scan
        })
        .collect();

    let elapsed = start.elapsed();
    let candidates: usize = results.iter().map(|r| r.candidates.len()).sum();
    log::info!("Scanned {} tiles in {:.1}ms ({} cover candidates)",
        results.len(), elapsed.as_secs_f64() * 1000.0, candidates);

    results
}
